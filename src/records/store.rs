//! Append-only record store.

use crate::error::Result;
use crate::slots::{SlotStore, RECORDS_SLOT};
use crate::types::Record;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Append-only record store over a text slot.
///
/// The in-memory sequence is authoritative for the lifetime of the process.
/// Every append rewrites the whole JSON array into the records slot; if that
/// write fails the in-memory append stands and the error is returned so the
/// caller can report it.
///
/// Only [`CapturePipeline`](crate::CapturePipeline) mutates a store, so the
/// report it rebuilds always covers every record. Outside the crate a store
/// can be opened and read but not appended to:
///
/// ```compile_fail
/// use capture_ledger::{MemorySlots, Record, RecordStore};
/// use std::sync::Arc;
///
/// let store = RecordStore::open(Arc::new(MemorySlots::new()));
/// let record = Record::captured_at(chrono::Utc::now(), "a@b.com", "pw", "", "Simulated");
/// store.append(record).unwrap();
/// ```
pub struct RecordStore {
    slots: Arc<dyn SlotStore>,
    records: RwLock<Vec<Record>>,
}

impl RecordStore {
    /// Open the store, seeding memory from the persisted slot.
    pub fn open(slots: Arc<dyn SlotStore>) -> Self {
        let records = Self::read_slot(slots.as_ref());
        debug!(count = records.len(), "loaded captured records");
        Self {
            slots,
            records: RwLock::new(records),
        }
    }

    /// Read the persisted sequence.
    ///
    /// Unreadable or malformed data recovers to an empty sequence; the
    /// failure is logged, never returned.
    pub fn load(&self) -> Vec<Record> {
        Self::read_slot(self.slots.as_ref())
    }

    /// Append a record and persist the full sequence.
    pub(crate) fn append(&self, record: Record) -> Result<()> {
        let mut records = self.records.write();
        records.push(record);

        Self::write_slot(self.slots.as_ref(), &records).map_err(|e| {
            warn!(
                error = %e,
                count = records.len(),
                "record kept in memory but not persisted"
            );
            e
        })
    }

    /// Empty the store, in memory and on disk.
    pub(crate) fn clear(&self) -> Result<()> {
        self.records.write().clear();
        self.slots.remove(RECORDS_SLOT)
    }

    /// Snapshot of the in-memory sequence, in capture order.
    pub fn records(&self) -> Vec<Record> {
        self.records.read().clone()
    }

    /// Run `f` over the in-memory sequence without cloning it.
    pub fn with_records<T>(&self, f: impl FnOnce(&[Record]) -> T) -> T {
        f(&self.records.read())
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Most recent record.
    pub fn last(&self) -> Option<Record> {
        self.records.read().last().cloned()
    }

    fn read_slot(slots: &dyn SlotStore) -> Vec<Record> {
        let text = match slots.get(RECORDS_SLOT) {
            Ok(Some(text)) => text,
            Ok(None) => return Vec::new(),
            Err(e) => {
                error!(slot = RECORDS_SLOT, error = %e, "failed to read records, starting empty");
                return Vec::new();
            }
        };

        match serde_json::from_str(&text) {
            Ok(records) => records,
            Err(e) => {
                error!(slot = RECORDS_SLOT, error = %e, "failed to decode records, starting empty");
                Vec::new()
            }
        }
    }

    fn write_slot(slots: &dyn SlotStore, records: &[Record]) -> Result<()> {
        let text = serde_json::to_string(records)?;
        slots.set(RECORDS_SLOT, &text)
    }
}
