//! In-memory slot storage with an optional byte quota.

use super::SlotStore;
use crate::error::{CaptureError, Result};
use parking_lot::RwLock;
use std::collections::HashMap;

/// Slots held in a `HashMap`.
///
/// The quota counts key and value bytes across all slots, the way browser
/// storage does.
#[derive(Debug, Default)]
pub struct MemorySlots {
    slots: RwLock<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemorySlots {
    /// Unbounded storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that refuses writes once `quota` bytes are used.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            slots: RwLock::new(HashMap::new()),
            quota: Some(quota),
        }
    }

    /// Total bytes currently used.
    pub fn used_bytes(&self) -> usize {
        self.slots
            .read()
            .iter()
            .map(|(k, v)| k.len() + v.len())
            .sum()
    }

    pub fn len(&self) -> usize {
        self.slots.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.read().is_empty()
    }
}

impl SlotStore for MemorySlots {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.slots.read().get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut slots = self.slots.write();

        if let Some(quota) = self.quota {
            let others: usize = slots
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(k, v)| k.len() + v.len())
                .sum();
            let needed = key.len() + value.len();
            let available = quota.saturating_sub(others);
            if needed > available {
                return Err(CaptureError::QuotaExceeded {
                    key: key.to_string(),
                    needed,
                    available,
                });
            }
        }

        slots.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.slots.write().remove(key);
        Ok(())
    }
}
