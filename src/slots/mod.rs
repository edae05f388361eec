//! Text slot persistence.
//!
//! The pipeline persists two named, versioned text values: the record list
//! and the encoded report. Anything that can get, set and remove strings by
//! key can back it.

mod file;
mod memory;

pub use file::{FileSlots, FileSlotsConfig};
pub use memory::MemorySlots;

use crate::error::Result;

/// Slot holding the JSON array of captured records.
pub const RECORDS_SLOT: &str = "capture.records.v1";

/// Slot holding the base64-encoded XLSX report.
pub const REPORT_SLOT: &str = "capture.report.v1";

/// Key-value text persistence port.
pub trait SlotStore: Send + Sync {
    /// Read a slot. `Ok(None)` if it was never written or was removed.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Replace a slot's value. On failure the previous value is kept.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove a slot. Removing a missing slot is not an error.
    fn remove(&self, key: &str) -> Result<()>;
}
