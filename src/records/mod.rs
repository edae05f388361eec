//! Captured record persistence.
//!
//! Records are kept in an append-only sequence that is rewritten in full to
//! its slot on every append.

mod store;

pub use store::RecordStore;
