//! # Capture Ledger
//!
//! Local capture store for phishing-awareness simulations: submissions are
//! appended to a durable record list and a spreadsheet report is rebuilt
//! from the full list after every change, ready for export.
//!
//! ## Core Concepts
//!
//! - **Records**: Append-only captured submissions, in capture order
//! - **Report**: XLSX workbook derived from all records, never patched
//! - **Slots**: Named text values behind a pluggable persistence port
//! - **Pipeline**: The context object owning all of the above
//!
//! ## Example
//!
//! ```ignore
//! use capture_ledger::{CapturePipeline, FileSlots, FileSlotsConfig};
//! use std::sync::Arc;
//!
//! let slots = FileSlots::open(FileSlotsConfig {
//!     path: "./capture-data".into(),
//!     ..Default::default()
//! })?;
//! let pipeline = CapturePipeline::with_defaults(Arc::new(slots));
//!
//! let outcome = pipeline.capture("a@b.com", "hunter2", "Mozilla/5.0")?;
//! for warning in &outcome.warnings {
//!     eprintln!("not saved: {}", warning);
//! }
//!
//! let artifact = pipeline.export_artifact()?;
//! artifact.save_in("./exports")?;
//! ```

pub mod encoding;
pub mod error;
pub mod pipeline;
pub mod records;
pub mod report;
pub mod slots;
pub mod types;
pub mod validation;

// Re-exports
pub use error::{CaptureError, Result};
pub use pipeline::{CaptureOutcome, CapturePipeline, ExportArtifact, PipelineConfig};
pub use records::RecordStore;
pub use report::{build_report, read_report, SheetContents};
pub use slots::{FileSlots, FileSlotsConfig, MemorySlots, SlotStore, RECORDS_SLOT, REPORT_SLOT};
pub use types::*;
pub use validation::is_plausible_email;
