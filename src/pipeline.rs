//! Capture pipeline tying records, report and slots together.

use crate::encoding;
use crate::error::{CaptureError, Result};
use crate::records::RecordStore;
use crate::report::{self, REPORT_EXTENSION, REPORT_MIME_TYPE};
use crate::slots::{SlotStore, REPORT_SLOT};
use crate::types::{Record, ReportState, SpreadsheetBlob, Stats};
use crate::validation;
use chrono::{NaiveDate, Utc};
use parking_lot::{Mutex, RwLock};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Pipeline configuration.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// Value stored as every record's source address.
    pub source_address: String,

    /// Exported files are named `<prefix>_<YYYY-MM-DD>.xlsx`.
    pub report_prefix: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_address: "Simulated".to_string(),
            report_prefix: "report".to_string(),
        }
    }
}

/// Result of a capture that passed validation.
///
/// The record is always part of the in-memory store. `warnings` lists the
/// persistence or encoding steps that failed; when empty, both the record
/// list and the report were durably saved.
#[derive(Debug)]
pub struct CaptureOutcome {
    pub record: Record,
    pub warnings: Vec<CaptureError>,
}

impl CaptureOutcome {
    /// True if every step succeeded.
    pub fn is_durable(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// A report packaged for download.
#[derive(Clone, Debug)]
pub struct ExportArtifact {
    pub blob: SpreadsheetBlob,
    pub filename: String,
    pub mime_type: &'static str,
}

impl ExportArtifact {
    /// `<prefix>_<YYYY-MM-DD>.xlsx`
    pub fn filename_for(prefix: &str, date: NaiveDate) -> String {
        format!("{}_{}.{}", prefix, date.format("%Y-%m-%d"), REPORT_EXTENSION)
    }

    /// Write the artifact into `dir` under its filename.
    pub fn save_in(&self, dir: impl AsRef<Path>) -> Result<PathBuf> {
        let path = dir.as_ref().join(&self.filename);
        fs::write(&path, self.blob.as_bytes())?;
        info!(path = %path.display(), bytes = self.blob.len(), "report exported");
        Ok(path)
    }

    /// The artifact as a `data:` URL.
    pub fn data_url(&self) -> String {
        encoding::data_url(self.mime_type, self.blob.as_bytes())
    }
}

/// The capture → persist → rebuild → export pipeline.
///
/// Owns the record store and the report slot for its whole lifetime; nothing
/// else writes to either. Capture and reset hold a write lock across the
/// append, rebuild and persist steps, so a pipeline shared between threads
/// never persists a report built from a stale record list.
pub struct CapturePipeline {
    config: PipelineConfig,
    slots: Arc<dyn SlotStore>,
    store: RecordStore,
    report_state: RwLock<ReportState>,
    write_lock: Mutex<()>,
}

impl CapturePipeline {
    /// Open a pipeline over `slots`, loading prior records and making sure a
    /// report exists.
    ///
    /// Never fails. A persisted report that does not match the loaded records
    /// is replaced. If the report cannot be persisted the pipeline starts in
    /// [`ReportState::Uninitialized`] and exports return `NotFound` until a
    /// later capture or reset succeeds.
    pub fn open(slots: Arc<dyn SlotStore>, config: PipelineConfig) -> Self {
        let store = RecordStore::open(Arc::clone(&slots));
        let pipeline = Self {
            config,
            slots,
            store,
            report_state: RwLock::new(ReportState::Uninitialized),
            write_lock: Mutex::new(()),
        };
        pipeline.initialize_report();
        pipeline
    }

    /// Open with the default configuration.
    pub fn with_defaults(slots: Arc<dyn SlotStore>) -> Self {
        Self::open(slots, PipelineConfig::default())
    }

    /// Make the persisted report agree with the loaded records.
    ///
    /// The report is built from the records and compared with the slot text.
    /// Rebuilds are deterministic, so any difference means the slot is stale
    /// or corrupt and gets overwritten.
    fn initialize_report(&self) {
        let persisted = match self.slots.get(REPORT_SLOT) {
            Ok(text) => text,
            Err(e) => {
                warn!(slot = REPORT_SLOT, error = %e, "unreadable report, rebuilding");
                None
            }
        };

        let built = self.store.with_records(|records| {
            report::build_report(records).map(|blob| (encoding::encode(&blob), records.len()))
        });

        let (text, count) = match built {
            Ok(built) => built,
            Err(e) => {
                error!(error = %e, "failed to build initial report");
                // A readable persisted report stays exportable.
                if let Some(state) = persisted.as_deref().and_then(readable_report_state) {
                    *self.report_state.write() = state;
                }
                return;
            }
        };

        if persisted.as_deref() == Some(text.as_str()) {
            let state = ReportState::for_count(count);
            debug!(?state, "persisted report is current");
            *self.report_state.write() = state;
            return;
        }

        if persisted.is_some() {
            warn!(
                slot = REPORT_SLOT,
                rows = count,
                "persisted report disagrees with records, rebuilding"
            );
        }

        match self.slots.set(REPORT_SLOT, &text) {
            Ok(()) => {
                let state = ReportState::for_count(count);
                *self.report_state.write() = state;
                info!(?state, "created initial report");
            }
            Err(e) => {
                error!(error = %e, "failed to persist initial report");
                // A stale report must not be exported as if it were current.
                if persisted.is_some() {
                    if let Err(e) = self.slots.remove(REPORT_SLOT) {
                        error!(error = %e, "failed to discard stale report");
                    }
                }
            }
        }
    }

    // --- Capture ---

    /// Capture one submission.
    ///
    /// `email` and `password` are trimmed and must not be empty. Once they
    /// pass, the record is appended and the report rebuilt before this
    /// returns; persistence and encoding failures come back as warnings on
    /// the outcome.
    pub fn capture(
        &self,
        email: &str,
        password: &str,
        client_metadata: &str,
    ) -> Result<CaptureOutcome> {
        let email = validation::required("email", email)?;
        let password = validation::required("password", password)?;
        let client_metadata = validation::fits_cell("clientMetadata", client_metadata)?;

        let _lock = self.write_lock.lock();

        let record = Record::captured_at(
            Utc::now(),
            email,
            password,
            client_metadata,
            self.config.source_address.as_str(),
        );

        let mut warnings = Vec::new();

        if let Err(e) = self.store.append(record.clone()) {
            warnings.push(e);
        }

        if let Err(e) = self.rebuild_report() {
            warn!(error = %e, "report left unchanged after capture");
            warnings.push(e);
        }

        info!(
            session_id = %record.session_id,
            total = self.store.len(),
            warnings = warnings.len(),
            "captured submission"
        );

        Ok(CaptureOutcome { record, warnings })
    }

    /// Build the report from all records and persist it.
    ///
    /// On failure the previously persisted report is left as it was.
    fn rebuild_report(&self) -> Result<ReportState> {
        let (blob, count) = self
            .store
            .with_records(|records| report::build_report(records).map(|b| (b, records.len())))?;

        self.slots.set(REPORT_SLOT, &encoding::encode(&blob))?;

        let state = ReportState::for_count(count);
        *self.report_state.write() = state;
        debug!(rows = count, bytes = blob.len(), digest = %blob.digest(), "report rebuilt");
        Ok(state)
    }

    // --- Export / Reset ---

    /// The persisted report, named for today's date.
    pub fn export_artifact(&self) -> Result<ExportArtifact> {
        let text = self
            .slots
            .get(REPORT_SLOT)?
            .ok_or_else(|| CaptureError::NotFound("report".to_string()))?;
        let blob = encoding::decode(&text)?;

        Ok(ExportArtifact {
            blob,
            filename: ExportArtifact::filename_for(
                &self.config.report_prefix,
                Utc::now().date_naive(),
            ),
            mime_type: REPORT_MIME_TYPE,
        })
    }

    /// Remove every record and replace the report with a header-only one.
    pub fn reset(&self) -> Result<()> {
        let _lock = self.write_lock.lock();

        let cleared = self.store.clear();
        let rebuilt = self.rebuild_report();

        match (&cleared, &rebuilt) {
            (Ok(()), Ok(_)) => info!("all captured data cleared"),
            _ => warn!("reset completed with persistence errors"),
        }

        cleared?;
        rebuilt.map(|_| ())
    }

    // --- Queries ---

    /// Totals, distinct emails and first/last capture times.
    pub fn stats(&self) -> Stats {
        self.store.with_records(Stats::from_records)
    }

    /// Current lifecycle state of the persisted report.
    pub fn report_state(&self) -> ReportState {
        *self.report_state.read()
    }

    /// The most recent capture.
    pub fn last_capture(&self) -> Option<Record> {
        self.store.last()
    }

    /// All records in capture order.
    pub fn records(&self) -> Vec<Record> {
        self.store.records()
    }

    /// Re-read the records slot.
    ///
    /// Unlike [`records`](Self::records) this reflects what a restart would
    /// see, so it omits captures whose persistence failed.
    pub fn load(&self) -> Vec<Record> {
        self.store.load()
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }
}

/// Row state of a persisted report, if it decodes to a workbook.
fn readable_report_state(text: &str) -> Option<ReportState> {
    match encoding::decode(text).and_then(|blob| report::read_report(&blob)) {
        Ok(contents) => Some(ReportState::for_count(contents.rows.len().saturating_sub(1))),
        Err(e) => {
            warn!(slot = REPORT_SLOT, error = %e, "malformed report");
            None
        }
    }
}
