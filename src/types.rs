//! Core types for the capture pipeline.

use chrono::{DateTime, SecondsFormat, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fmt;

/// Alphabet for the random session id suffix (base 36).
const SESSION_ALPHABET: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Length of the random session id suffix.
const SESSION_SUFFIX_LEN: usize = 9;

/// One captured submission.
///
/// Records are never mutated after creation. The store hands out clones.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Email as submitted (trimmed).
    pub email: String,

    /// Password as submitted (trimmed). Stored in cleartext.
    pub password: String,

    /// Capture instant, ISO-8601 UTC with millisecond precision.
    pub timestamp: String,

    /// Free-form description of the capturing client.
    #[serde(alias = "userAgent")]
    pub client_metadata: String,

    /// Placeholder address; no real network capture happens.
    #[serde(alias = "ipAddress")]
    pub source_address: String,

    /// Best-effort unique id generated at capture time.
    pub session_id: String,
}

impl Record {
    /// Build a record captured at `at`, generating its session id.
    pub fn captured_at(
        at: DateTime<Utc>,
        email: impl Into<String>,
        password: impl Into<String>,
        client_metadata: impl Into<String>,
        source_address: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            timestamp: format_timestamp(at),
            client_metadata: client_metadata.into(),
            source_address: source_address.into(),
            session_id: generate_session_id(at),
        }
    }

    /// The row this record contributes to the report, in column order.
    pub fn cells(&self) -> [&str; 6] {
        [
            self.email.as_str(),
            self.password.as_str(),
            self.timestamp.as_str(),
            self.client_metadata.as_str(),
            self.source_address.as_str(),
            self.session_id.as_str(),
        ]
    }
}

/// Format an instant the way records store it (`2026-01-02T03:04:05.678Z`).
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Generate a session id: `session_<unix millis>_<9 base-36 chars>`.
pub fn generate_session_id(at: DateTime<Utc>) -> String {
    let mut rng = rand::rng();
    let suffix: String = (0..SESSION_SUFFIX_LEN)
        .map(|_| SESSION_ALPHABET[rng.random_range(0..SESSION_ALPHABET.len())] as char)
        .collect();
    format!("session_{}_{}", at.timestamp_millis(), suffix)
}

/// Serialized XLSX workbook bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct SpreadsheetBlob(Vec<u8>);

impl SpreadsheetBlob {
    pub fn new(bytes: Vec<u8>) -> Self {
        SpreadsheetBlob(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// SHA-256 of the blob, hex encoded.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.0);
        hex::encode(hasher.finalize())
    }
}

impl fmt::Debug for SpreadsheetBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SpreadsheetBlob({} bytes, {}...)", self.0.len(), &self.digest()[..8])
    }
}

/// Lifecycle of the persisted report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportState {
    /// No report has been persisted yet.
    Uninitialized,
    /// Header-only report.
    Empty,
    /// Report with at least one data row.
    Populated,
}

impl ReportState {
    /// State of a report successfully rebuilt from `record_count` records.
    pub fn for_count(record_count: usize) -> Self {
        if record_count == 0 {
            ReportState::Empty
        } else {
            ReportState::Populated
        }
    }
}

/// First and last capture timestamps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Aggregate statistics over all captured records.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total_attempts: usize,
    pub unique_emails: usize,
    pub date_range: DateRange,
}

impl Stats {
    /// Compute statistics over records in capture order.
    pub fn from_records(records: &[Record]) -> Self {
        let unique: HashSet<&str> = records.iter().map(|r| r.email.as_str()).collect();
        Self {
            total_attempts: records.len(),
            unique_emails: unique.len(),
            date_range: DateRange {
                start: records.first().map(|r| r.timestamp.clone()),
                end: records.last().map(|r| r.timestamp.clone()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(ms: i64) -> DateTime<Utc> {
        Utc.timestamp_millis_opt(ms).unwrap()
    }

    #[test]
    fn test_timestamp_format() {
        let ts = format_timestamp(at(1_700_000_000_123));
        assert_eq!(ts, "2023-11-14T22:13:20.123Z");
    }

    #[test]
    fn test_session_id_shape() {
        let id = generate_session_id(at(1_700_000_000_123));
        let parts: Vec<&str> = id.split('_').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "session");
        assert_eq!(parts[1], "1700000000123");
        assert_eq!(parts[2].len(), SESSION_SUFFIX_LEN);
        assert!(parts[2]
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_lowercase()));
    }

    #[test]
    fn test_record_json_field_names() {
        let record = Record::captured_at(at(0), "a@x.com", "pw", "agent", "Simulated");
        let value = serde_json::to_value(&record).unwrap();
        for field in [
            "email",
            "password",
            "timestamp",
            "clientMetadata",
            "sourceAddress",
            "sessionId",
        ] {
            assert!(value.get(field).is_some(), "missing {}", field);
        }
    }

    #[test]
    fn test_record_accepts_legacy_field_names() {
        let json = r#"{"email":"a@x.com","password":"pw","timestamp":"2024-01-01T00:00:00.000Z",
            "userAgent":"Mozilla/5.0","ipAddress":"Simulated","sessionId":"session_1_abc"}"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.client_metadata, "Mozilla/5.0");
        assert_eq!(record.source_address, "Simulated");
    }

    #[test]
    fn test_stats_empty() {
        let stats = Stats::from_records(&[]);
        assert_eq!(stats.total_attempts, 0);
        assert_eq!(stats.unique_emails, 0);
        assert_eq!(stats.date_range, DateRange::default());
    }

    #[test]
    fn test_stats_serializes_camel_case() {
        let value = serde_json::to_value(Stats::default()).unwrap();
        assert!(value.get("totalAttempts").is_some());
        assert!(value.get("uniqueEmails").is_some());
        assert!(value["dateRange"]["start"].is_null());
    }

    #[test]
    fn test_report_state_for_count() {
        assert_eq!(ReportState::for_count(0), ReportState::Empty);
        assert_eq!(ReportState::for_count(3), ReportState::Populated);
    }

    #[test]
    fn test_blob_digest_is_stable() {
        let blob = SpreadsheetBlob::new(b"hello".to_vec());
        assert_eq!(blob.digest(), blob.clone().digest());
        assert_eq!(blob.digest().len(), 64);
    }
}
