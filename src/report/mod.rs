//! Report generation.
//!
//! The report is a pure function of the record sequence: it is rebuilt from
//! scratch after every mutation and never patched in place.

mod xlsx;

pub use xlsx::{Column, SheetContents, MAX_CELL_CHARS};

use crate::error::Result;
use crate::types::{Record, SpreadsheetBlob};

/// Name of the single worksheet.
pub const SHEET_NAME: &str = "Phishing Simulation Data";

/// File extension of exported reports.
pub const REPORT_EXTENSION: &str = "xlsx";

/// MIME type of exported reports.
pub const REPORT_MIME_TYPE: &str =
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

/// Fixed column schema, in row order.
pub const COLUMNS: [Column; 6] = [
    Column { header: "Email", width: 30 },
    Column { header: "Password", width: 20 },
    Column { header: "Timestamp", width: 25 },
    Column { header: "Client Metadata", width: 50 },
    Column { header: "Source Address", width: 15 },
    Column { header: "Session Id", width: 25 },
];

/// Render all records, in order, into a single-sheet workbook.
///
/// The same sequence always yields byte-identical output.
pub fn build_report(records: &[Record]) -> Result<SpreadsheetBlob> {
    let bytes = xlsx::write_workbook(SHEET_NAME, &COLUMNS, records.iter().map(Record::cells))?;
    Ok(SpreadsheetBlob::new(bytes))
}

/// Parse a report back into its sheet name and rows (header first).
pub fn read_report(blob: &SpreadsheetBlob) -> Result<SheetContents> {
    xlsx::read_workbook(blob.as_bytes())
}

/// The header row as strings.
pub fn header_row() -> Vec<String> {
    COLUMNS.iter().map(|c| c.header.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CaptureError;
    use chrono::{TimeZone, Utc};

    fn records(n: usize) -> Vec<Record> {
        (0..n)
            .map(|i| {
                let at = Utc.timestamp_millis_opt(1_700_000_000_000 + i as i64).unwrap();
                Record::captured_at(at, format!("user{}@x.com", i), format!("pw{}", i), "agent", "Simulated")
            })
            .collect()
    }

    #[test]
    fn test_empty_report_is_header_only() {
        let report = read_report(&build_report(&[]).unwrap()).unwrap();
        assert_eq!(report.name, SHEET_NAME);
        assert_eq!(report.rows, vec![header_row()]);
    }

    #[test]
    fn test_rows_follow_record_order() {
        let records = records(3);
        let report = read_report(&build_report(&records).unwrap()).unwrap();

        assert_eq!(report.rows.len(), 4);
        for (row, record) in report.rows[1..].iter().zip(&records) {
            let expected: Vec<String> = record.cells().iter().map(|c| c.to_string()).collect();
            assert_eq!(row, &expected);
        }
    }

    #[test]
    fn test_build_is_deterministic() {
        let records = records(5);
        let first = build_report(&records).unwrap();
        let second = build_report(&records).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.digest(), second.digest());
    }

    #[test]
    fn test_different_records_change_the_report() {
        let a = build_report(&records(2)).unwrap();
        let b = build_report(&records(3)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_oversized_field_aborts_build() {
        let mut records = records(1);
        records[0].client_metadata = "m".repeat(MAX_CELL_CHARS + 1);
        assert!(matches!(build_report(&records), Err(CaptureError::Encoding(_))));
    }

    #[test]
    fn test_header_matches_schema() {
        assert_eq!(
            header_row(),
            vec![
                "Email",
                "Password",
                "Timestamp",
                "Client Metadata",
                "Source Address",
                "Session Id"
            ]
        );
    }
}
