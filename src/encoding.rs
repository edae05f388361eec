//! Binary ↔ text encoding for the report slot.
//!
//! Standard base64 with padding, the same text form a browser's `btoa`
//! produces, so existing persisted reports decode unchanged.

use crate::error::{CaptureError, Result};
use crate::slots::REPORT_SLOT;
use crate::types::SpreadsheetBlob;
use base64::engine::general_purpose;
use base64::Engine as _;

/// Encode a report for a text-only slot.
pub fn encode(blob: &SpreadsheetBlob) -> String {
    general_purpose::STANDARD.encode(blob.as_bytes())
}

/// Decode text produced by [`encode`].
pub fn decode(text: &str) -> Result<SpreadsheetBlob> {
    general_purpose::STANDARD
        .decode(text.trim())
        .map(SpreadsheetBlob::new)
        .map_err(|e| CaptureError::decode(REPORT_SLOT, e))
}

/// `data:` URL carrying `bytes`, for handing a download to a host.
pub fn data_url(mime_type: &str, bytes: &[u8]) -> String {
    format!(
        "data:{};base64,{}",
        mime_type,
        general_purpose::STANDARD.encode(bytes)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_byte_values() {
        let blob = SpreadsheetBlob::new((0..=255u8).collect());
        assert_eq!(decode(&encode(&blob)).unwrap(), blob);
    }

    #[test]
    fn test_empty_blob() {
        let blob = SpreadsheetBlob::new(Vec::new());
        assert_eq!(encode(&blob), "");
        assert_eq!(decode("").unwrap(), blob);
    }

    #[test]
    fn test_matches_btoa_output() {
        let blob = SpreadsheetBlob::new(b"PK\x03\x04".to_vec());
        assert_eq!(encode(&blob), "UEsDBA==");
    }

    #[test]
    fn test_invalid_text_is_decode_error() {
        let result = decode("not*base64!");
        assert!(matches!(
            result,
            Err(CaptureError::Decode { ref slot, .. }) if slot == REPORT_SLOT
        ));
    }

    #[test]
    fn test_data_url() {
        assert_eq!(data_url("text/plain", b"hi"), "data:text/plain;base64,aGk=");
    }
}
