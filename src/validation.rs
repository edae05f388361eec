//! Submission checks.
//!
//! The pipeline enforces only non-empty fields and the spreadsheet cell
//! limit. [`is_plausible_email`] is the syntactic check the capture form
//! runs before it enables submission; the pipeline never calls it.

use crate::error::{CaptureError, Result};
use crate::report::MAX_CELL_CHARS;
use regex::Regex;
use std::sync::OnceLock;
use tracing::error;

const EMAIL_PATTERN: &str = r"^[^\s@]+@[^\s@]+\.[^\s@]+$";

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| match Regex::new(EMAIL_PATTERN) {
            Ok(re) => Some(re),
            Err(e) => {
                error!(error = %e, "email pattern failed to compile");
                None
            }
        })
        .as_ref()
}

/// `something@domain.tld` with no whitespace.
pub fn is_plausible_email(email: &str) -> bool {
    email_pattern().is_some_and(|re| re.is_match(email))
}

/// Trim a required field and reject it if nothing is left.
pub(crate) fn required<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(CaptureError::EmptyField(field));
    }
    fits_cell(field, trimmed)
}

/// Reject values the report could not hold in one cell. Length is counted
/// in UTF-16 code units, as spreadsheet applications do.
pub(crate) fn fits_cell<'a>(field: &'static str, value: &'a str) -> Result<&'a str> {
    let len = value.encode_utf16().count();
    if len > MAX_CELL_CHARS {
        return Err(CaptureError::FieldTooLong {
            field,
            len,
            max: MAX_CELL_CHARS,
        });
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plausible_emails() {
        assert!(is_plausible_email("a@b.com"));
        assert!(is_plausible_email("first.last+tag@mail.example.org"));
    }

    #[test]
    fn test_implausible_emails() {
        assert!(!is_plausible_email(""));
        assert!(!is_plausible_email("a@b"));
        assert!(!is_plausible_email("a b@c.com"));
        assert!(!is_plausible_email("@c.com"));
        assert!(!is_plausible_email("a@@c.com"));
    }

    #[test]
    fn test_required_trims() {
        assert_eq!(required("email", "  a@b.com \n").unwrap(), "a@b.com");
        assert!(matches!(
            required("password", "   "),
            Err(CaptureError::EmptyField("password"))
        ));
    }

    #[test]
    fn test_fits_cell_limit() {
        let long = "x".repeat(MAX_CELL_CHARS + 1);
        assert!(matches!(
            fits_cell("clientMetadata", &long),
            Err(CaptureError::FieldTooLong { field: "clientMetadata", .. })
        ));
        assert!(fits_cell("clientMetadata", &long[1..]).is_ok());
    }

    #[test]
    fn test_fits_cell_counts_utf16_units() {
        let over = "\u{1F600}".repeat(MAX_CELL_CHARS / 2 + 1);
        assert!(matches!(
            fits_cell("password", &over),
            Err(CaptureError::FieldTooLong { len, .. }) if len == MAX_CELL_CHARS + 1
        ));

        let under = "\u{1F600}".repeat(MAX_CELL_CHARS / 2);
        assert!(fits_cell("password", &under).is_ok());
    }

    #[test]
    fn test_email_pattern_compiles() {
        assert!(email_pattern().is_some());
    }
}
