//! Error types for the capture pipeline.

use thiserror::Error;

/// Main error type for capture, persistence and report operations.
///
/// No variant is fatal to the host process. Persistence and encoding
/// failures during a capture are reported as warnings on the outcome rather
/// than aborting it.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("Field `{field}` is {len} UTF-16 code units long (max {max})")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        max: usize,
    },

    #[error("Failed to decode slot `{slot}`: {reason}")]
    Decode { slot: String, reason: String },

    #[error("Quota exceeded writing slot `{key}`: {needed} bytes needed, {available} available")]
    QuotaExceeded {
        key: String,
        needed: usize,
        available: usize,
    },

    #[error("Report encoding failed: {0}")]
    Encoding(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Invalid slot format: {0}")]
    InvalidFormat(String),

    #[error("Slot directory is locked by another process")]
    Locked,

    #[error("Slot directory not initialized")]
    NotInitialized,
}

impl CaptureError {
    /// Wrap any error raised while reading `slot` as a decode failure.
    pub fn decode(slot: impl Into<String>, reason: impl ToString) -> Self {
        CaptureError::Decode {
            slot: slot.into(),
            reason: reason.to_string(),
        }
    }
}

impl From<serde_json::Error> for CaptureError {
    fn from(e: serde_json::Error) -> Self {
        CaptureError::Serialization(e.to_string())
    }
}

impl From<zip::result::ZipError> for CaptureError {
    fn from(e: zip::result::ZipError) -> Self {
        CaptureError::Encoding(e.to_string())
    }
}

/// Result type for capture operations.
pub type Result<T> = std::result::Result<T, CaptureError>;
