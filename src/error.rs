//! # Error Types
//!
//! This module defines error types used throughout the seatlabel library.
//!
//! Per-record failures inside a batch are reported as outcomes and never
//! abort the batch. Job-level failures (store unreachable, printer cannot be
//! opened) are returned as a single `Err` to the caller.

use thiserror::Error;

/// Main error type for seatlabel operations
#[derive(Debug, Error)]
pub enum LabelError {
    /// Barcode payload cannot be encoded (empty, or outside Code 128)
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Record store or printer unreachable
    #[error("Connectivity error: {0}")]
    Connectivity(String),

    /// Configured printer not found, even by partial name match
    #[error("Printer '{requested}' not found (available: {})", available.join(", "))]
    DeviceUnavailable {
        requested: String,
        available: Vec<String>,
    },

    /// One label of a batch failed to render
    #[error("Label {index} failed: {reason}")]
    PartialRender { index: usize, reason: String },

    /// Image processing or encoding error
    #[error("Image error: {0}")]
    Image(String),

    /// Invalid settings or settings file
    #[error("Config error: {0}")]
    Config(String),

    /// Sign-in refused, or an operation needs a signed-in user
    #[error("Not authorized: {0}")]
    Unauthorized(String),

    /// Background task died before reporting
    #[error("Task error: {0}")]
    Task(String),

    /// I/O error wrapper
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_unavailable_lists_printers() {
        let err = LabelError::DeviceUnavailable {
            requested: "Xprinter".to_string(),
            available: vec!["Office Laser".to_string(), "PDF".to_string()],
        };
        assert_eq!(
            err.to_string(),
            "Printer 'Xprinter' not found (available: Office Laser, PDF)"
        );
    }

    #[test]
    fn test_io_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "gone");
        let err: LabelError = io.into();
        assert!(matches!(err, LabelError::Io(_)));
    }
}
