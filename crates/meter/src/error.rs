//! Error types for the meter.

use thiserror::Error;

/// Errors that can occur while measuring, instrumenting or reporting.
#[derive(Debug, Error)]
pub enum MeterError {
    /// Label is empty or contains the path delimiter
    #[error("Invalid label {label:?}: {reason}")]
    InvalidLabel { label: String, reason: &'static str },

    /// Absolute path does not start at a known forest root
    #[error("Invalid measurement path: {0}")]
    InvalidPath(String),

    /// Member name is not defined in the method table
    #[error("Unknown member {type_name}.{member}")]
    UnknownMember { type_name: String, member: String },

    /// No formatter is registered under this name
    #[error("Unknown report format: {0}")]
    UnknownFormat(String),

    /// Failed to (de)serialize configuration or report data
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for meter operations.
pub type MeterResult<T> = Result<T, MeterError>;
