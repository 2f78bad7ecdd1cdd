//! Error types for wire decoding.

use thiserror::Error;

/// Errors raised while decoding a broadcast frame.
#[derive(Debug, Error, PartialEq)]
pub enum WireError {
    /// Frame has no `Command` field
    #[error("Frame has no Command field")]
    MissingCommand,

    /// Command is not part of the protocol
    #[error("Unknown command: {0}")]
    UnknownCommand(String),

    /// A field is present but cannot be parsed
    #[error("Invalid {field} field: {value:?}")]
    InvalidField {
        /// Field name
        field: &'static str,
        /// Raw value
        value: String,
    },

    /// A vector does not have exactly three components
    #[error("Malformed vector: {0:?}")]
    MalformedVector(String),
}

/// Result type for wire operations.
pub type WireResult<T> = Result<T, WireError>;
