//! Error types for base coordination.
//!
//! None of these stop the control loop. Bay errors shrink capacity at
//! discovery; snapshot errors are logged and the cycle carries on.

use baymaster_core::SnapshotError;
use thiserror::Error;

/// Reasons a discovered bay is excluded from the active set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BayError {
    /// No main connector handle
    #[error("Bay '{0}' has no main connector")]
    MissingMainConnector(String),

    /// No orientation sensor handle
    #[error("Bay '{0}' has no orientation sensor")]
    MissingOrientationSensor(String),

    /// Bay name unusable on the wire
    #[error("Bay name {0:?} is empty or contains a field separator")]
    InvalidName(String),

    /// Another bay already uses this name
    #[error("Duplicate bay name '{0}'")]
    DuplicateName(String),
}

/// Errors surfaced by the base coordinator's setup and persistence paths.
#[derive(Debug, Error)]
pub enum BaseError {
    /// Bay validation failure
    #[error("Bay error: {0}")]
    Bay(#[from] BayError),

    /// Snapshot encode/decode/storage failure
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Unknown bay referenced
    #[error("Bay not found: {0}")]
    BayNotFound(String),
}

/// Result type for base operations.
pub type BaseResult<T> = Result<T, BaseError>;
