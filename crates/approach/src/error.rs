//! Error types for the approach controller and ship agent.

use baymaster_core::SnapshotError;
use baymaster_protocol::WireError;
use thiserror::Error;

/// Approach setup and persistence errors
#[derive(Debug, Error)]
pub enum ApproachError {
    /// Dock or undock command carried no waypoints
    #[error("Approach path is empty")]
    EmptyPath,

    /// Waypoint or orientation component is NaN or infinite
    #[error("Approach data contains a non-finite value: {0}")]
    NonFinite(&'static str),

    /// Target forward or up has zero length
    #[error("Target orientation is degenerate")]
    DegenerateOrientation,

    /// Snapshot encode/decode/storage failure
    #[error("Snapshot error: {0}")]
    Snapshot(#[from] SnapshotError),

    /// Vector field in a snapshot could not be decoded
    #[error("Wire error: {0}")]
    Wire(#[from] WireError),
}

/// Result type for approach operations
pub type ApproachResult<T> = Result<T, ApproachError>;
