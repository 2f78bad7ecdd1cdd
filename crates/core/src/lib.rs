//! Core functionality for the Baymaster docking coordination system.
//!
//! This crate provides the fundamental types and utilities shared by the
//! base coordinator, the agent-side approach controller and the node service:
//! vector geometry, an injectable clock, configuration, logging and the flat
//! key/value snapshot stores.

pub mod clock;
pub mod config;
pub mod geometry;
pub mod logging;
pub mod snapshot;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{
    ApproachConfig, BaseConfig, BayLayout, Config, ConfigError, ConnectorLayout, GeometryConfig,
    LoggingConfig, NetworkConfig, SensorLayout,
};
pub use geometry::{angle_between, format_distance, interpolate_path, lerp, rotation_axis, Vec3};
pub use snapshot::{FlatSnapshot, MemorySnapshotStore, SnapshotError, SnapshotStore};
#[cfg(feature = "sqlite")]
pub use snapshot::SqliteSnapshotStore;
