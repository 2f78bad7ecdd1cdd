//! Configuration management for Baymaster.
//!
//! One [`Config`] document carries everything the base coordinator, the
//! agent-side approach controller and the node service consume. Every section
//! has working defaults; [`Config::validate`] runs once at startup.

use crate::geometry::Vec3;
use serde::{Deserialize, Serialize};
#[cfg(feature = "toml")]
use std::path::Path;
use thiserror::Error;

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A parameter is outside its permitted range
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// Bay layout rejected
    #[error("Invalid bay layout '{name}': {reason}")]
    InvalidBay {
        /// Bay name
        name: String,
        /// Why the layout was rejected
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub base: BaseConfig,
    pub geometry: GeometryConfig,
    pub approach: ApproachConfig,
    pub network: NetworkConfig,
    pub logging: LoggingConfig,
    /// Static bay inventory used by the node service.
    pub bays: Vec<BayLayout>,
}

/// Base coordinator parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BaseConfig {
    /// Name the base signs outbound messages with
    pub name: String,
    /// Reference point for admission distance checks
    pub position: Vec3,
    /// Requests from agents farther than this (metres) are dropped
    pub max_request_distance: f64,
    /// Grace period for an assigned request before it expires
    pub request_grace_ms: u64,
    /// Age at which an unfulfilled bay reservation is abandoned
    pub reservation_timeout_ms: u64,
    /// Registry entries older than this are pruned
    pub ship_stale_ms: u64,
    /// Period between REQUEST_STATUS broadcasts
    pub status_request_interval_ms: u64,
    /// SQLite snapshot location; in-memory snapshots when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<String>,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            name: "base".to_string(),
            position: Vec3::ZERO,
            max_request_distance: 5_000.0,
            request_grace_ms: 180_000,
            reservation_timeout_ms: 120_000,
            ship_stale_ms: 120_000,
            status_request_interval_ms: 5_000,
            snapshot_path: None,
        }
    }
}

/// Approach path geometry computed by each bay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeometryConfig {
    /// Path segments between standoff point and connector (yields n+1 waypoints)
    pub waypoint_count: usize,
    /// Distance of the approach start point along the connector's forward
    pub standoff_distance: f64,
    /// Extra forward offset on every waypoint to avoid terminal overlap
    pub terminal_offset: f64,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            waypoint_count: 5,
            standoff_distance: 50.0,
            terminal_offset: 1.5,
        }
    }
}

/// Agent-side control law parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApproachConfig {
    /// Orientation error (radians) above which the gyro corrects
    pub gyro_threshold: f64,
    /// Angular rate scale for orientation correction
    pub gyro_speed: f64,
    /// Target speed toward the first waypoint (m/s)
    pub first_speed: f64,
    /// Target speed between interior waypoints (m/s)
    pub medium_speed: f64,
    /// Target speed toward the final waypoint (m/s)
    pub last_speed: f64,
    /// Ramp-down distance around the first and last waypoint
    pub slowdown_distance: f64,
    /// Speed floor inside the ramp
    pub min_speed: f64,
    /// Distance below which a waypoint counts as reached
    pub arrival_threshold: f64,
    /// Recompute outputs only every k ticks
    pub tick_throttle: u32,
    /// Proportional gain from velocity error to force
    pub force_gain: f64,
    /// Resend an unanswered dock request after this long
    pub request_retry_ms: u64,
}

impl Default for ApproachConfig {
    fn default() -> Self {
        Self {
            gyro_threshold: 0.02,
            gyro_speed: 1.0,
            first_speed: 10.0,
            medium_speed: 5.0,
            last_speed: 1.0,
            slowdown_distance: 20.0,
            min_speed: 0.5,
            arrival_threshold: 0.5,
            tick_throttle: 1,
            force_gain: 2.0,
            request_retry_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub bind_address: String,
    pub broadcast_address: String,
    pub tick_interval_ms: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:47800".to_string(),
            broadcast_address: "255.255.255.255:47800".to_string(),
            tick_interval_ms: 100,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub json: bool,
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            json: false,
            level: "info".to_string(),
        }
    }
}

/// Placement of one connector in a static inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectorLayout {
    pub position: Vec3,
    pub forward: Vec3,
}

/// Forward/up of a bay's orientation sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SensorLayout {
    pub forward: Vec3,
    pub up: Vec3,
}

/// Static description of one exchange bay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BayLayout {
    pub name: String,
    pub main: Option<ConnectorLayout>,
    #[serde(default)]
    pub secondary: Vec<ConnectorLayout>,
    pub sensor: Option<SensorLayout>,
}

impl Config {
    /// Load a configuration file. `.json` files are parsed as JSON, anything
    /// else as TOML.
    #[cfg(feature = "toml")]
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let config: Config = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content)?
        } else {
            toml::from_str(&content)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Parse a JSON document (available without the `toml` feature).
    pub fn from_json(content: &str) -> anyhow::Result<Self> {
        let config: Config = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        Self::default()
    }

    /// Reject parameter combinations the control loops cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = &self.base;
        if base.name.trim().is_empty() || base.name.contains('|') {
            return Err(invalid("base.name", "must be non-empty and free of '|'"));
        }
        positive("base.max_request_distance", base.max_request_distance)?;
        nonzero("base.request_grace_ms", base.request_grace_ms)?;
        nonzero("base.reservation_timeout_ms", base.reservation_timeout_ms)?;
        nonzero("base.ship_stale_ms", base.ship_stale_ms)?;

        let geometry = &self.geometry;
        if geometry.waypoint_count == 0 {
            return Err(invalid("geometry.waypoint_count", "must be at least 1"));
        }
        positive("geometry.standoff_distance", geometry.standoff_distance)?;
        if geometry.terminal_offset < 0.0 {
            return Err(invalid("geometry.terminal_offset", "must not be negative"));
        }

        let approach = &self.approach;
        positive("approach.gyro_threshold", approach.gyro_threshold)?;
        positive("approach.gyro_speed", approach.gyro_speed)?;
        positive("approach.first_speed", approach.first_speed)?;
        positive("approach.medium_speed", approach.medium_speed)?;
        positive("approach.last_speed", approach.last_speed)?;
        positive("approach.slowdown_distance", approach.slowdown_distance)?;
        positive("approach.min_speed", approach.min_speed)?;
        positive("approach.arrival_threshold", approach.arrival_threshold)?;
        positive("approach.force_gain", approach.force_gain)?;
        nonzero("approach.request_retry_ms", approach.request_retry_ms)?;
        if approach.tick_throttle == 0 {
            return Err(invalid("approach.tick_throttle", "must be at least 1"));
        }
        let slowest = approach
            .first_speed
            .min(approach.medium_speed)
            .min(approach.last_speed);
        if approach.min_speed > slowest {
            return Err(invalid(
                "approach.min_speed",
                format!("{} exceeds slowest segment speed {}", approach.min_speed, slowest),
            ));
        }

        nonzero("network.tick_interval_ms", self.network.tick_interval_ms)?;

        for bay in &self.bays {
            if bay.name.trim().is_empty() || bay.name.contains('|') {
                return Err(ConfigError::InvalidBay {
                    name: bay.name.clone(),
                    reason: "name must be non-empty and free of '|'".to_string(),
                });
            }
        }
        Ok(())
    }
}

fn invalid(field: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::InvalidValue {
        field,
        reason: reason.into(),
    }
}

fn positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(invalid(field, format!("{} is not a positive number", value)))
    }
}

fn nonzero(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if value == 0 {
        Err(invalid(field, "must be greater than zero"))
    } else {
        Ok(())
    }
}
