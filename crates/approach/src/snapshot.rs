//! Agent-side snapshot encoding.
//!
//! Keys: `version`, `approach.mode`, `approach.index`, `approach.forward`,
//! `approach.up`, `approach.waypoints`, `approach.bay`, `approach.ticks`.
//! Vectors use the wire encoding, whose float formatting round-trips exactly.
//! `approach.bay` and `approach.ticks` may be absent; they read back as no
//! bay and a zero throttle count.

use crate::controller::{ApproachMode, ApproachPlan, ApproachProgress};
use crate::error::{ApproachError, ApproachResult};
use baymaster_core::{FlatSnapshot, SnapshotError, Vec3};
use baymaster_protocol::{decode_vector, decode_waypoints, encode_vector, encode_waypoints};

/// Current agent snapshot format.
pub const APPROACH_SNAPSHOT_VERSION: u32 = 1;

const MODE_KEY: &str = "approach.mode";
const INDEX_KEY: &str = "approach.index";
const FORWARD_KEY: &str = "approach.forward";
const UP_KEY: &str = "approach.up";
const WAYPOINTS_KEY: &str = "approach.waypoints";
const BAY_KEY: &str = "approach.bay";
const TICKS_KEY: &str = "approach.ticks";

const MODE_IDLE: &str = "idle";

/// Approach state as persisted.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ApproachSnapshot {
    /// `None` when idle
    pub progress: Option<ApproachProgress>,
    /// Bay being approached, occupied or left
    pub bay: Option<String>,
    /// Tick-throttle counter
    pub ticks: u64,
}

impl ApproachSnapshot {
    pub fn to_flat(&self) -> FlatSnapshot {
        let mut flat = FlatSnapshot::new(APPROACH_SNAPSHOT_VERSION);
        flat.insert(BAY_KEY, self.bay.as_deref().unwrap_or(""));
        flat.insert(TICKS_KEY, self.ticks.to_string());
        match &self.progress {
            Some(progress) => {
                flat.insert(MODE_KEY, progress.plan.mode.as_str());
                flat.insert(INDEX_KEY, progress.index.to_string());
                flat.insert(FORWARD_KEY, encode_vector(progress.plan.forward));
                flat.insert(UP_KEY, encode_vector(progress.plan.up));
                flat.insert(WAYPOINTS_KEY, encode_waypoints(&progress.plan.waypoints));
            }
            None => {
                flat.insert(MODE_KEY, MODE_IDLE);
                flat.insert(INDEX_KEY, "0");
                flat.insert(FORWARD_KEY, encode_vector(Vec3::ZERO));
                flat.insert(UP_KEY, encode_vector(Vec3::ZERO));
                flat.insert(WAYPOINTS_KEY, "");
            }
        }
        flat
    }

    pub fn from_flat(flat: &FlatSnapshot) -> ApproachResult<Self> {
        flat.check_version(APPROACH_SNAPSHOT_VERSION)?;
        let bay = flat.get(BAY_KEY).filter(|b| !b.is_empty()).map(str::to_string);
        let ticks = match flat.get(TICKS_KEY) {
            Some(_) => flat.require_parsed(TICKS_KEY)?,
            None => 0,
        };
        let mode = match flat.require(MODE_KEY)? {
            MODE_IDLE => {
                return Ok(Self {
                    progress: None,
                    bay,
                    ticks,
                })
            }
            "docking" => ApproachMode::Docking,
            "departing" => ApproachMode::Departing,
            other => {
                return Err(SnapshotError::Malformed {
                    key: MODE_KEY.to_string(),
                    reason: format!("unknown mode {:?}", other),
                }
                .into())
            }
        };

        let plan = ApproachPlan {
            waypoints: decode_waypoints(flat.require(WAYPOINTS_KEY)?)?,
            forward: decode_vector(flat.require(FORWARD_KEY)?)?,
            up: decode_vector(flat.require(UP_KEY)?)?,
            mode,
        };
        let index: usize = flat.require_parsed(INDEX_KEY)?;
        if index > plan.waypoints.len() {
            return Err(ApproachError::Snapshot(SnapshotError::Malformed {
                key: INDEX_KEY.to_string(),
                reason: format!("index {} past {} waypoints", index, plan.waypoints.len()),
            }));
        }
        Ok(Self {
            progress: Some(ApproachProgress { plan, index }),
            bay,
            ticks,
        })
    }
}
