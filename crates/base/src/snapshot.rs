//! Base-side snapshot encoding.
//!
//! Keys: `version`, `requests.count`, `requests`, `bays`. The registry is
//! not persisted; it rebuilds from status polling within one interval.

use crate::bay::BayState;
use crate::request::DockRequest;
use baymaster_core::{FlatSnapshot, SnapshotError};

/// Current base snapshot format.
pub const BASE_SNAPSHOT_VERSION: u32 = 1;

const REQUESTS_COUNT_KEY: &str = "requests.count";
const REQUESTS_KEY: &str = "requests";
const BAYS_KEY: &str = "bays";

/// Everything the base needs to resume after a restart.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BaseSnapshot {
    /// Request queue in order
    pub requests: Vec<DockRequest>,
    /// Per-bay reservation and occupant state
    pub bays: Vec<BayState>,
}

impl BaseSnapshot {
    pub fn to_flat(&self) -> Result<FlatSnapshot, SnapshotError> {
        let mut flat = FlatSnapshot::new(BASE_SNAPSHOT_VERSION);
        flat.insert(REQUESTS_COUNT_KEY, self.requests.len().to_string());
        flat.insert_json(REQUESTS_KEY, &self.requests)?;
        flat.insert_json(BAYS_KEY, &self.bays)?;
        Ok(flat)
    }

    pub fn from_flat(flat: &FlatSnapshot) -> Result<Self, SnapshotError> {
        flat.check_version(BASE_SNAPSHOT_VERSION)?;
        let count: usize = flat.require_parsed(REQUESTS_COUNT_KEY)?;
        let requests: Vec<DockRequest> = flat.require_json(REQUESTS_KEY)?;
        if requests.len() != count {
            return Err(SnapshotError::Malformed {
                key: REQUESTS_COUNT_KEY.to_string(),
                reason: format!("count {} but {} requests stored", count, requests.len()),
            });
        }
        let bays = flat.require_json(BAYS_KEY)?;
        Ok(Self { requests, bays })
    }
}
