//! Exchange bays: one main connector, optional secondary connectors and an
//! orientation sensor, allocated as a single docking resource.
//!
//! Connector telemetry is ground truth. The cached occupant is recomputed
//! from it every cycle and always overrides what the coordinator assumed; the
//! reservation is a soft, timeout-bounded claim layered on top.

use crate::error::BayError;
use crate::hardware::{BayParts, Connector, ConnectorStatus, OrientationSensor};
use baymaster_core::{interpolate_path, Vec3};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Occupant name used when a connector is locked but cannot name the ship.
pub const UNKNOWN_OCCUPANT: &str = "<unknown>";

/// Persisted, telemetry-independent part of a bay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BayState {
    /// Bay name
    pub name: String,
    /// Occupant observed on the last refresh
    pub occupant: Option<String>,
    /// Agent holding the soft reservation
    pub reserved_for: Option<String>,
    /// When the reservation was taken (ms)
    pub reserved_at_ms: Option<u64>,
}

/// What happened to the reservation during a refresh.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReservationOutcome {
    /// No reservation, or still waiting within the timeout
    Unchanged,
    /// The reserved agent is now the occupant
    Fulfilled {
        /// Agent that arrived
        agent: String,
    },
    /// The reservation aged out without the agent arriving
    Abandoned {
        /// Agent that never arrived
        agent: String,
    },
}

/// Result of [`ExchangeBay::refresh_occupancy`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyUpdate {
    /// Occupant before the refresh
    pub previous: Option<String>,
    /// Occupant after the refresh
    pub current: Option<String>,
    /// Reservation transition
    pub reservation: ReservationOutcome,
}

impl OccupancyUpdate {
    /// True when the occupant changed.
    pub fn occupant_changed(&self) -> bool {
        self.previous != self.current
    }
}

/// Approach path and its reverse.
#[derive(Debug, Clone, PartialEq)]
pub struct ApproachPath {
    /// Waypoint 0 farthest out, last waypoint at the connector
    pub approach: Vec<Vec3>,
    /// The approach reversed, for leaving the bay
    pub departure: Vec<Vec3>,
}

/// One docking resource.
pub struct ExchangeBay {
    name: String,
    main: Arc<dyn Connector>,
    secondary: Vec<Arc<dyn Connector>>,
    sensor: Arc<dyn OrientationSensor>,
    occupant: Option<String>,
    reserved_for: Option<String>,
    reserved_at_ms: Option<u64>,
}

impl std::fmt::Debug for ExchangeBay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExchangeBay")
            .field("name", &self.name)
            .field("secondary", &self.secondary.len())
            .field("occupant", &self.occupant)
            .field("reserved_for", &self.reserved_for)
            .field("reserved_at_ms", &self.reserved_at_ms)
            .finish()
    }
}

impl ExchangeBay {
    /// Check that discovered parts form a usable bay.
    pub fn validate(parts: &BayParts) -> Result<(), BayError> {
        if parts.name.trim().is_empty() || parts.name.contains('|') {
            return Err(BayError::InvalidName(parts.name.clone()));
        }
        if parts.main.is_none() {
            return Err(BayError::MissingMainConnector(parts.name.clone()));
        }
        if parts.sensor.is_none() {
            return Err(BayError::MissingOrientationSensor(parts.name.clone()));
        }
        Ok(())
    }

    /// Build a bay from validated parts.
    pub fn from_parts(parts: BayParts) -> Result<Self, BayError> {
        Self::validate(&parts)?;
        let BayParts {
            name,
            main,
            secondary,
            sensor,
        } = parts;
        match (main, sensor) {
            (Some(main), Some(sensor)) => Ok(Self {
                name,
                main,
                secondary,
                sensor,
                occupant: None,
                reserved_for: None,
                reserved_at_ms: None,
            }),
            (None, _) => Err(BayError::MissingMainConnector(name)),
            (_, None) => Err(BayError::MissingOrientationSensor(name)),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Occupant observed on the last refresh.
    pub fn occupant(&self) -> Option<&str> {
        self.occupant.as_deref()
    }

    /// Agent holding the reservation.
    pub fn reserved_for(&self) -> Option<&str> {
        self.reserved_for.as_deref()
    }

    /// Age of the reservation, if any.
    pub fn reservation_age_ms(&self, now_ms: u64) -> Option<u64> {
        self.reserved_at_ms.map(|at| now_ms.saturating_sub(at))
    }

    /// Position of the main connector.
    pub fn position(&self) -> Vec3 {
        self.main.position()
    }

    /// Target (forward, up) frame for ships docking here.
    pub fn orientation(&self) -> (Vec3, Vec3) {
        (self.sensor.forward(), self.sensor.up())
    }

    fn connectors(&self) -> impl Iterator<Item = &Arc<dyn Connector>> {
        std::iter::once(&self.main).chain(self.secondary.iter())
    }

    /// True when any connector is locked right now.
    pub fn is_connected(&self) -> bool {
        self.connectors()
            .any(|c| c.status() == ConnectorStatus::Connected)
    }

    /// Free for a new assignment: nothing locked, no occupant cached from the
    /// last cycle and no outstanding reservation.
    pub fn is_free(&self) -> bool {
        !self.is_connected() && self.occupant.is_none() && self.reserved_for.is_none()
    }

    /// Approach path of `segments + 1` points from the standoff point to the
    /// connector, each pushed `terminal_offset` out along the connector's
    /// forward, plus its reverse.
    pub fn compute_approach_waypoints(
        &self,
        segments: usize,
        standoff_distance: f64,
        terminal_offset: f64,
    ) -> ApproachPath {
        let connector = self.main.position();
        let forward = self.main.forward().normalize_or_zero();
        let start = connector + forward * standoff_distance;
        let approach: Vec<Vec3> = interpolate_path(start, connector, segments)
            .into_iter()
            .map(|p| p + forward * terminal_offset)
            .collect();
        let departure = approach.iter().rev().copied().collect();
        ApproachPath {
            approach,
            departure,
        }
    }

    /// Claim the bay for `agent` and restart the reservation timer. Callers
    /// check [`is_free`](Self::is_free) first.
    pub fn reserve(&mut self, agent: &str, now_ms: u64) {
        info!(bay = %self.name, agent = %agent, "Bay reserved");
        self.reserved_for = Some(agent.to_string());
        self.reserved_at_ms = Some(now_ms);
    }

    /// Drop the reservation if `agent` holds it.
    pub fn release_reservation(&mut self, agent: &str) -> bool {
        if self.reserved_for.as_deref() == Some(agent) {
            debug!(bay = %self.name, agent = %agent, "Reservation released");
            self.reserved_for = None;
            self.reserved_at_ms = None;
            true
        } else {
            false
        }
    }

    fn live_occupant(&self) -> Option<String> {
        self.connectors()
            .find(|c| c.status() == ConnectorStatus::Connected)
            .map(|c| c.other_ship().unwrap_or_else(|| UNKNOWN_OCCUPANT.to_string()))
    }

    /// Recompute the occupant from connector telemetry and resolve the
    /// reservation: cleared when the reserved agent is the occupant, abandoned
    /// once older than `reservation_timeout_ms`.
    pub fn refresh_occupancy(&mut self, now_ms: u64, reservation_timeout_ms: u64) -> OccupancyUpdate {
        let previous = self.occupant.take();
        self.occupant = self.live_occupant();
        if previous != self.occupant {
            debug!(
                bay = %self.name,
                previous = ?previous,
                current = ?self.occupant,
                "Bay occupancy changed"
            );
        }

        let mut reservation = ReservationOutcome::Unchanged;
        if let Some(agent) = self.reserved_for.clone() {
            if self.occupant.as_deref() == Some(agent.as_str()) {
                info!(bay = %self.name, agent = %agent, "Reserved agent docked");
                self.reserved_for = None;
                self.reserved_at_ms = None;
                reservation = ReservationOutcome::Fulfilled { agent };
            } else if self
                .reservation_age_ms(now_ms)
                .map_or(true, |age| age > reservation_timeout_ms)
            {
                warn!(bay = %self.name, agent = %agent, "Reservation timed out, bay returned to pool");
                self.reserved_for = None;
                self.reserved_at_ms = None;
                reservation = ReservationOutcome::Abandoned { agent };
            }
        }

        OccupancyUpdate {
            previous,
            current: self.occupant.clone(),
            reservation,
        }
    }

    /// Persistable state.
    pub fn state(&self) -> BayState {
        BayState {
            name: self.name.clone(),
            occupant: self.occupant.clone(),
            reserved_for: self.reserved_for.clone(),
            reserved_at_ms: self.reserved_at_ms,
        }
    }

    /// Apply persisted state. Telemetry overrides the occupant next refresh.
    pub fn restore(&mut self, state: &BayState) {
        self.occupant = state.occupant.clone();
        self.reserved_for = state.reserved_for.clone();
        self.reserved_at_ms = state.reserved_at_ms;
    }
}
