//! Baymaster Approach - agent-side docking control
//!
//! Converts a discrete "dock at bay X" command into continuous gyro and
//! thruster outputs. The controller is re-evaluated every tick and never
//! blocks, so the agent loop stays responsive to new commands and to
//! stop/reset while a long approach is under way.
//!
//! # Components
//!
//! - **Hardware**: `Thruster`, `Gyro`, `ShipMotion` and `ShipConnector`
//!   capability traits bundled as [`ShipHandles`]
//! - **Controller**: orientation phase (gyro correction gates translation)
//!   and translation phase (waypoint following with a graduated speed
//!   profile and per-thruster force allocation)
//! - **Agent**: [`ShipAgent`] loop handling `DOCK`, `UNDOCK` and
//!   `REQUEST_STATUS`, with one snapshot push per tick
//! - **Simulation**: [`SimulatedShip`] rigid body for tests and demos

pub mod agent;
pub mod controller;
pub mod error;
pub mod hardware;
pub mod sim;
pub mod snapshot;

pub use agent::{AgentReport, ShipAgent};
pub use controller::{desired_speed, ApproachController, ApproachMode, ApproachPlan, ApproachProgress, TickOutcome};
pub use error::{ApproachError, ApproachResult};
pub use hardware::{Gyro, ShipConnector, ShipHandles, ShipMotion, Thruster};
pub use sim::{SimConnector, SimulatedShip};
pub use snapshot::{ApproachSnapshot, APPROACH_SNAPSHOT_VERSION};
