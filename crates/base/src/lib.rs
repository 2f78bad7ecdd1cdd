//! Baymaster Base - exchange bay allocation for one installation
//!
//! The base owns a fixed set of exchange bays and hands them out to ships
//! over a lossy broadcast channel. Every protocol step is self-healing:
//! duplicate requests replace each other, status reports overwrite, and
//! every assignment carries an expiry so a lost message degrades to "the
//! request becomes eligible again" instead of a stuck bay.
//!
//! # Components
//!
//! - **Hardware**: capability traits for connectors and orientation sensors,
//!   plus the discovery interface that supplies them at startup
//! - **Bays**: occupancy derived from connector telemetry, soft reservations
//!   with a timeout, approach/departure waypoint paths
//! - **Requests**: `Pending -> Assigned -> {Retired | Expired}` queue with
//!   last-request-wins per agent
//! - **Registry**: last-known status per ship with staleness eviction
//! - **Assignment**: greedy nearest-pair selection, one commit per cycle
//! - **Coordinator**: the control cycle tying the above together and pushing
//!   one snapshot per cycle
//!
//! # Example Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use baymaster_base::{BaseCoordinator, StaticInventory};
//! use baymaster_core::{Config, ManualClock, MemorySnapshotStore, Vec3};
//! use baymaster_protocol::{Mailbox, Message, ShipStatus};
//!
//! let mut inventory = StaticInventory::new();
//! inventory.add_bay("Bay 1", Vec3::ZERO, Vec3::UNIT_Z, Vec3::UNIT_Y);
//!
//! let mut base = BaseCoordinator::new(
//!     &Config::default_config(),
//!     Arc::new(ManualClock::new(0)),
//!     Mailbox::new(),
//!     &inventory,
//!     Box::new(MemorySnapshotStore::new()),
//! );
//!
//! let position = Vec3::new(100.0, 0.0, 0.0);
//! base.transport_mut().push_inbound(
//!     Message::RequestDock { from: "Miner-7".to_string(), position }.encode(),
//! );
//! base.transport_mut().push_inbound(
//!     Message::ResponseStatus {
//!         from: "Miner-7".to_string(),
//!         status: ShipStatus::WaitingForBay,
//!         position,
//!         message: String::new(),
//!     }
//!     .encode(),
//! );
//!
//! let report = base.tick();
//! assert_eq!(report.assignment.unwrap().bay, "Bay 1");
//! ```

pub mod assignment;
pub mod bay;
pub mod coordinator;
pub mod error;
pub mod hardware;
pub mod registry;
pub mod request;
pub mod snapshot;

pub use assignment::{candidate_pairs, select_assignment, Assignment, AssignmentStrategy, BayCandidate, ShipExchangePair};
pub use bay::{ApproachPath, BayState, ExchangeBay, OccupancyUpdate, ReservationOutcome, UNKNOWN_OCCUPANT};
pub use coordinator::{BaseCoordinator, BaseStatus, CycleReport};
pub use error::{BaseError, BaseResult, BayError};
pub use hardware::{
    BayInventory, BayParts, Connector, ConnectorStatus, OrientationSensor, StaticConnector, StaticInventory,
    StaticSensor,
};
pub use registry::{Ship, ShipRegistry};
pub use request::{DockRequest, RequestQueue, RequestState, SubmitOutcome};
pub use snapshot::{BaseSnapshot, BASE_SNAPSHOT_VERSION};
