//! Baymaster Protocol - broadcast messaging boundary between base and ships
//!
//! Base and agents share no memory. Every interaction is a fire-and-forget
//! broadcast frame of pipe-delimited `key=value` fields with no delivery or
//! ordering guarantee.
//!
//! # Components
//!
//! - **Wire codec**: field framing plus the `x:y:z` vector and `;` waypoint
//!   list encodings
//! - **Messages**: typed inbound (agent to base) and outbound (base to agent)
//!   messages
//! - **Transports**: the [`Transport`] trait, a [`Mailbox`] for externally
//!   pumped sockets and an in-memory [`MemoryBus`] with optional loss and
//!   duplication for testing
//!
//! # Example Usage
//!
//! ```rust
//! use baymaster_core::Vec3;
//! use baymaster_protocol::{Message, MemoryBus, TransportExt};
//!
//! let bus = MemoryBus::new();
//! let mut ship = bus.endpoint();
//! let mut base = bus.endpoint();
//!
//! ship.send(&Message::RequestDock {
//!     from: "Miner-7".to_string(),
//!     position: Vec3::new(10.0, 0.0, 5.0),
//! });
//!
//! let inbound = base.receive_messages();
//! assert_eq!(inbound.len(), 1);
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod message;
pub mod transport;
pub mod wire;

pub use error::{WireError, WireResult};
pub use message::{DockInstructions, Message, ShipStatus};
pub use transport::{BusEndpoint, LossProfile, Mailbox, MemoryBus, Transport, TransportExt};
pub use wire::{decode_vector, decode_waypoints, encode_vector, encode_waypoints, Fields};
