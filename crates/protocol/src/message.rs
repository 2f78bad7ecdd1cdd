//! Typed protocol messages.
//!
//! Inbound (agent to base): `REQUEST_DOCK`, `RESPONSE_STATUS`, `REQUEST_UNDOCK`.
//! Outbound (base to agent): `DOCK`, `UNDOCK`, `REQUEST_STATUS`.

use crate::error::{WireError, WireResult};
use crate::wire::{encode_vector, encode_waypoints, Fields};
use baymaster_core::Vec3;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Last status an agent reported about itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ShipStatus {
    /// Nothing requested
    Idle,
    /// Dock request outstanding, no bay yet
    WaitingForBay,
    /// Following an approach path
    Docking,
    /// Mechanically connected to a bay
    Docked,
    /// Following a departure path
    Undocking,
    /// Code outside the known range
    Unknown(i64),
}

impl ShipStatus {
    /// Wire integer of this status.
    pub fn code(self) -> i64 {
        match self {
            ShipStatus::Idle => 0,
            ShipStatus::WaitingForBay => 1,
            ShipStatus::Docking => 2,
            ShipStatus::Docked => 3,
            ShipStatus::Undocking => 4,
            ShipStatus::Unknown(code) => code,
        }
    }

    /// Status for a wire integer.
    pub fn from_code(code: i64) -> Self {
        match code {
            0 => ShipStatus::Idle,
            1 => ShipStatus::WaitingForBay,
            2 => ShipStatus::Docking,
            3 => ShipStatus::Docked,
            4 => ShipStatus::Undocking,
            other => ShipStatus::Unknown(other),
        }
    }
}

impl fmt::Display for ShipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShipStatus::Idle => write!(f, "idle"),
            ShipStatus::WaitingForBay => write!(f, "waiting for bay"),
            ShipStatus::Docking => write!(f, "docking"),
            ShipStatus::Docked => write!(f, "docked"),
            ShipStatus::Undocking => write!(f, "undocking"),
            ShipStatus::Unknown(code) => write!(f, "unknown ({})", code),
        }
    }
}

/// Path and orientation a base sends to one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct DockInstructions {
    /// Addressed agent
    pub to: String,
    /// Sending base
    pub from: String,
    /// Bay name
    pub exchange: String,
    /// Target forward direction
    pub forward: Vec3,
    /// Target up direction
    pub up: Vec3,
    /// Ordered path, first point farthest from the connector on approach
    pub waypoints: Vec<Vec3>,
}

impl DockInstructions {
    fn to_fields(&self, command: &str) -> Fields {
        Fields::new()
            .with("Command", command)
            .with("To", self.to.as_str())
            .with("From", self.from.as_str())
            .with("Exchange", self.exchange.as_str())
            .with("Forward", encode_vector(self.forward))
            .with("Up", encode_vector(self.up))
            .with("Waypoints", encode_waypoints(&self.waypoints))
    }

    fn from_fields(fields: &Fields) -> WireResult<Self> {
        Ok(Self {
            to: fields.get("To").to_string(),
            from: fields.get("From").to_string(),
            exchange: fields.get("Exchange").to_string(),
            forward: fields.vector("Forward")?,
            up: fields.vector("Up")?,
            waypoints: fields.waypoints("Waypoints")?,
        })
    }
}

/// Every message exchanged between base and agents.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// Agent asks for a bay
    RequestDock {
        /// Requesting agent
        from: String,
        /// Agent position at request time
        position: Vec3,
    },
    /// Agent status report
    ResponseStatus {
        /// Reporting agent
        from: String,
        /// Reported status
        status: ShipStatus,
        /// Reported position
        position: Vec3,
        /// Free-text detail
        message: String,
    },
    /// Agent asks for a departure path from its current bay
    RequestUndock {
        /// Requesting agent
        from: String,
    },
    /// Base assigns a bay and its approach path
    Dock(DockInstructions),
    /// Base hands out the departure path of the bay an agent occupies
    Undock(DockInstructions),
    /// Base polls all agents for status
    RequestStatus {
        /// Polling base
        from: String,
    },
}

impl Message {
    /// Wire name of the command.
    pub fn command(&self) -> &'static str {
        match self {
            Message::RequestDock { .. } => "REQUEST_DOCK",
            Message::ResponseStatus { .. } => "RESPONSE_STATUS",
            Message::RequestUndock { .. } => "REQUEST_UNDOCK",
            Message::Dock(_) => "DOCK",
            Message::Undock(_) => "UNDOCK",
            Message::RequestStatus { .. } => "REQUEST_STATUS",
        }
    }

    /// Encode to a broadcast frame.
    pub fn encode(&self) -> String {
        let command = self.command();
        let fields = match self {
            Message::RequestDock { from, position } => Fields::new()
                .with("Command", command)
                .with("From", from.as_str())
                .with("Position", encode_vector(*position)),
            Message::ResponseStatus {
                from,
                status,
                position,
                message,
            } => Fields::new()
                .with("Command", command)
                .with("From", from.as_str())
                .with("Status", status.code().to_string())
                .with("Position", encode_vector(*position))
                .with("StatusMessage", message.as_str()),
            Message::RequestUndock { from } | Message::RequestStatus { from } => Fields::new()
                .with("Command", command)
                .with("From", from.as_str()),
            Message::Dock(instructions) | Message::Undock(instructions) => {
                instructions.to_fields(command)
            }
        };
        fields.encode()
    }

    /// Decode a broadcast frame.
    pub fn decode(frame: &str) -> WireResult<Self> {
        let fields = Fields::parse(frame);
        if !fields.contains("Command") {
            return Err(WireError::MissingCommand);
        }
        let from = fields.get("From").to_string();
        match fields.get("Command") {
            "REQUEST_DOCK" => Ok(Message::RequestDock {
                from,
                position: fields.vector("Position")?,
            }),
            "RESPONSE_STATUS" => Ok(Message::ResponseStatus {
                from,
                status: ShipStatus::from_code(fields.integer("Status")?),
                position: fields.vector("Position")?,
                message: fields.get("StatusMessage").to_string(),
            }),
            "REQUEST_UNDOCK" => Ok(Message::RequestUndock { from }),
            "DOCK" => Ok(Message::Dock(DockInstructions::from_fields(&fields)?)),
            "UNDOCK" => Ok(Message::Undock(DockInstructions::from_fields(&fields)?)),
            "REQUEST_STATUS" => Ok(Message::RequestStatus { from }),
            other => Err(WireError::UnknownCommand(other.to_string())),
        }
    }

    /// Agent the message is addressed to, for directed commands.
    pub fn recipient(&self) -> Option<&str> {
        match self {
            Message::Dock(instructions) | Message::Undock(instructions) => {
                Some(instructions.to.as_str())
            }
            _ => None,
        }
    }
}
