//! Capability handles and bay discovery.
//!
//! The coordinator never scans or string-matches physical resources itself.
//! An injected [`BayInventory`] hands over typed handles once at startup; the
//! handles then supply live telemetry every cycle.

use baymaster_core::{BayLayout, Vec3};
use std::sync::{Arc, Mutex};

/// Mechanical state of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorStatus {
    /// Nothing in range
    Unconnected,
    /// A ship connector is in range but not locked
    Connectable,
    /// Locked to a ship
    Connected,
}

/// A docking connector (main or secondary) of a bay.
pub trait Connector: Send + Sync {
    /// Current mechanical state.
    fn status(&self) -> ConnectorStatus;

    /// Name of the ship on the other side, when connected and known.
    fn other_ship(&self) -> Option<String>;

    /// World-space position of the connector face.
    fn position(&self) -> Vec3;

    /// Outward direction of the connector face.
    fn forward(&self) -> Vec3;
}

/// Supplies the forward/up frame of a bay.
pub trait OrientationSensor: Send + Sync {
    /// Forward unit vector.
    fn forward(&self) -> Vec3;

    /// Up unit vector.
    fn up(&self) -> Vec3;
}

/// Handles discovered for one bay. Missing parts make the bay invalid.
#[derive(Clone, Default)]
pub struct BayParts {
    /// Bay name
    pub name: String,
    /// Connector ships dock against
    pub main: Option<Arc<dyn Connector>>,
    /// Additional connectors that only contribute occupancy
    pub secondary: Vec<Arc<dyn Connector>>,
    /// Frame source for the target orientation
    pub sensor: Option<Arc<dyn OrientationSensor>>,
}

impl std::fmt::Debug for BayParts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BayParts")
            .field("name", &self.name)
            .field("main", &self.main.is_some())
            .field("secondary", &self.secondary.len())
            .field("sensor", &self.sensor.is_some())
            .finish()
    }
}

/// Discovery interface, queried once at startup.
pub trait BayInventory {
    /// Every bay the installation claims to have, valid or not.
    fn discover(&self) -> Vec<BayParts>;
}

/// Connector whose telemetry is set programmatically: a fixed placement
/// whose occupancy is driven by the host (simulation or an external feed).
#[derive(Debug)]
pub struct StaticConnector {
    position: Vec3,
    forward: Vec3,
    state: Mutex<(ConnectorStatus, Option<String>)>,
}

impl StaticConnector {
    pub fn new(position: Vec3, forward: Vec3) -> Self {
        Self {
            position,
            forward,
            state: Mutex::new((ConnectorStatus::Unconnected, None)),
        }
    }

    /// Lock a ship onto this connector.
    pub fn attach(&self, ship: &str) {
        *self.lock() = (ConnectorStatus::Connected, Some(ship.to_string()));
    }

    /// Mark a ship as in range without locking.
    pub fn set_connectable(&self) {
        *self.lock() = (ConnectorStatus::Connectable, None);
    }

    /// Release whatever is attached.
    pub fn detach(&self) {
        *self.lock() = (ConnectorStatus::Unconnected, None);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, (ConnectorStatus, Option<String>)> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl Connector for StaticConnector {
    fn status(&self) -> ConnectorStatus {
        self.lock().0
    }

    fn other_ship(&self) -> Option<String> {
        let state = self.lock();
        match state.0 {
            ConnectorStatus::Connected => state.1.clone(),
            _ => None,
        }
    }

    fn position(&self) -> Vec3 {
        self.position
    }

    fn forward(&self) -> Vec3 {
        self.forward
    }
}

/// Orientation sensor with a fixed frame.
#[derive(Debug, Clone, Copy)]
pub struct StaticSensor {
    pub forward: Vec3,
    pub up: Vec3,
}

impl OrientationSensor for StaticSensor {
    fn forward(&self) -> Vec3 {
        self.forward
    }

    fn up(&self) -> Vec3 {
        self.up
    }
}

/// Inventory built from configured bay layouts.
///
/// Keeps the concrete connector handles so the host can drive their
/// occupancy.
#[derive(Debug, Default)]
pub struct StaticInventory {
    bays: Vec<StaticBay>,
}

#[derive(Debug)]
struct StaticBay {
    name: String,
    main: Option<Arc<StaticConnector>>,
    secondary: Vec<Arc<StaticConnector>>,
    sensor: Option<StaticSensor>,
}

impl StaticInventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from configuration layouts.
    pub fn from_layouts(layouts: &[BayLayout]) -> Self {
        let bays = layouts
            .iter()
            .map(|layout| StaticBay {
                name: layout.name.clone(),
                main: layout
                    .main
                    .as_ref()
                    .map(|c| Arc::new(StaticConnector::new(c.position, c.forward))),
                secondary: layout
                    .secondary
                    .iter()
                    .map(|c| Arc::new(StaticConnector::new(c.position, c.forward)))
                    .collect(),
                sensor: layout.sensor.as_ref().map(|s| StaticSensor {
                    forward: s.forward,
                    up: s.up,
                }),
            })
            .collect();
        Self { bays }
    }

    /// Add a complete bay whose main connector sits at `position` facing
    /// `forward`; the sensor frame faces into the connector.
    pub fn add_bay(&mut self, name: &str, position: Vec3, forward: Vec3, up: Vec3) -> Arc<StaticConnector> {
        let main = Arc::new(StaticConnector::new(position, forward));
        self.bays.push(StaticBay {
            name: name.to_string(),
            main: Some(main.clone()),
            secondary: Vec::new(),
            sensor: Some(StaticSensor { forward: -forward, up }),
        });
        main
    }

    /// Attach a secondary connector to an existing bay.
    pub fn add_secondary(&mut self, bay: &str, position: Vec3, forward: Vec3) -> Option<Arc<StaticConnector>> {
        let entry = self.bays.iter_mut().find(|b| b.name == bay)?;
        let connector = Arc::new(StaticConnector::new(position, forward));
        entry.secondary.push(connector.clone());
        Some(connector)
    }

    /// Register a bay lacking its sensor (fails validation on discovery).
    pub fn add_incomplete_bay(&mut self, name: &str, position: Vec3, forward: Vec3) {
        self.bays.push(StaticBay {
            name: name.to_string(),
            main: Some(Arc::new(StaticConnector::new(position, forward))),
            secondary: Vec::new(),
            sensor: None,
        });
    }

    /// Main connector handle of a bay.
    pub fn main_connector(&self, bay: &str) -> Option<Arc<StaticConnector>> {
        self.bays
            .iter()
            .find(|b| b.name == bay)
            .and_then(|b| b.main.clone())
    }
}

impl BayInventory for StaticInventory {
    fn discover(&self) -> Vec<BayParts> {
        self.bays
            .iter()
            .map(|bay| BayParts {
                name: bay.name.clone(),
                main: bay.main.clone().map(|c| c as Arc<dyn Connector>),
                secondary: bay
                    .secondary
                    .iter()
                    .map(|c| c.clone() as Arc<dyn Connector>)
                    .collect(),
                sensor: bay
                    .sensor
                    .map(|s| Arc::new(s) as Arc<dyn OrientationSensor>),
            })
            .collect()
    }
}
