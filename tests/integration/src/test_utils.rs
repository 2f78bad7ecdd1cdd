//! Shared fixtures: a simulated world with one base and several ships

use baymaster_approach::{AgentReport, ShipAgent, ShipConnector, ShipMotion, SimulatedShip};
use baymaster_base::{BaseCoordinator, BaseResult, CycleReport, StaticConnector, StaticInventory};
use baymaster_core::{Config, ManualClock, MemorySnapshotStore, SnapshotStore, Vec3};
use baymaster_protocol::{BusEndpoint, MemoryBus, ShipStatus};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Simulation step in milliseconds; also the tick period of every loop.
pub const STEP_MS: u64 = 100;

/// Ship mass used by every fixture (kg).
pub const SHIP_MASS: f64 = 1_000.0;

/// Per-thruster force used by every fixture (N).
pub const SHIP_THRUST: f64 = 5_000.0;

/// Connectors lock when the ship is this close (m).
pub const CONNECT_RANGE: f64 = 3.0;

/// Install a test subscriber once; later calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Base configuration used by the scenarios: four segments from a 40 m
/// standoff.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.base.name = "Outpost".to_string();
    config.geometry.waypoint_count = 4;
    config.geometry.standoff_distance = 40.0;
    config.geometry.terminal_offset = 1.5;
    config
}

/// Ship-side connector that locks onto whichever bay connector it is
/// touching, mirroring the lock into the bay's telemetry.
pub struct DockingPort {
    ship_name: String,
    ship: SimulatedShip,
    bay_connectors: Vec<Arc<StaticConnector>>,
    attached: Mutex<Option<Arc<StaticConnector>>>,
}

impl DockingPort {
    pub fn new(ship_name: &str, ship: SimulatedShip, bay_connectors: Vec<Arc<StaticConnector>>) -> Self {
        Self {
            ship_name: ship_name.to_string(),
            ship,
            bay_connectors,
            attached: Mutex::new(None),
        }
    }

    fn attached(&self) -> std::sync::MutexGuard<'_, Option<Arc<StaticConnector>>> {
        self.attached.lock().unwrap_or_else(|p| p.into_inner())
    }
}

impl ShipConnector for DockingPort {
    fn is_connected(&self) -> bool {
        self.attached().is_some()
    }

    fn connect(&self) {
        use baymaster_base::{Connector, ConnectorStatus};

        let mut attached = self.attached();
        if attached.is_some() {
            return;
        }
        let position = self.ship.position();
        let target = self
            .bay_connectors
            .iter()
            .filter(|c| c.status() != ConnectorStatus::Connected)
            .find(|c| c.position().distance(position) <= CONNECT_RANGE);
        if let Some(connector) = target {
            connector.attach(&self.ship_name);
            self.ship.set_velocity(Vec3::ZERO);
            debug!(ship = %self.ship_name, "Connector locked");
            *attached = Some(connector.clone());
        }
    }

    fn disconnect(&self) {
        if let Some(connector) = self.attached().take() {
            connector.detach();
            debug!(ship = %self.ship_name, "Connector released");
        }
    }
}

/// Everything that happened during one [`World::step`].
#[derive(Debug, Clone)]
pub struct StepReport {
    pub base: CycleReport,
    /// Reports of the powered ships, by ship index
    pub agents: Vec<(usize, AgentReport)>,
}

/// One simulated ship and its agent.
pub struct ShipRig {
    pub sim: SimulatedShip,
    pub agent: ShipAgent<BusEndpoint>,
    /// Unpowered ships neither tick nor move.
    pub powered: bool,
}

/// A base, its bays and a fleet of ships on one broadcast bus.
pub struct World {
    pub config: Config,
    pub clock: ManualClock,
    pub bus: MemoryBus,
    pub inventory: StaticInventory,
    pub connectors: Vec<Arc<StaticConnector>>,
    pub base: BaseCoordinator<BusEndpoint>,
    pub ships: Vec<ShipRig>,
}

impl World {
    /// Lossless world with bays facing +Z at the given positions.
    pub fn new(config: Config, bays: &[(&str, Vec3)]) -> Self {
        Self::with_bus(config, bays, MemoryBus::new(), Box::new(MemorySnapshotStore::new()))
    }

    /// World on a caller-supplied bus and base snapshot store.
    pub fn with_bus(config: Config, bays: &[(&str, Vec3)], bus: MemoryBus, store: Box<dyn SnapshotStore>) -> Self {
        init_test_logging();
        let clock = ManualClock::new(1_000);
        let mut inventory = StaticInventory::new();
        let connectors = bays
            .iter()
            .map(|(name, position)| inventory.add_bay(name, *position, Vec3::UNIT_Z, Vec3::UNIT_Y))
            .collect();
        let base = BaseCoordinator::new(&config, Arc::new(clock.clone()), bus.endpoint(), &inventory, store);
        Self {
            config,
            clock,
            bus,
            inventory,
            connectors,
            base,
            ships: Vec::new(),
        }
    }

    /// Add a powered ship at rest. Returns its index.
    pub fn add_ship(&mut self, name: &str, position: Vec3, forward: Vec3, up: Vec3) -> usize {
        let sim = SimulatedShip::new(position, forward, up, SHIP_MASS, SHIP_THRUST);
        let port = Arc::new(DockingPort::new(name, sim.clone(), self.connectors.clone()));
        let agent = ShipAgent::new(
            name,
            self.config.approach.clone(),
            Arc::new(self.clock.clone()),
            self.bus.endpoint(),
            sim.handles_with(port),
            Box::new(MemorySnapshotStore::new()),
        );
        self.ships.push(ShipRig {
            sim,
            agent,
            powered: true,
        });
        self.ships.len() - 1
    }

    /// Ship `index` asks for a bay.
    pub fn request_dock(&mut self, index: usize) {
        self.ships[index].agent.request_dock();
    }

    /// Ship `index` asks to leave its bay.
    pub fn request_undock(&mut self, index: usize) {
        self.ships[index].agent.request_undock();
    }

    /// Replace the base with a fresh coordinator on a new bus endpoint,
    /// as after a process restart. Returns whether a snapshot was restored.
    pub fn restart_base(&mut self, store: Box<dyn SnapshotStore>) -> BaseResult<bool> {
        self.base = BaseCoordinator::new(
            &self.config,
            Arc::new(self.clock.clone()),
            self.bus.endpoint(),
            &self.inventory,
            store,
        );
        self.base.restore()
    }

    /// Advance time by one step: base cycle, agent ticks, physics.
    pub fn step(&mut self) -> StepReport {
        self.clock.advance(STEP_MS);
        let base = self.base.tick();

        let mut agents = Vec::new();
        for (index, rig) in self.ships.iter_mut().enumerate().filter(|(_, r)| r.powered) {
            agents.push((index, rig.agent.tick()));
            rig.sim.step(STEP_MS as f64 / 1_000.0);
        }
        StepReport { base, agents }
    }

    /// Step until `done` holds or `max_steps` pass. Returns the steps taken
    /// when `done` held.
    pub fn run_until(&mut self, max_steps: usize, mut done: impl FnMut(&World) -> bool) -> Option<usize> {
        for taken in 0..max_steps {
            if done(self) {
                return Some(taken);
            }
            self.step();
        }
        done(self).then_some(max_steps)
    }

    pub fn now_ms(&self) -> u64 {
        use baymaster_core::Clock;
        self.clock.now_ms()
    }

    pub fn status(&self, index: usize) -> ShipStatus {
        self.ships[index].agent.status()
    }

    /// True when every ship reports `status`.
    pub fn all(&self, status: ShipStatus) -> bool {
        self.ships.iter().all(|r| r.agent.status() == status)
    }

    /// Ships each bay is currently promised to: reserved, occupied or
    /// approaching per the agents themselves.
    pub fn claims(&self) -> Vec<(String, Vec<String>)> {
        self.base
            .bays()
            .iter()
            .map(|bay| {
                let mut claimants: Vec<String> = Vec::new();
                for name in bay.reserved_for().into_iter().chain(bay.occupant()) {
                    if !claimants.iter().any(|c| c == name) {
                        claimants.push(name.to_string());
                    }
                }
                for rig in &self.ships {
                    let active = matches!(rig.agent.status(), ShipStatus::Docking | ShipStatus::Docked);
                    if active && rig.agent.bay() == Some(bay.name()) {
                        let name = rig.agent.name().to_string();
                        if !claimants.contains(&name) {
                            claimants.push(name);
                        }
                    }
                }
                (bay.name().to_string(), claimants)
            })
            .collect()
    }
}
