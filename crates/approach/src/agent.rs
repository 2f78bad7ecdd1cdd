//! Ship agent: the agent-side control loop around an [`ApproachController`].
//!
//! Each tick drains the transport, reacts to commands addressed to this ship,
//! resends an unanswered dock request once `request_retry_ms` has passed,
//! runs one controller tick and pushes a snapshot. Motion is never blocking;
//! stop and reset take effect synchronously.

use crate::controller::{ApproachController, ApproachMode, ApproachPlan, TickOutcome};
use crate::error::ApproachResult;
use crate::hardware::ShipHandles;
use crate::snapshot::ApproachSnapshot;
use baymaster_core::{ApproachConfig, Clock, SnapshotStore};
use baymaster_protocol::{DockInstructions, Message, ShipStatus, Transport, TransportExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Summary of one agent tick.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentReport {
    /// Messages decoded this tick
    pub received: usize,
    /// Controller result
    pub outcome: TickOutcome,
    /// Status after the tick
    pub status: ShipStatus,
}

/// One ship: status, approach controller and the channel to the base.
pub struct ShipAgent<T: Transport> {
    name: String,
    clock: Arc<dyn Clock>,
    transport: T,
    controller: ApproachController,
    status: ShipStatus,
    bay: Option<String>,
    store: Box<dyn SnapshotStore>,
    last_tick_ms: u64,
    request_retry_ms: u64,
    /// When the pending dock request was last sent
    last_request_ms: Option<u64>,
}

impl<T: Transport> ShipAgent<T> {
    pub fn new(
        name: &str,
        config: ApproachConfig,
        clock: Arc<dyn Clock>,
        transport: T,
        handles: ShipHandles,
        store: Box<dyn SnapshotStore>,
    ) -> Self {
        Self {
            name: name.to_string(),
            clock,
            transport,
            request_retry_ms: config.request_retry_ms,
            controller: ApproachController::new(config, handles),
            status: ShipStatus::Idle,
            bay: None,
            store,
            last_tick_ms: 0,
            last_request_ms: None,
        }
    }

    /// Ask any base in range for a bay.
    pub fn request_dock(&mut self) {
        self.status = ShipStatus::WaitingForBay;
        info!(ship = %self.name, "Requesting bay");
        self.send_dock_request();
    }

    /// REQUEST_DOCK followed by a status report, so the base sees the ship
    /// waiting without polling first.
    fn send_dock_request(&mut self) {
        let position = self.controller.handles().motion.position();
        self.transport.send(&Message::RequestDock {
            from: self.name.clone(),
            position,
        });
        self.report_status();
        self.last_request_ms = Some(self.clock.now_ms());
    }

    fn retry_dock_request(&mut self, now_ms: u64) {
        if self.status != ShipStatus::WaitingForBay {
            return;
        }
        let Some(last) = self.last_request_ms else {
            return;
        };
        if now_ms.saturating_sub(last) >= self.request_retry_ms {
            debug!(ship = %self.name, waited_ms = now_ms - last, "Dock request unanswered, resending");
            self.send_dock_request();
        }
    }

    /// Ask the base for a departure path from the current bay.
    pub fn request_undock(&mut self) {
        info!(ship = %self.name, "Requesting undock");
        self.transport.send(&Message::RequestUndock {
            from: self.name.clone(),
        });
    }

    /// Abort motion now; status is left as is.
    pub fn stop(&mut self) {
        self.controller.abort();
    }

    /// Abort motion and return to `Idle`.
    pub fn reset(&mut self) {
        self.controller.reset();
        self.status = ShipStatus::Idle;
        self.bay = None;
        self.last_request_ms = None;
    }

    /// Resume from the last stored snapshot. Returns whether a path was in
    /// progress.
    ///
    /// A stored bay without a path means the ship was docked; it is kept only
    /// while the connector is still locked.
    pub fn restore(&mut self) -> ApproachResult<bool> {
        let Some(flat) = self.store.load()? else {
            return Ok(false);
        };
        let snapshot = ApproachSnapshot::from_flat(&flat)?;
        let connected = self.controller.handles().connector.is_connected();
        self.status = match snapshot.progress.as_ref().map(|p| p.plan.mode) {
            Some(ApproachMode::Docking) => ShipStatus::Docking,
            Some(ApproachMode::Departing) => ShipStatus::Undocking,
            None if snapshot.bay.is_some() && connected => ShipStatus::Docked,
            None => self.status,
        };
        self.bay = match self.status {
            ShipStatus::Docking | ShipStatus::Docked | ShipStatus::Undocking => snapshot.bay,
            _ => None,
        };
        let active = snapshot.progress.is_some();
        info!(ship = %self.name, status = %self.status, bay = ?self.bay, "Approach state restored");
        self.controller.restore(snapshot.progress, snapshot.ticks);
        Ok(active)
    }

    /// Run one agent tick.
    pub fn tick(&mut self) -> AgentReport {
        let now_ms = self.clock.now_ms();
        self.last_tick_ms = now_ms;
        let messages = self.transport.receive_messages();
        let received = messages.len();
        for message in messages {
            self.handle(message);
        }
        self.retry_dock_request(now_ms);

        let outcome = self.controller.tick();
        if let TickOutcome::Arrived { mode } = outcome {
            self.status = match mode {
                ApproachMode::Docking => {
                    info!(ship = %self.name, bay = ?self.bay, "Docked");
                    ShipStatus::Docked
                }
                ApproachMode::Departing => {
                    info!(ship = %self.name, "Clear of bay");
                    self.bay = None;
                    ShipStatus::Idle
                }
            };
        }

        self.persist();
        AgentReport {
            received,
            outcome,
            status: self.status,
        }
    }

    fn handle(&mut self, message: Message) {
        match message {
            Message::Dock(instructions) if instructions.to == self.name => self.on_dock(instructions),
            Message::Undock(instructions) if instructions.to == self.name => self.on_undock(instructions),
            Message::RequestStatus { .. } => self.report_status(),
            Message::Dock(_) | Message::Undock(_) => {}
            other => debug!(ship = %self.name, command = other.command(), "Ignoring message"),
        }
    }

    fn on_dock(&mut self, instructions: DockInstructions) {
        match self.status {
            ShipStatus::WaitingForBay | ShipStatus::Docking => {}
            ShipStatus::Docked if self.controller.handles().connector.is_connected() => {
                debug!(ship = %self.name, "Already docked, duplicate dock command ignored");
                return;
            }
            status => {
                debug!(ship = %self.name, status = %status, "Dock command not expected, ignored");
                return;
            }
        }

        let plan = ApproachPlan {
            waypoints: instructions.waypoints,
            forward: instructions.forward,
            up: instructions.up,
            mode: ApproachMode::Docking,
        };
        match self.controller.start(plan) {
            Ok(_) => {
                info!(ship = %self.name, bay = %instructions.exchange, base = %instructions.from, "Docking");
                self.status = ShipStatus::Docking;
                self.bay = Some(instructions.exchange);
            }
            Err(e) => warn!(ship = %self.name, error = %e, "Unusable dock command"),
        }
    }

    fn on_undock(&mut self, instructions: DockInstructions) {
        if !matches!(self.status, ShipStatus::Docked | ShipStatus::Undocking) {
            debug!(ship = %self.name, status = %self.status, "Undock command not expected, ignored");
            return;
        }

        let plan = ApproachPlan {
            waypoints: instructions.waypoints,
            forward: instructions.forward,
            up: instructions.up,
            mode: ApproachMode::Departing,
        };
        match self.controller.start(plan) {
            Ok(_) => {
                self.controller.handles().connector.disconnect();
                info!(ship = %self.name, bay = %instructions.exchange, "Undocking");
                self.status = ShipStatus::Undocking;
            }
            Err(e) => warn!(ship = %self.name, error = %e, "Unusable undock command"),
        }
    }

    fn report_status(&mut self) {
        let message = self.status_message();
        self.transport.send(&Message::ResponseStatus {
            from: self.name.clone(),
            status: self.status,
            position: self.controller.handles().motion.position(),
            message,
        });
    }

    /// Short human-readable status detail.
    pub fn status_message(&self) -> String {
        match (self.controller.progress(), &self.bay) {
            (Some(progress), Some(bay)) => format!(
                "{} {} waypoint {}/{}",
                self.status,
                bay,
                progress.index + 1,
                progress.plan.waypoints.len()
            ),
            (None, Some(bay)) => format!("{} {}", self.status, bay),
            _ => self.status.to_string(),
        }
    }

    fn persist(&mut self) {
        let snapshot = ApproachSnapshot {
            progress: self.controller.progress().cloned(),
            bay: self.bay.clone(),
            ticks: self.controller.ticks(),
        };
        if let Err(e) = self.store.save(&snapshot.to_flat()) {
            warn!(ship = %self.name, error = %e, "Snapshot push failed");
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn status(&self) -> ShipStatus {
        self.status
    }

    /// Bay being approached, occupied or left.
    pub fn bay(&self) -> Option<&str> {
        self.bay.as_deref()
    }

    pub fn controller(&self) -> &ApproachController {
        &self.controller
    }

    /// Clock time of the last tick.
    pub fn last_tick_ms(&self) -> u64 {
        self.last_tick_ms
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hardware::{ShipConnector, ShipMotion};
    use crate::sim::SimulatedShip;
    use baymaster_core::{ManualClock, MemorySnapshotStore, Vec3};
    use baymaster_protocol::Mailbox;

    fn agent(ship: &SimulatedShip, store: MemorySnapshotStore) -> ShipAgent<Mailbox> {
        agent_on(ship, store, ManualClock::new(0))
    }

    fn agent_on(ship: &SimulatedShip, store: MemorySnapshotStore, clock: ManualClock) -> ShipAgent<Mailbox> {
        ShipAgent::new(
            "Miner-7",
            ApproachConfig {
                request_retry_ms: 5_000,
                ..ApproachConfig::default()
            },
            Arc::new(clock),
            Mailbox::new(),
            ship.handles(),
            Box::new(store),
        )
    }

    fn dock_requests(sent: &[Message]) -> usize {
        sent.iter().filter(|m| matches!(m, Message::RequestDock { .. })).count()
    }

    fn dock_for(to: &str) -> Message {
        Message::Dock(DockInstructions {
            to: to.to_string(),
            from: "Outpost".to_string(),
            exchange: "Bay 1".to_string(),
            forward: Vec3::UNIT_Z,
            up: Vec3::UNIT_Y,
            waypoints: vec![Vec3::new(0.0, 0.0, 20.0), Vec3::new(0.0, 0.0, 10.0)],
        })
    }

    fn outbound(agent: &mut ShipAgent<Mailbox>) -> Vec<Message> {
        agent
            .transport_mut()
            .take_outbound()
            .iter()
            .filter_map(|f| Message::decode(f).ok())
            .collect()
    }

    fn ship() -> SimulatedShip {
        SimulatedShip::new(Vec3::ZERO, Vec3::UNIT_Z, Vec3::UNIT_Y, 1_000.0, 5_000.0)
    }

    #[test]
    fn test_request_dock_announces_waiting() {
        let ship = ship();
        let mut agent = agent(&ship, MemorySnapshotStore::new());
        agent.request_dock();
        assert_eq!(agent.status(), ShipStatus::WaitingForBay);

        let sent = outbound(&mut agent);
        assert!(matches!(&sent[0], Message::RequestDock { from, .. } if from == "Miner-7"));
        assert!(matches!(
            &sent[1],
            Message::ResponseStatus {
                status: ShipStatus::WaitingForBay,
                ..
            }
        ));
    }

    #[test]
    fn test_dock_for_other_ship_ignored() {
        let ship = ship();
        let mut agent = agent(&ship, MemorySnapshotStore::new());
        agent.request_dock();
        agent.transport_mut().push_inbound(dock_for("Someone-else").encode());
        agent.tick();
        assert_eq!(agent.status(), ShipStatus::WaitingForBay);
        assert!(!agent.controller().is_active());
    }

    #[test]
    fn test_dock_while_idle_ignored() {
        let ship = ship();
        let mut agent = agent(&ship, MemorySnapshotStore::new());
        agent.transport_mut().push_inbound(dock_for("Miner-7").encode());
        agent.tick();
        assert_eq!(agent.status(), ShipStatus::Idle);
    }

    #[test]
    fn test_full_docking_sequence() {
        let ship = ship();
        let mut agent = agent(&ship, MemorySnapshotStore::new());
        agent.request_dock();
        agent.transport_mut().push_inbound(dock_for("Miner-7").encode());
        agent.tick();
        assert_eq!(agent.status(), ShipStatus::Docking);
        assert_eq!(agent.bay(), Some("Bay 1"));

        ship.teleport(Vec3::new(0.0, 0.0, 20.0));
        agent.tick();
        ship.teleport(Vec3::new(0.0, 0.0, 10.0));
        agent.tick();
        let report = agent.tick();
        assert_eq!(
            report.outcome,
            TickOutcome::Arrived {
                mode: ApproachMode::Docking
            }
        );
        assert_eq!(report.status, ShipStatus::Docked);
        assert!(ship.connector().is_connected());

        // Duplicate dock command after docking changes nothing.
        agent.transport_mut().push_inbound(dock_for("Miner-7").encode());
        agent.tick();
        assert_eq!(agent.status(), ShipStatus::Docked);
    }

    #[test]
    fn test_undock_disconnects_and_departs() {
        let ship = ship();
        let mut agent = agent(&ship, MemorySnapshotStore::new());
        agent.request_dock();
        agent.transport_mut().push_inbound(dock_for("Miner-7").encode());
        agent.tick();
        ship.teleport(Vec3::new(0.0, 0.0, 20.0));
        agent.tick();
        ship.teleport(Vec3::new(0.0, 0.0, 10.0));
        agent.tick();
        agent.tick();
        assert_eq!(agent.status(), ShipStatus::Docked);

        agent.request_undock();
        let undock = Message::Undock(DockInstructions {
            to: "Miner-7".to_string(),
            from: "Outpost".to_string(),
            exchange: "Bay 1".to_string(),
            forward: Vec3::UNIT_Z,
            up: Vec3::UNIT_Y,
            waypoints: vec![Vec3::new(0.0, 0.0, 10.0), Vec3::new(0.0, 0.0, 20.0)],
        });
        agent.transport_mut().push_inbound(undock.encode());
        agent.tick();
        assert_eq!(agent.status(), ShipStatus::Undocking);
        assert!(!ship.connector().is_connected());

        ship.teleport(Vec3::new(0.0, 0.0, 20.0));
        agent.tick();
        let report = agent.tick();
        assert_eq!(report.status, ShipStatus::Idle);
        assert!(agent.bay().is_none());
    }

    #[test]
    fn test_status_poll_answered() {
        let ship = ship();
        let mut agent = agent(&ship, MemorySnapshotStore::new());
        agent.transport_mut().push_inbound(
            Message::RequestStatus {
                from: "Outpost".to_string(),
            }
            .encode(),
        );
        agent.tick();
        let sent = outbound(&mut agent);
        assert!(matches!(
            &sent[..],
            [Message::ResponseStatus { status: ShipStatus::Idle, message, .. }] if message == "idle"
        ));
    }

    #[test]
    fn test_stop_and_reset() {
        let ship = ship();
        let mut agent = agent(&ship, MemorySnapshotStore::new());
        agent.request_dock();
        agent.transport_mut().push_inbound(dock_for("Miner-7").encode());
        agent.tick();
        assert!(ship.total_thrust() > 0.0);

        agent.stop();
        assert_eq!(ship.total_thrust(), 0.0);
        assert_eq!(agent.status(), ShipStatus::Docking);

        agent.reset();
        assert_eq!(agent.status(), ShipStatus::Idle);
        assert!(!agent.controller().is_active());
    }

    #[test]
    fn test_restore_resumes_progress() {
        let ship = ship();
        let store = MemorySnapshotStore::new();
        let mut first = agent(&ship, store.clone());
        first.request_dock();
        first.transport_mut().push_inbound(dock_for("Miner-7").encode());
        first.tick();
        ship.teleport(Vec3::new(0.0, 0.0, 20.0));
        first.tick();
        let saved = first.controller().progress().cloned();

        let mut second = agent(&ship, store);
        assert!(second.restore().unwrap());
        assert_eq!(second.status(), ShipStatus::Docking);
        assert_eq!(second.controller().progress().cloned(), saved);
        assert_eq!(second.controller().progress().unwrap().index, 1);
    }

    #[test]
    fn test_unanswered_dock_request_is_resent() {
        let ship = ship();
        let clock = ManualClock::new(0);
        let mut agent = agent_on(&ship, MemorySnapshotStore::new(), clock.clone());
        agent.request_dock();
        outbound(&mut agent);

        // The DOCK reply is lost; nothing is resent before the interval.
        for _ in 0..4 {
            clock.advance(1_000);
            agent.tick();
        }
        assert_eq!(dock_requests(&outbound(&mut agent)), 0);

        clock.advance(1_000);
        agent.tick();
        let sent = outbound(&mut agent);
        assert_eq!(dock_requests(&sent), 1);
        assert!(sent.iter().any(|m| matches!(
            m,
            Message::ResponseStatus {
                status: ShipStatus::WaitingForBay,
                ..
            }
        )));

        // Keeps retrying for as long as no bay is assigned.
        let mut resent = 0;
        for _ in 0..600 {
            clock.advance(1_000);
            agent.tick();
            resent += dock_requests(&outbound(&mut agent));
        }
        assert_eq!(resent, 120);
        assert_eq!(agent.status(), ShipStatus::WaitingForBay);
    }

    #[test]
    fn test_no_retry_once_docking() {
        let ship = ship();
        let clock = ManualClock::new(0);
        let mut agent = agent_on(&ship, MemorySnapshotStore::new(), clock.clone());
        agent.request_dock();
        agent.transport_mut().push_inbound(dock_for("Miner-7").encode());
        agent.tick();
        assert_eq!(agent.status(), ShipStatus::Docking);
        outbound(&mut agent);

        clock.advance(60_000);
        agent.tick();
        assert_eq!(dock_requests(&outbound(&mut agent)), 0);
    }

    #[test]
    fn test_idle_agent_never_requests() {
        let ship = ship();
        let clock = ManualClock::new(0);
        let mut agent = agent_on(&ship, MemorySnapshotStore::new(), clock.clone());
        clock.advance(60_000);
        agent.tick();
        assert_eq!(dock_requests(&outbound(&mut agent)), 0);
    }

    #[test]
    fn test_restore_keeps_bay_and_throttle_count() {
        let ship = ship();
        let store = MemorySnapshotStore::new();
        let mut first = agent(&ship, store.clone());
        first.request_dock();
        first.transport_mut().push_inbound(dock_for("Miner-7").encode());
        first.tick();
        first.tick();
        let ticks = first.controller().ticks();

        let mut second = agent(&ship, store);
        assert!(second.restore().unwrap());
        assert_eq!(second.bay(), Some("Bay 1"));
        assert_eq!(second.controller().ticks(), ticks);
        assert_eq!(second.status_message(), "docking Bay 1 waypoint 1/2");
    }

    #[test]
    fn test_restore_docked_ship_keeps_bay() {
        let ship = ship();
        let store = MemorySnapshotStore::new();
        let mut first = agent(&ship, store.clone());
        first.request_dock();
        first.transport_mut().push_inbound(dock_for("Miner-7").encode());
        first.tick();
        ship.teleport(Vec3::new(0.0, 0.0, 20.0));
        first.tick();
        ship.teleport(Vec3::new(0.0, 0.0, 10.0));
        first.tick();
        first.tick();
        assert_eq!(first.status(), ShipStatus::Docked);

        let mut second = agent(&ship, store);
        assert!(!second.restore().unwrap());
        assert_eq!(second.status(), ShipStatus::Docked);
        assert_eq!(second.bay(), Some("Bay 1"));
    }
}
