//! Base coordinator: one control cycle per [`BaseCoordinator::tick`].
//!
//! Cycle order:
//! 1. ingest inbound messages (admission, status reports, undock requests)
//! 2. refresh bay occupancy from connector telemetry
//! 3. sweep the request queue (grace expiry, orphaned pending requests)
//! 4. prune stale registry entries
//! 5. commit at most one assignment and send its dock command
//! 6. poll agent status when the interval has elapsed
//! 7. push one snapshot
//!
//! Nothing here returns an error mid-cycle. Failures are logged and the loop
//! carries on; the outcome of each cycle is summarized in a [`CycleReport`].

use crate::assignment::{select_assignment, Assignment, BayCandidate};
use crate::bay::{BayState, ExchangeBay, ReservationOutcome};
use crate::error::{BaseError, BaseResult, BayError};
use crate::hardware::BayInventory;
use crate::registry::ShipRegistry;
use crate::request::{RequestQueue, RequestState, SubmitOutcome};
use crate::snapshot::BaseSnapshot;
use baymaster_core::{format_distance, BaseConfig, Clock, Config, GeometryConfig, SnapshotStore, Vec3};
use baymaster_protocol::{DockInstructions, Message, Transport, TransportExt};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Summary of one control cycle.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CycleReport {
    /// Cycle counter, starting at 1
    pub cycle: u64,
    /// Messages decoded this cycle
    pub received: usize,
    /// Dock requests admitted (new or replacing)
    pub admitted: Vec<String>,
    /// Dock requests rejected at admission
    pub rejected: Vec<String>,
    /// Requests that reached `Expired` and were purged
    pub expired: Vec<String>,
    /// Requests that reached `Retired` and were purged
    pub retired: Vec<String>,
    /// Registry entries evicted as stale
    pub pruned: Vec<String>,
    /// Pairing committed this cycle, if any
    pub assignment: Option<Assignment>,
    /// Undock commands sent
    pub undocked: Vec<String>,
    /// Whether a status poll went out
    pub status_polled: bool,
    /// Whether the snapshot push succeeded
    pub snapshot_saved: bool,
}

/// Structured view of the base for logs and tests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseStatus {
    /// Base name
    pub name: String,
    /// Active bays
    pub bays: Vec<BayState>,
    /// Bays available for assignment right now
    pub free_bays: usize,
    /// Requests waiting for a bay
    pub pending_requests: usize,
    /// Requests holding a bay
    pub assigned_requests: usize,
    /// Agents in the registry
    pub tracked_ships: usize,
    /// Bays excluded at discovery, with the reason
    pub excluded_bays: Vec<(String, BayError)>,
}

/// Owns the bays, request queue and registry of one base.
pub struct BaseCoordinator<T: Transport> {
    base: BaseConfig,
    geometry: GeometryConfig,
    clock: Arc<dyn Clock>,
    transport: T,
    bays: Vec<ExchangeBay>,
    excluded: Vec<(String, BayError)>,
    requests: RequestQueue,
    registry: ShipRegistry,
    store: Box<dyn SnapshotStore>,
    last_status_poll_ms: Option<u64>,
    cycle: u64,
}

impl<T: Transport> BaseCoordinator<T> {
    /// Build a coordinator. Bays are discovered once from `inventory`;
    /// invalid or duplicate bays are excluded and logged.
    pub fn new(
        config: &Config,
        clock: Arc<dyn Clock>,
        transport: T,
        inventory: &dyn BayInventory,
        store: Box<dyn SnapshotStore>,
    ) -> Self {
        let mut bays: Vec<ExchangeBay> = Vec::new();
        let mut excluded = Vec::new();
        for parts in inventory.discover() {
            let name = parts.name.clone();
            let result = if bays.iter().any(|b| b.name() == name) {
                Err(BayError::DuplicateName(name.clone()))
            } else {
                ExchangeBay::from_parts(parts)
            };
            match result {
                Ok(bay) => bays.push(bay),
                Err(e) => {
                    warn!(bay = %name, error = %e, "Bay excluded from active set");
                    excluded.push((name, e));
                }
            }
        }

        info!(
            base = %config.base.name,
            active = bays.len(),
            excluded = excluded.len(),
            "Base coordinator initialized"
        );

        Self {
            base: config.base.clone(),
            geometry: config.geometry.clone(),
            clock,
            transport,
            bays,
            excluded,
            requests: RequestQueue::new(),
            registry: ShipRegistry::new(),
            store,
            last_status_poll_ms: None,
            cycle: 0,
        }
    }

    /// Load the last snapshot, if any. Returns whether state was restored.
    /// Bay states for bays no longer present are ignored.
    pub fn restore(&mut self) -> BaseResult<bool> {
        let Some(flat) = self.store.load()? else {
            return Ok(false);
        };
        let snapshot = BaseSnapshot::from_flat(&flat)?;

        for state in &snapshot.bays {
            match self.bays.iter_mut().find(|b| b.name() == state.name) {
                Some(bay) => bay.restore(state),
                None => warn!(bay = %state.name, "Snapshot references unknown bay, skipped"),
            }
        }
        self.requests = RequestQueue::from_requests(snapshot.requests);
        info!(requests = self.requests.len(), "Base state restored from snapshot");
        Ok(true)
    }

    /// Current persistable state.
    pub fn snapshot(&self) -> BaseSnapshot {
        BaseSnapshot {
            requests: self.requests.iter().cloned().collect(),
            bays: self.bays.iter().map(ExchangeBay::state).collect(),
        }
    }

    /// Run one control cycle.
    pub fn tick(&mut self) -> CycleReport {
        let now = self.clock.now_ms();
        self.cycle += 1;
        let mut report = CycleReport {
            cycle: self.cycle,
            ..Default::default()
        };

        self.ingest(now, &mut report);
        self.refresh_bays(now);
        self.sweep_requests(now, &mut report);
        report.pruned = self.registry.prune(now, self.base.ship_stale_ms);
        if !report.pruned.is_empty() {
            debug!(count = report.pruned.len(), "Registry pruned");
        }
        report.assignment = self.assign(now);
        report.status_polled = self.poll_status(now);
        report.snapshot_saved = self.persist();
        report
    }

    fn ingest(&mut self, now: u64, report: &mut CycleReport) {
        let messages = self.transport.receive_messages();
        report.received = messages.len();

        for message in messages {
            match message {
                Message::RequestDock { from, position } => {
                    if self.admit(&from, position, now) {
                        report.admitted.push(from);
                    } else {
                        report.rejected.push(from);
                    }
                }
                Message::ResponseStatus {
                    from,
                    status,
                    position,
                    message,
                } => {
                    if from.is_empty() {
                        debug!("Status report without sender ignored");
                        continue;
                    }
                    self.registry.upsert(&from, status, position, &message, now);
                }
                Message::RequestUndock { from } => {
                    if self.send_undock(&from) {
                        report.undocked.push(from);
                    }
                }
                other => {
                    debug!(command = other.command(), "Ignoring base-to-agent message");
                }
            }
        }
    }

    /// Admission control plus last-request-wins enqueue.
    fn admit(&mut self, agent: &str, position: Vec3, now: u64) -> bool {
        if agent.is_empty() {
            warn!("Dock request without sender rejected");
            return false;
        }
        let distance = position.distance(self.base.position);
        if !distance.is_finite() || distance > self.base.max_request_distance {
            info!(
                agent = %agent,
                distance = %format_distance(distance),
                limit = %format_distance(self.base.max_request_distance),
                "Dock request rejected: out of range"
            );
            return false;
        }

        if let SubmitOutcome::Replaced {
            previous: RequestState::Assigned { bay, .. },
        } = self.requests.submit(agent, now)
        {
            if let Some(bay) = self.bays.iter_mut().find(|b| b.name() == bay) {
                bay.release_reservation(agent);
            }
        }
        true
    }

    fn send_undock(&mut self, agent: &str) -> bool {
        let Some(bay) = self.bays.iter().find(|b| b.occupant() == Some(agent)) else {
            warn!(agent = %agent, "Undock requested by ship not occupying any bay");
            return false;
        };
        let (forward, up) = bay.orientation();
        let path = bay.compute_approach_waypoints(
            self.geometry.waypoint_count,
            self.geometry.standoff_distance,
            self.geometry.terminal_offset,
        );
        let instructions = DockInstructions {
            to: agent.to_string(),
            from: self.base.name.clone(),
            exchange: bay.name().to_string(),
            forward,
            up,
            waypoints: path.departure,
        };
        info!(agent = %agent, bay = %bay.name(), "Undock command sent");
        self.transport.send(&Message::Undock(instructions));
        true
    }

    fn refresh_bays(&mut self, now: u64) {
        let timeout = self.base.reservation_timeout_ms;
        for bay in &mut self.bays {
            let update = bay.refresh_occupancy(now, timeout);
            match update.reservation {
                ReservationOutcome::Fulfilled { agent } => {
                    if self.requests.get(&agent).and_then(|r| r.assigned_bay()) == Some(bay.name()) {
                        self.requests.retire(&agent);
                        info!(agent = %agent, bay = %bay.name(), "Dock request completed");
                    }
                }
                ReservationOutcome::Abandoned { agent } => {
                    if self.requests.get(&agent).and_then(|r| r.assigned_bay()) == Some(bay.name()) {
                        self.requests.expire(&agent);
                    }
                }
                ReservationOutcome::Unchanged => {}
            }
        }
    }

    fn sweep_requests(&mut self, now: u64, report: &mut CycleReport) {
        let grace = self.base.request_grace_ms;
        let stale = self.base.ship_stale_ms;

        let timed_out: Vec<(String, String)> = self
            .requests
            .assigned()
            .filter(|r| r.grace_elapsed(now, grace))
            .filter_map(|r| r.assigned_bay().map(|bay| (r.agent.clone(), bay.to_string())))
            .collect();
        for (agent, bay_name) in timed_out {
            warn!(agent = %agent, bay = %bay_name, "Dock request expired without docking");
            self.requests.expire(&agent);
            if let Some(bay) = self.bays.iter_mut().find(|b| b.name() == bay_name) {
                bay.release_reservation(&agent);
            }
        }

        let orphaned: Vec<String> = self
            .requests
            .pending()
            .filter(|r| !self.registry.contains(&r.agent) && r.age_ms(now) > stale)
            .map(|r| r.agent.clone())
            .collect();
        for agent in orphaned {
            info!(agent = %agent, "Dropping pending request from untracked ship");
            self.requests.expire(&agent);
        }

        for request in self.requests.purge() {
            match request.state {
                RequestState::Expired => report.expired.push(request.agent),
                _ => report.retired.push(request.agent),
            }
        }
    }

    fn assign(&mut self, now: u64) -> Option<Assignment> {
        let held: HashSet<&str> = self.requests.assigned().filter_map(|r| r.assigned_bay()).collect();
        let candidates: Vec<BayCandidate> = self
            .bays
            .iter()
            .filter(|b| b.is_free() && !held.contains(b.name()))
            .map(|b| BayCandidate {
                name: b.name().to_string(),
                position: b.position(),
            })
            .collect();

        let assignment = select_assignment(self.requests.pending(), self.registry.waiting_agents(), &candidates)?;
        let bay = self.bays.iter_mut().find(|b| b.name() == assignment.bay)?;

        bay.reserve(&assignment.agent, now);
        self.requests.assign(&assignment.agent, &assignment.bay, now);

        let (forward, up) = bay.orientation();
        let path = bay.compute_approach_waypoints(
            self.geometry.waypoint_count,
            self.geometry.standoff_distance,
            self.geometry.terminal_offset,
        );
        info!(
            agent = %assignment.agent,
            bay = %assignment.bay,
            strategy = ?assignment.strategy,
            distance = %assignment.distance.map(format_distance).unwrap_or_else(|| "-".to_string()),
            "Bay assigned"
        );
        self.transport.send(&Message::Dock(DockInstructions {
            to: assignment.agent.clone(),
            from: self.base.name.clone(),
            exchange: assignment.bay.clone(),
            forward,
            up,
            waypoints: path.approach,
        }));
        Some(assignment)
    }

    fn poll_status(&mut self, now: u64) -> bool {
        let due = self
            .last_status_poll_ms
            .map_or(true, |last| now.saturating_sub(last) >= self.base.status_request_interval_ms);
        if due {
            self.transport.send(&Message::RequestStatus {
                from: self.base.name.clone(),
            });
            self.last_status_poll_ms = Some(now);
        }
        due
    }

    fn persist(&mut self) -> bool {
        let result = self
            .snapshot()
            .to_flat()
            .and_then(|flat| self.store.save(&flat));
        match result {
            Ok(()) => true,
            Err(e) => {
                warn!(error = %e, "Snapshot push failed");
                false
            }
        }
    }

    /// Structured status summary.
    pub fn status(&self) -> BaseStatus {
        BaseStatus {
            name: self.base.name.clone(),
            bays: self.bays.iter().map(ExchangeBay::state).collect(),
            free_bays: self.bays.iter().filter(|b| b.is_free()).count(),
            pending_requests: self.requests.pending().count(),
            assigned_requests: self.requests.assigned().count(),
            tracked_ships: self.registry.len(),
            excluded_bays: self.excluded.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.base.name
    }

    pub fn bays(&self) -> &[ExchangeBay] {
        &self.bays
    }

    /// Active bay by name.
    pub fn bay(&self, name: &str) -> BaseResult<&ExchangeBay> {
        self.bays
            .iter()
            .find(|b| b.name() == name)
            .ok_or_else(|| BaseError::BayNotFound(name.to_string()))
    }

    pub fn requests(&self) -> &RequestQueue {
        &self.requests
    }

    pub fn registry(&self) -> &ShipRegistry {
        &self.registry
    }

    /// Transport handle, for hosts that pump frames in and out.
    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }
}
