//! Ship registry: last-known status per agent, with staleness eviction.

use baymaster_core::Vec3;
use baymaster_protocol::ShipStatus;
use std::collections::BTreeMap;
use tracing::debug;

/// Last report received from one agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Ship {
    /// Agent name
    pub name: String,
    /// Last reported status
    pub status: ShipStatus,
    /// Last reported position
    pub position: Vec3,
    /// Free-text status detail
    pub message: String,
    /// When the last report arrived (ms)
    pub last_update_ms: u64,
}

impl Ship {
    /// True when the ship reports it is waiting for a bay.
    pub fn is_waiting(&self) -> bool {
        self.status == ShipStatus::WaitingForBay
    }

    /// True when the last report is older than `max_age_ms`.
    pub fn is_stale(&self, now_ms: u64, max_age_ms: u64) -> bool {
        now_ms.saturating_sub(self.last_update_ms) > max_age_ms
    }
}

/// Tracked agents keyed by name.
#[derive(Debug, Default)]
pub struct ShipRegistry {
    ships: BTreeMap<String, Ship>,
}

impl ShipRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the entry for `name`; the timestamp always moves
    /// to `now_ms`.
    pub fn upsert(&mut self, name: &str, status: ShipStatus, position: Vec3, message: &str, now_ms: u64) {
        let ship = self.ships.entry(name.to_string()).or_insert_with(|| Ship {
            name: name.to_string(),
            status,
            position,
            message: String::new(),
            last_update_ms: now_ms,
        });
        ship.status = status;
        ship.position = position;
        ship.message = message.to_string();
        ship.last_update_ms = now_ms;
    }

    /// Drop entries older than `max_age_ms`, returning their names.
    pub fn prune(&mut self, now_ms: u64, max_age_ms: u64) -> Vec<String> {
        let stale: Vec<String> = self
            .ships
            .values()
            .filter(|s| s.is_stale(now_ms, max_age_ms))
            .map(|s| s.name.clone())
            .collect();
        for name in &stale {
            self.ships.remove(name);
            debug!(agent = %name, "Stale ship pruned");
        }
        stale
    }

    /// Ships currently waiting for a bay. Restartable: call again for a
    /// fresh pass.
    pub fn waiting_agents(&self) -> impl Iterator<Item = &Ship> + Clone {
        self.ships.values().filter(|s| s.is_waiting())
    }

    pub fn get(&self, name: &str) -> Option<&Ship> {
        self.ships.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.ships.contains_key(name)
    }

    /// All tracked ships in name order.
    pub fn iter(&self) -> impl Iterator<Item = &Ship> {
        self.ships.values()
    }

    pub fn len(&self) -> usize {
        self.ships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ships.is_empty()
    }
}
