//! Dock requests and their lifecycle.
//!
//! `Pending -> Assigned -> {Retired | Expired}`. At most one live request per
//! agent: a fresh request replaces (retires) the previous one. Retired and
//! expired entries are removed by [`RequestQueue::purge`] at the end of each
//! sweep and never come back.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Lifecycle state of a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RequestState {
    /// Waiting for the assignment engine
    Pending,
    /// A dock command was sent; the grace timer runs from `assigned_at_ms`
    Assigned {
        /// Bay committed to this request
        bay: String,
        /// When the assignment was committed
        assigned_at_ms: u64,
    },
    /// Completed or superseded
    Retired,
    /// Grace elapsed without the agent docking
    Expired,
}

/// One agent's outstanding intent to dock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DockRequest {
    /// Requesting agent
    pub agent: String,
    /// When the request was enqueued
    pub created_at_ms: u64,
    /// Lifecycle state
    pub state: RequestState,
}

impl DockRequest {
    /// Fresh pending request.
    pub fn new(agent: &str, now_ms: u64) -> Self {
        Self {
            agent: agent.to_string(),
            created_at_ms: now_ms,
            state: RequestState::Pending,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, RequestState::Pending)
    }

    /// Bay this request holds, when assigned.
    pub fn assigned_bay(&self) -> Option<&str> {
        match &self.state {
            RequestState::Assigned { bay, .. } => Some(bay),
            _ => None,
        }
    }

    /// True once retired or expired.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, RequestState::Retired | RequestState::Expired)
    }

    /// True when assigned longer than `grace_ms` ago.
    pub fn grace_elapsed(&self, now_ms: u64, grace_ms: u64) -> bool {
        match self.state {
            RequestState::Assigned { assigned_at_ms, .. } => {
                now_ms.saturating_sub(assigned_at_ms) > grace_ms
            }
            _ => false,
        }
    }

    /// Milliseconds since the request was enqueued.
    pub fn age_ms(&self, now_ms: u64) -> u64 {
        now_ms.saturating_sub(self.created_at_ms)
    }
}

/// What a submit did to the queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    /// First live request for this agent
    Created,
    /// Replaced an earlier live request
    Replaced {
        /// State of the request that was superseded
        previous: RequestState,
    },
}

/// Insertion-ordered request queue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestQueue {
    requests: Vec<DockRequest>,
}

impl RequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild from persisted requests, in order.
    pub fn from_requests(requests: Vec<DockRequest>) -> Self {
        Self { requests }
    }

    /// Enqueue a pending request for `agent`, superseding any live one. The
    /// new request joins the back of the queue.
    pub fn submit(&mut self, agent: &str, now_ms: u64) -> SubmitOutcome {
        let previous = self
            .requests
            .iter()
            .position(|r| r.agent == agent && !r.is_finished())
            .map(|index| self.requests.remove(index));
        self.requests.push(DockRequest::new(agent, now_ms));

        match previous {
            Some(old) => {
                debug!(agent = %agent, previous = ?old.state, "Dock request replaced");
                SubmitOutcome::Replaced {
                    previous: old.state,
                }
            }
            None => {
                info!(agent = %agent, "Dock request queued");
                SubmitOutcome::Created
            }
        }
    }

    /// `Pending -> Assigned`. Returns false when `agent` has no pending request.
    pub fn assign(&mut self, agent: &str, bay: &str, now_ms: u64) -> bool {
        match self
            .requests
            .iter_mut()
            .find(|r| r.agent == agent && r.is_pending())
        {
            Some(request) => {
                request.state = RequestState::Assigned {
                    bay: bay.to_string(),
                    assigned_at_ms: now_ms,
                };
                true
            }
            None => false,
        }
    }

    /// Move a live request to `Retired`.
    pub fn retire(&mut self, agent: &str) -> bool {
        self.transition(agent, RequestState::Retired)
    }

    /// Move a live request to `Expired`.
    pub fn expire(&mut self, agent: &str) -> bool {
        self.transition(agent, RequestState::Expired)
    }

    fn transition(&mut self, agent: &str, next: RequestState) -> bool {
        match self
            .requests
            .iter_mut()
            .find(|r| r.agent == agent && !r.is_finished())
        {
            Some(request) => {
                debug!(agent = %agent, from = ?request.state, to = ?next, "Dock request transition");
                request.state = next;
                true
            }
            None => false,
        }
    }

    /// Remove retired and expired requests, returning them.
    pub fn purge(&mut self) -> Vec<DockRequest> {
        let (finished, live): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.requests)
                .into_iter()
                .partition(DockRequest::is_finished);
        self.requests = live;
        finished
    }

    /// Live request for `agent`.
    pub fn get(&self, agent: &str) -> Option<&DockRequest> {
        self.requests
            .iter()
            .find(|r| r.agent == agent && !r.is_finished())
    }

    /// Pending requests in queue order.
    pub fn pending(&self) -> impl Iterator<Item = &DockRequest> + Clone {
        self.requests.iter().filter(|r| r.is_pending())
    }

    /// Assigned requests in queue order.
    pub fn assigned(&self) -> impl Iterator<Item = &DockRequest> + Clone {
        self.requests.iter().filter(|r| r.assigned_bay().is_some())
    }

    /// Every request in queue order.
    pub fn iter(&self) -> impl Iterator<Item = &DockRequest> {
        self.requests.iter()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submit_replaces_existing_request() {
        let mut queue = RequestQueue::new();
        assert_eq!(queue.submit("A", 0), SubmitOutcome::Created);
        assert_eq!(queue.submit("B", 1), SubmitOutcome::Created);
        assert!(queue.assign("A", "Bay 1", 2));

        let outcome = queue.submit("A", 3);
        assert_eq!(
            outcome,
            SubmitOutcome::Replaced {
                previous: RequestState::Assigned {
                    bay: "Bay 1".to_string(),
                    assigned_at_ms: 2
                }
            }
        );
        assert_eq!(queue.len(), 2);
        let order: Vec<_> = queue.iter().map(|r| r.agent.as_str()).collect();
        assert_eq!(order, vec!["B", "A"]);
        assert!(queue.get("A").unwrap().is_pending());
    }

    #[test]
    fn test_assign_only_pending() {
        let mut queue = RequestQueue::new();
        queue.submit("A", 0);
        assert!(queue.assign("A", "Bay 1", 5));
        assert!(!queue.assign("A", "Bay 2", 6));
        assert_eq!(queue.get("A").unwrap().assigned_bay(), Some("Bay 1"));
        assert!(!queue.assign("nobody", "Bay 1", 6));
    }

    #[test]
    fn test_grace_elapsed_only_when_assigned() {
        let mut queue = RequestQueue::new();
        queue.submit("A", 0);
        assert!(!queue.get("A").unwrap().grace_elapsed(1_000_000, 10));

        queue.assign("A", "Bay 1", 100);
        let request = queue.get("A").unwrap();
        assert!(!request.grace_elapsed(110, 10));
        assert!(request.grace_elapsed(111, 10));
    }

    #[test]
    fn test_purge_removes_finished_for_good() {
        let mut queue = RequestQueue::new();
        queue.submit("A", 0);
        queue.submit("B", 0);
        queue.assign("A", "Bay 1", 1);
        assert!(queue.expire("A"));
        assert!(queue.retire("B"));

        let purged = queue.purge();
        assert_eq!(purged.len(), 2);
        assert!(queue.is_empty());
        assert!(!queue.expire("A"));
        assert!(queue.get("A").is_none());
    }

    #[test]
    fn test_serde_state_tagging() {
        let request = DockRequest {
            agent: "A".to_string(),
            created_at_ms: 7,
            state: RequestState::Assigned {
                bay: "Bay 1".to_string(),
                assigned_at_ms: 9,
            },
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains(r#""state":{"state":"assigned""#));
        let decoded: DockRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, request);
    }
}
