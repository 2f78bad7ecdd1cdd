//! Assignment engine: pairs one pending request with a free bay per cycle.
//!
//! Greedy and single-shot. Pending requests are walked in queue order and
//! the first one with any candidate gets its nearest free bay; everything
//! else waits for the next cycle. This is not a globally optimal matching.

use crate::registry::Ship;
use crate::request::DockRequest;
use baymaster_core::Vec3;
use tracing::debug;

/// A free bay offered to the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct BayCandidate {
    /// Bay name
    pub name: String,
    /// Main connector position
    pub position: Vec3,
}

/// Ephemeral (agent, bay, distance) candidate.
#[derive(Debug, Clone, PartialEq)]
pub struct ShipExchangePair {
    /// Waiting agent
    pub agent: String,
    /// Free bay
    pub bay: String,
    /// Euclidean distance from agent to bay connector
    pub distance: f64,
}

/// How a pairing was chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentStrategy {
    /// One waiting agent, one free bay: paired without a distance table
    FastPath,
    /// Nearest candidate for the first matching pending request
    NearestPair,
}

/// Pairing selected for this cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub agent: String,
    pub bay: String,
    /// Present only when a distance table was built
    pub distance: Option<f64>,
    pub strategy: AssignmentStrategy,
}

/// Every (waiting agent x free bay) pair, nearest first.
///
/// The sort is stable, so equal distances keep agent-then-bay order.
pub fn candidate_pairs<'a>(
    waiting: impl IntoIterator<Item = &'a Ship>,
    bays: &[BayCandidate],
) -> Vec<ShipExchangePair> {
    let mut pairs: Vec<ShipExchangePair> = waiting
        .into_iter()
        .flat_map(|ship| {
            bays.iter().map(move |bay| ShipExchangePair {
                agent: ship.name.clone(),
                bay: bay.name.clone(),
                distance: ship.position.distance(bay.position),
            })
        })
        .collect();
    pairs.sort_by(|a, b| a.distance.total_cmp(&b.distance));
    pairs
}

/// Select at most one pairing.
///
/// `pending` must be in queue order; `waiting` is the registry's waiting
/// set; `bays` the free bays this cycle. Pending requests without a waiting
/// agent are skipped and retried on a later cycle.
pub fn select_assignment<'a, P, W>(pending: P, waiting: W, bays: &[BayCandidate]) -> Option<Assignment>
where
    P: IntoIterator<Item = &'a DockRequest>,
    W: IntoIterator<Item = &'a Ship>,
    W::IntoIter: Clone,
{
    if bays.is_empty() {
        return None;
    }
    let waiting = waiting.into_iter();

    let mut lookahead = waiting.clone();
    if let (Some(only), None, [bay]) = (lookahead.next(), lookahead.next(), bays) {
        let agent = only.name.as_str();
        return pending
            .into_iter()
            .any(|request| request.agent == agent)
            .then(|| {
                debug!(agent = %agent, bay = %bay.name, "Fast-path assignment");
                Assignment {
                    agent: agent.to_string(),
                    bay: bay.name.clone(),
                    distance: None,
                    strategy: AssignmentStrategy::FastPath,
                }
            });
    }

    let pairs = candidate_pairs(waiting, bays);
    pending.into_iter().find_map(|request| {
        pairs
            .iter()
            .find(|pair| pair.agent == request.agent)
            .map(|pair| Assignment {
                agent: pair.agent.clone(),
                bay: pair.bay.clone(),
                distance: Some(pair.distance),
                strategy: AssignmentStrategy::NearestPair,
            })
    })
}
