//! Broadcast transports.
//!
//! A [`Transport`] is the only way a control loop talks to the outside world:
//! it broadcasts raw frames and drains whatever frames arrived since the last
//! call. Nothing is acknowledged, ordered or guaranteed.

use crate::message::Message;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{trace, warn};

/// Broadcast/receive primitive.
pub trait Transport {
    /// Send a frame to every listener. Fire-and-forget.
    fn broadcast(&mut self, frame: &str);

    /// Drain frames received since the previous call.
    fn receive(&mut self) -> Vec<String>;
}

/// Typed helpers on top of any [`Transport`].
pub trait TransportExt: Transport {
    /// Encode and broadcast a message.
    fn send(&mut self, message: &Message) {
        self.broadcast(&message.encode());
    }

    /// Drain and decode received frames. Frames that fail to decode are
    /// logged and skipped.
    fn receive_messages(&mut self) -> Vec<Message> {
        self.receive()
            .into_iter()
            .filter_map(|frame| match Message::decode(&frame) {
                Ok(message) => Some(message),
                Err(e) => {
                    warn!(error = %e, frame = %frame, "Dropping undecodable frame");
                    None
                }
            })
            .collect()
    }
}

impl<T: Transport + ?Sized> TransportExt for T {}

/// Pair of queues pumped by an external I/O loop (for example a UDP socket).
#[derive(Debug, Default)]
pub struct Mailbox {
    inbox: VecDeque<String>,
    outbox: Vec<String>,
}

impl Mailbox {
    /// Create an empty mailbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame that arrived from the network.
    pub fn push_inbound(&mut self, frame: impl Into<String>) {
        self.inbox.push_back(frame.into());
    }

    /// Take every frame broadcast since the previous call.
    pub fn take_outbound(&mut self) -> Vec<String> {
        std::mem::take(&mut self.outbox)
    }

    /// Number of frames waiting to be received.
    pub fn pending_inbound(&self) -> usize {
        self.inbox.len()
    }
}

impl Transport for Mailbox {
    fn broadcast(&mut self, frame: &str) {
        self.outbox.push(frame.to_string());
    }

    fn receive(&mut self) -> Vec<String> {
        self.inbox.drain(..).collect()
    }
}

/// Channel impairments applied per delivery.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LossProfile {
    /// Probability that a delivery to one listener is dropped
    pub drop_probability: f64,
    /// Probability that a delivered frame arrives twice
    pub duplicate_probability: f64,
}

impl LossProfile {
    /// Perfect channel.
    pub fn lossless() -> Self {
        Self::default()
    }
}

#[derive(Debug)]
struct BusState {
    inboxes: Vec<VecDeque<String>>,
    loss: LossProfile,
    rng: StdRng,
    delivered: u64,
    dropped: u64,
}

/// In-memory broadcast medium shared by any number of endpoints.
#[derive(Debug, Clone)]
pub struct MemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBus {
    /// Lossless bus.
    pub fn new() -> Self {
        Self::with_loss(LossProfile::lossless(), 0)
    }

    /// Bus that drops and duplicates deliveries, reproducibly from `seed`.
    pub fn with_loss(loss: LossProfile, seed: u64) -> Self {
        Self {
            state: Arc::new(Mutex::new(BusState {
                inboxes: Vec::new(),
                loss,
                rng: StdRng::seed_from_u64(seed),
                delivered: 0,
                dropped: 0,
            })),
        }
    }

    /// Attach a new listener.
    pub fn endpoint(&self) -> BusEndpoint {
        let mut state = self.lock();
        state.inboxes.push(VecDeque::new());
        BusEndpoint {
            bus: self.clone(),
            index: state.inboxes.len() - 1,
        }
    }

    /// Change the impairment profile for subsequent broadcasts.
    pub fn set_loss(&self, loss: LossProfile) {
        self.lock().loss = loss;
    }

    /// (delivered, dropped) delivery counters.
    pub fn stats(&self) -> (u64, u64) {
        let state = self.lock();
        (state.delivered, state.dropped)
    }

    fn lock(&self) -> MutexGuard<'_, BusState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// One listener on a [`MemoryBus`]. Broadcasts are not looped back.
#[derive(Debug, Clone)]
pub struct BusEndpoint {
    bus: MemoryBus,
    index: usize,
}

impl Transport for BusEndpoint {
    fn broadcast(&mut self, frame: &str) {
        let mut guard = self.bus.lock();
        let state = &mut *guard;
        let loss = state.loss;
        for (index, inbox) in state.inboxes.iter_mut().enumerate() {
            if index == self.index {
                continue;
            }
            if loss.drop_probability > 0.0 && state.rng.gen_bool(loss.drop_probability.min(1.0)) {
                state.dropped += 1;
                trace!(to = index, "Bus dropped frame");
                continue;
            }
            inbox.push_back(frame.to_string());
            state.delivered += 1;
            if loss.duplicate_probability > 0.0
                && state.rng.gen_bool(loss.duplicate_probability.min(1.0))
            {
                inbox.push_back(frame.to_string());
                state.delivered += 1;
            }
        }
    }

    fn receive(&mut self) -> Vec<String> {
        let mut state = self.bus.lock();
        match state.inboxes.get_mut(self.index) {
            Some(inbox) => inbox.drain(..).collect(),
            None => Vec::new(),
        }
    }
}
