//! In-memory one-way link with simulated latency.
//!
//! Each payload is delayed by `latency ± jitter` seconds of simulation time.
//! Delivery order always matches send order: a payload whose random delay
//! would let it overtake an earlier one waits for it instead, the way a
//! reliable ordered transport behaves.

use std::collections::VecDeque;

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use tracing::trace;

/// Latency parameters for a [`SimulatedLink`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinkConfig {
    /// Base one-way delay in seconds.
    pub latency: f64,
    /// Maximum deviation from `latency` in seconds, applied uniformly.
    pub jitter: f64,
    /// RNG seed, so runs are reproducible.
    pub seed: u64,
}

impl LinkConfig {
    /// Builds a config from millisecond values.
    pub fn from_millis(latency_ms: u32, jitter_ms: u32, seed: u64) -> Self {
        Self {
            latency: f64::from(latency_ms) / 1000.0,
            jitter: f64::from(jitter_ms) / 1000.0,
            seed,
        }
    }
}

#[derive(Debug)]
struct InFlight {
    deliver_at: f64,
    payload: Vec<u8>,
}

/// One direction of a simulated connection.
#[derive(Debug)]
pub struct SimulatedLink {
    config: LinkConfig,
    rng: Xoshiro256StarStar,
    queue: VecDeque<InFlight>,
    sent: u64,
    delivered: u64,
}

impl SimulatedLink {
    /// Creates an empty link.
    pub fn new(config: LinkConfig) -> Self {
        Self {
            config,
            rng: Xoshiro256StarStar::seed_from_u64(config.seed),
            queue: VecDeque::new(),
            sent: 0,
            delivered: 0,
        }
    }

    /// Queues `payload` at simulation time `now` (seconds). Returns the time
    /// it will be delivered at.
    pub fn send(&mut self, now: f64, payload: Vec<u8>) -> f64 {
        let jitter = if self.config.jitter > 0.0 {
            self.rng.gen_range(-self.config.jitter..=self.config.jitter)
        } else {
            0.0
        };
        let delay = (self.config.latency + jitter).max(0.0);
        let earliest = self.queue.back().map_or(now, |last| last.deliver_at);
        let deliver_at = (now + delay).max(earliest);

        trace!(now, deliver_at, bytes = payload.len(), "link send");
        self.queue.push_back(InFlight {
            deliver_at,
            payload,
        });
        self.sent += 1;
        deliver_at
    }

    /// Removes and returns every payload due at or before `now`, in send
    /// order.
    pub fn receive(&mut self, now: f64) -> Vec<Vec<u8>> {
        let mut due = Vec::new();
        while self.queue.front().is_some_and(|front| front.deliver_at <= now) {
            if let Some(entry) = self.queue.pop_front() {
                due.push(entry.payload);
            }
        }
        self.delivered += due.len() as u64;
        due
    }

    /// Payloads sent but not yet delivered.
    pub fn in_flight(&self) -> usize {
        self.queue.len()
    }

    /// Total payloads ever sent.
    pub fn sent(&self) -> u64 {
        self.sent
    }

    /// Total payloads ever delivered.
    pub fn delivered(&self) -> u64 {
        self.delivered
    }

    /// The link's latency parameters.
    pub fn config(&self) -> LinkConfig {
        self.config
    }
}
