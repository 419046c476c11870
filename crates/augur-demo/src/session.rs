//! A predictor and an authority joined by two simulated links.

use augur_config::Config;
use augur_net::LinkConfig;
use tracing::debug;

use crate::authority::Authority;
use crate::error::DemoError;
use crate::predictor::{Predictor, ReconcileStats, VALUE_E_RANGE};
use crate::protocol::{DemoChannel, ValueId};

/// Snapshot of how far the predictor's view is from ground truth.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    /// Steps run.
    pub ticks: u64,
    /// `(displayed, authoritative)` for each editable value.
    pub values: [(f32, f32); 4],
    /// Ring distance between the predictor's and the authority's value E.
    pub value_e_error: f32,
    /// Distance between the predictor's displayed player and the authority's.
    pub player_error: f32,
    /// Inputs still buffered for replay.
    pub ledger_len: usize,
    /// Messages sent predictor to authority.
    pub requests_sent: u64,
    /// Messages sent authority to predictor.
    pub updates_sent: u64,
    /// What the predictor did with the updates it received.
    pub stats: ReconcileStats,
}

/// Both participants and the links between them, stepped in lockstep.
pub struct Session {
    predictor: Predictor,
    authority: Authority,
    upstream: DemoChannel,
    downstream: DemoChannel,
    ticks: u64,
}

impl Session {
    /// Validates `config` and initializes both participants.
    pub fn init(config: &Config) -> Result<Self, DemoError> {
        config.validate()?;
        let network = &config.network;
        let link = |seed| LinkConfig::from_millis(network.latency_ms, network.jitter_ms, seed);

        Ok(Self {
            predictor: Predictor::init(config)?,
            authority: Authority::init(config)?,
            upstream: DemoChannel::new(link(network.seed.wrapping_add(2))),
            downstream: DemoChannel::new(link(network.seed.wrapping_add(3))),
            ticks: 0,
        })
    }

    /// Runs one step on each side, predictor first.
    pub fn step(&mut self) -> Result<(), DemoError> {
        self.predictor.step(&mut self.upstream, &mut self.downstream)?;
        self.authority.step(&mut self.upstream, &mut self.downstream)?;
        self.ticks += 1;

        if self.ticks % 60 == 0 {
            debug!(
                tick = self.ticks,
                upstream_in_flight = self.upstream.link().in_flight(),
                downstream_in_flight = self.downstream.link().in_flight(),
                "session step"
            );
        }
        Ok(())
    }

    /// Steps run so far.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// The predicting participant.
    pub fn predictor(&self) -> &Predictor {
        &self.predictor
    }

    /// The authoritative participant.
    pub fn authority(&self) -> &Authority {
        &self.authority
    }

    /// Compares the two participants' views.
    pub fn summary(&self) -> Summary {
        let values = ValueId::ALL.map(|id| {
            (
                self.predictor.value(id).read(),
                self.authority.value(id).authoritative_read(),
            )
        });
        let value_e_error = ring_distance(
            self.predictor.value_e().read(),
            self.authority.value_e().authoritative_read(),
        );
        let player_error = self
            .predictor
            .player()
            .read()
            .position
            .distance(self.authority.player().authoritative_ref().position);

        Summary {
            ticks: self.ticks,
            values,
            value_e_error,
            player_error,
            ledger_len: self.predictor.inputs().borrow().len(),
            requests_sent: self.upstream.link().sent(),
            updates_sent: self.downstream.link().sent(),
            stats: self.predictor.stats(),
        }
    }

    /// Tears down both participants.
    pub fn teardown(&mut self) {
        self.predictor.teardown();
        self.authority.teardown();
    }
}

fn ring_distance(a: f32, b: f32) -> f32 {
    let d = (a - b).rem_euclid(VALUE_E_RANGE);
    d.min(VALUE_E_RANGE - d)
}
