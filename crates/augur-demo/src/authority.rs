//! The authoritative participant: applies prediction requests as ground
//! truth, drives value E, and broadcasts every change.

use augur_anticipation::{AnticipatedTransform, AnticipatedValue, Role, SimulationClock, Tick, TransformState};
use augur_config::Config;
use augur_net::{Message, PredictionRequest};
use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;
use tracing::{debug, info, trace};

use crate::error::DemoError;
use crate::player::{Teleport, TeleportKind, move_player};
use crate::predictor::VALUE_E_RANGE;
use crate::protocol::{DemoChannel, Request, StateUpdate, ValueId};

/// Server side of the demo.
pub struct Authority {
    clock: SimulationClock,
    values: Vec<AnticipatedValue<f32>>,
    value_e: AnticipatedValue<f32>,
    player: AnticipatedTransform,
    rng: Xoshiro256StarStar,
    smooth_time: f64,
    value_e_rate: f32,
    requests: u64,
}

impl Authority {
    /// Builds the authority's values.
    pub fn init(config: &Config) -> Result<Self, DemoError> {
        let clock = SimulationClock::new(config.simulation.tick_rate)?;
        let values = ValueId::ALL
            .into_iter()
            .map(|id| {
                AnticipatedValue::new(0.0f32)
                    .with_name(format!("{id:?}"))
                    .with_role(Role::Authority)
            })
            .collect();

        info!(seed = config.network.seed, "authority initialized");
        Ok(Self {
            clock,
            values,
            value_e: AnticipatedValue::new(0.0f32).with_name("E").with_role(Role::Authority),
            player: AnticipatedTransform::new(TransformState::default())
                .with_name("player")
                .with_role(Role::Authority),
            rng: Xoshiro256StarStar::seed_from_u64(config.network.seed),
            smooth_time: config.anticipation.smooth_time,
            value_e_rate: config.demo.value_e_rate as f32,
            requests: 0,
        })
    }

    /// Runs one simulation step.
    pub fn step(&mut self, upstream: &mut DemoChannel, downstream: &mut DemoChannel) -> Result<(), DemoError> {
        let now = self.clock.advance();
        let seconds = self.clock.seconds_between(Tick::ZERO, now);
        let dt = self.clock.step_duration();

        for message in upstream.receive(seconds) {
            match message {
                Message::PredictionRequest(request) => self.apply(request),
                Message::AuthoritativeUpdate(_) => debug!("authority ignoring an authoritative update"),
            }
        }

        let next_e = (self.value_e.authoritative_ref() + self.value_e_rate * dt as f32).rem_euclid(VALUE_E_RANGE);
        self.value_e.anticipate(next_e, now);

        for (id, value) in ValueId::ALL.into_iter().zip(&mut self.values) {
            if let Some(update) = value.take_broadcast() {
                let state = StateUpdate::Value { id, value: update.value };
                downstream.send(seconds, &Message::update(update.tick, state))?;
            }
        }
        if let Some(update) = self.value_e.take_broadcast() {
            downstream.send(seconds, &Message::update(update.tick, StateUpdate::ValueE(update.value)))?;
        }
        if let Some(update) = self.player.take_broadcast() {
            downstream.send(seconds, &Message::update(update.tick, StateUpdate::Player(update.value)))?;
        }

        for value in &mut self.values {
            value.update(dt);
        }
        self.player.update(dt);
        Ok(())
    }

    /// Applies a request as ground truth at the tick it was predicted for.
    fn apply(&mut self, request: PredictionRequest<Request>) {
        let PredictionRequest { tick, request } = request;
        self.requests += 1;
        match request {
            Request::SetValue { id, value } => {
                let value = if id.is_randomized() {
                    self.rng.gen_range(0.0..VALUE_E_RANGE)
                } else {
                    value
                };
                let slot = &mut self.values[id.index()];
                let previous = slot.authoritative_read();
                slot.anticipate(value, tick);
                if id == ValueId::C {
                    slot.smooth(previous, value, self.smooth_time);
                }
                info!(value = ?id, previous, current = value, %tick, "authority set value");
            }
            Request::Move(mut input) => {
                if let Some(teleport) = input.teleport.as_mut()
                    && teleport.kind != TeleportKind::Center
                {
                    *teleport = Teleport::roll(teleport.kind, &mut self.rng);
                    debug!(kind = ?teleport.kind, position = ?teleport.position, "authority rolled teleport");
                }
                let next = move_player(*self.player.authoritative_ref(), &input, self.clock.step_duration());
                self.player.anticipate(next, tick);
                trace!(%tick, position = ?next.position, "authority moved player");
            }
        }
    }

    /// Drops any unsent broadcasts.
    pub fn teardown(&mut self) {
        for value in &mut self.values {
            value.teardown();
        }
        self.value_e.teardown();
        self.player.teardown();
        info!(requests = self.requests, "authority torn down");
    }

    /// An editable value.
    pub fn value(&self, id: ValueId) -> &AnticipatedValue<f32> {
        &self.values[id.index()]
    }

    /// The server-driven value.
    pub fn value_e(&self) -> &AnticipatedValue<f32> {
        &self.value_e
    }

    /// The player transform.
    pub fn player(&self) -> &AnticipatedTransform {
        &self.player
    }

    /// Prediction requests applied so far.
    pub fn requests(&self) -> u64 {
        self.requests
    }
}
