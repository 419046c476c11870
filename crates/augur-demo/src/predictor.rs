//! The predicting participant: applies user activity immediately, asks the
//! authority to do the same, and reconciles when confirmations arrive.

use std::cell::Cell;
use std::rc::Rc;

use augur_anticipation::{
    AnticipatedTransform, AnticipatedValue, AuthoritativeUpdate, HistoryLedger, ReanticipateEvent,
    ReconcileOutcome, ReplayReanticipator, SharedLedger, SimulationClock, SmoothingGate,
    StalePolicy, Tick, TransformState, wrapping_lerp,
};
use augur_config::Config;
use augur_net::Message;
use tracing::{debug, info};

use crate::error::DemoError;
use crate::player::{PlayerInput, move_player};
use crate::protocol::{DemoChannel, Request, StateUpdate, ValueId};
use crate::script::{Script, ScriptStep};

/// Value E lives on the ring `[0, VALUE_E_RANGE)`.
pub const VALUE_E_RANGE: f32 = 10.0;

/// Counts of what happened to authoritative updates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Updates received.
    pub updates: u64,
    /// Kept the local prediction.
    pub ignored: u64,
    /// Followed the authority with nothing outstanding.
    pub followed: u64,
    /// Rebuilt through a reanticipation callback.
    pub reanticipated: u64,
    /// Snapped for lack of a callback.
    pub snapped: u64,
    /// Refused as out of order.
    pub rejected: u64,
}

impl ReconcileStats {
    fn record(&mut self, outcome: Option<ReconcileOutcome>) {
        self.updates += 1;
        match outcome {
            Some(ReconcileOutcome::Ignored) => self.ignored += 1,
            Some(ReconcileOutcome::Followed) => self.followed += 1,
            Some(ReconcileOutcome::Reanticipated) => self.reanticipated += 1,
            Some(ReconcileOutcome::Snapped) => self.snapped += 1,
            Some(ReconcileOutcome::Recorded | ReconcileOutcome::Authored) => {}
            None => self.rejected += 1,
        }
    }
}

/// Client side of the demo.
pub struct Predictor {
    clock: SimulationClock,
    local_now: Rc<Cell<Tick>>,
    values: Vec<AnticipatedValue<f32>>,
    value_e: AnticipatedValue<f32>,
    player: AnticipatedTransform,
    inputs: SharedLedger<PlayerInput>,
    script: Script,
    stats: ReconcileStats,
}

impl Predictor {
    /// Builds the predictor's values and wires their reconciliation.
    pub fn init(config: &Config) -> Result<Self, DemoError> {
        let clock = SimulationClock::new(config.simulation.tick_rate)?;
        let step = clock.step_duration();
        let settings = &config.anticipation;
        let local_now = Rc::new(Cell::new(Tick::ZERO));

        let values = ValueId::ALL
            .into_iter()
            .map(|id| {
                let value = AnticipatedValue::new(0.0f32)
                    .with_name(format!("{id:?}"))
                    .with_out_of_order(settings.out_of_order)
                    .on_authoritative_changed(log_authoritative_change);
                match id {
                    ValueId::A => value.with_policy(settings.stale_policy),
                    ValueId::B => value.with_policy(StalePolicy::Reanticipate),
                    ValueId::C | ValueId::D => value
                        .with_policy(StalePolicy::Reanticipate)
                        .on_reanticipate(smooth_to_authority(settings.smooth_time)),
                }
            })
            .collect();

        let value_e = AnticipatedValue::new(0.0f32)
            .with_name("E")
            .with_policy(StalePolicy::Reanticipate)
            .with_out_of_order(settings.out_of_order)
            .on_reanticipate(extrapolate_value_e(
                Rc::clone(&local_now),
                step,
                settings.smooth_time,
                config.demo.value_e_rate as f32,
            ));

        let inputs = SharedLedger::new(HistoryLedger::with_capacity(step, settings.history_capacity));
        let mut player = AnticipatedTransform::new(TransformState::default())
            .with_name("player")
            .with_policy(StalePolicy::Reanticipate)
            .with_out_of_order(settings.out_of_order);
        player.set_reanticipator(
            ReplayReanticipator::new(inputs.handle(), move_player).with_smoothing(SmoothingGate::new(
                settings.transform_smooth_time,
                settings.smooth_distance,
            )),
        );

        info!(tick_rate = config.simulation.tick_rate, "predictor initialized");
        Ok(Self {
            clock,
            local_now,
            values,
            value_e,
            player,
            inputs,
            script: Script::new(config.network.seed.wrapping_add(1), config.demo.ticks),
            stats: ReconcileStats::default(),
        })
    }

    /// Runs one simulation step.
    pub fn step(&mut self, upstream: &mut DemoChannel, downstream: &mut DemoChannel) -> Result<(), DemoError> {
        let now = self.clock.advance();
        self.local_now.set(now);
        let seconds = self.clock.seconds_between(Tick::ZERO, now);
        let dt = self.clock.step_duration();

        for message in downstream.receive(seconds) {
            match message {
                Message::AuthoritativeUpdate(update) => self.apply(update),
                Message::PredictionRequest(_) => debug!("predictor ignoring a prediction request"),
            }
        }

        let ScriptStep { input, slider } = self.script.step(self.clock.step_count());
        if let Some((id, value)) = slider {
            self.values[id.index()].anticipate(value, now);
            upstream.send(seconds, &Message::request(now, Request::SetValue { id, value }))?;
        }

        // Every step is recorded; only steps that change something are anticipated.
        self.inputs.add(now, input);
        if !input.is_idle() {
            let next = move_player(*self.player.latest(), &input, dt);
            self.player.anticipate(next, now);
        }
        upstream.send(seconds, &Message::request(now, Request::Move(input)))?;

        for value in &mut self.values {
            value.update(dt);
        }
        self.value_e.update(dt);
        self.player.update(dt);
        Ok(())
    }

    fn apply(&mut self, update: AuthoritativeUpdate<StateUpdate>) {
        let AuthoritativeUpdate { tick, value } = update;
        let result = match value {
            StateUpdate::Value { id, value } => self.values[id.index()].set_authoritative(value, tick),
            StateUpdate::ValueE(value) => self.value_e.set_authoritative(value, tick),
            StateUpdate::Player(state) => self.player.set_authoritative(state, tick),
        };
        self.stats.record(result.ok());
    }

    /// Drops every callback; the player's ledger handle goes with its
    /// reanticipator.
    pub fn teardown(&mut self) {
        for value in &mut self.values {
            value.teardown();
        }
        self.value_e.teardown();
        self.player.teardown();
        info!(
            ledger_consumers = self.inputs.consumer_count(),
            ledger_len = self.inputs.borrow().len(),
            "predictor torn down"
        );
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

    /// The player's input ledger.
    pub fn inputs(&self) -> &SharedLedger<PlayerInput> {
        &self.inputs
    }

    /// Reconciliation counters.
    pub fn stats(&self) -> ReconcileStats {
        self.stats
    }
}

fn log_authoritative_change(name: &str, previous: &f32, current: &f32) {
    info!(value = name, previous, current, "authoritative value changed");
}

/// Blends from the old prediction to the confirmed value.
fn smooth_to_authority(duration: f64) -> impl FnMut(&mut AnticipatedValue<f32>, &ReanticipateEvent<f32>) + 'static {
    move |value, event| {
        if event.previous_anticipated != event.authoritative {
            value.smooth(event.previous_anticipated, event.authoritative, duration);
        }
    }
}

/// Predicts where the continuously moving value is *now*, given a confirmed
/// sample from the past.
///
/// The confirmed sample is `now - authority_tick` steps old. Blending adds
/// `smooth_time` of lag of its own, so the target is pushed that much further
/// ahead; the displayed value then tracks the authority's current value.
fn extrapolate_value_e(
    local_now: Rc<Cell<Tick>>,
    step: f64,
    smooth_time: f64,
    rate: f32,
) -> impl FnMut(&mut AnticipatedValue<f32>, &ReanticipateEvent<f32>) + 'static {
    move |value, event| {
        let now = local_now.get();
        let seconds_behind = now.steps_since(event.authority_tick) * step + smooth_time;
        let target = (event.authoritative + rate * seconds_behind as f32).rem_euclid(VALUE_E_RANGE);
        value.anticipate(target, now);
        value.smooth_with(event.previous_anticipated, target, smooth_time, |from: &f32, to: &f32, t: f64| {
            wrapping_lerp(*from, *to, t, VALUE_E_RANGE)
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(previous: f32, authoritative: f32, authority_tick: u64) -> ReanticipateEvent<f32> {
        ReanticipateEvent {
            previous_anticipated: previous,
            previous_anticipation_tick: Tick::ZERO,
            authoritative,
            authority_tick: Tick::from(authority_tick),
        }
    }

    #[test]
    fn test_extrapolation_targets_present_value() {
        let now = Rc::new(Cell::new(Tick::from(12)));
        let mut reanticipate = extrapolate_value_e(Rc::clone(&now), 1.0 / 60.0, 0.0, 2.5);
        let mut value = AnticipatedValue::new(0.0f32);
        // 12 steps behind at 2.5/s is half a unit.
        reanticipate(&mut value, &event(1.0, 3.0, 0));
        assert!((value.read() - 3.5).abs() < 1e-5);
        assert_eq!(value.anticipation_tick(), Tick::from(12));
    }

    #[test]
    fn test_extrapolation_wraps_around_ring() {
        let now = Rc::new(Cell::new(Tick::from(60)));
        let mut reanticipate = extrapolate_value_e(now, 1.0 / 60.0, 0.25, 2.5);
        let mut value = AnticipatedValue::new(9.5f32);
        reanticipate(&mut value, &event(9.5, 9.0, 0));
        // 9.0 + 2.5 * 1.25 = 12.125, wrapped to 2.125.
        assert!((value.latest() - 2.125).abs() < 1e-4);
        value.update(0.125);
        // Halfway from 9.5 to 12.125 the short way round.
        assert!((value.read() - 0.8125).abs() < 1e-4, "got {}", value.read());
    }

    #[test]
    fn test_smooth_to_authority_skips_agreement() {
        let mut reanticipate = smooth_to_authority(0.25);
        let mut value = AnticipatedValue::new(4.0f32);
        reanticipate(&mut value, &event(4.0, 4.0, 1));
        assert!(!value.is_smoothing());
        reanticipate(&mut value, &event(4.0, 6.0, 2));
        assert!(value.is_smoothing());
        assert_eq!(*value.latest(), 6.0);
    }

    #[test]
    fn test_stats_count_rejections() {
        let mut stats = ReconcileStats::default();
        stats.record(Some(ReconcileOutcome::Snapped));
        stats.record(None);
        assert_eq!(stats.updates, 2);
        assert_eq!(stats.snapped, 1);
        assert_eq!(stats.rejected, 1);
    }
}
