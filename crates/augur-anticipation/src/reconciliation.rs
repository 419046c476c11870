//! Replay-based reconciliation.
//!
//! When the authority confirms a value for tick `T`, the prediction shown
//! locally already includes every input applied after `T`. The
//! [`ReplayReanticipator`] rebuilds it by rewinding to the confirmed value and
//! re-running those inputs through the same deterministic step function that
//! produced them, then smooths from the old prediction to the corrected one
//! unless the jump is large enough to be a teleport.

use std::fmt;

use tracing::{debug, warn};

use crate::clock::Tick;
use crate::history::{LedgerHandle, replay};
use crate::smoothing::{Distance, Interpolate, SmoothingGate};
use crate::value::{AnticipatedValue, ReanticipateEvent, Reanticipator};

/// Reanticipates by replaying a shared input ledger.
///
/// `step(state, &input, step_duration) -> state` must be the function used
/// for the original prediction, and must be deterministic.
pub struct ReplayReanticipator<I, F> {
    ledger: LedgerHandle<I>,
    step: F,
    gate: Option<SmoothingGate>,
}

impl<I, F> ReplayReanticipator<I, F> {
    /// Creates a reanticipator that snaps to the replayed value.
    pub fn new(ledger: LedgerHandle<I>, step: F) -> Self {
        Self {
            ledger,
            step,
            gate: None,
        }
    }

    /// Smooths corrections that pass `gate` instead of snapping.
    pub fn with_smoothing(mut self, gate: SmoothingGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Replaces the smoothing gate (e.g. after a config reload).
    pub fn set_smoothing(&mut self, gate: Option<SmoothingGate>) {
        self.gate = gate;
    }

    /// The consumer handle this reanticipator releases ledger entries through.
    pub fn ledger(&self) -> &LedgerHandle<I> {
        &self.ledger
    }
}

impl<I, F> ReplayReanticipator<I, F> {
    /// Replays buffered inputs after `authority_tick` on top of `baseline`.
    ///
    /// Returns `None` when inputs needed for the replay were already dropped
    /// from the ledger.
    pub fn replay_from<T>(&mut self, baseline: T, authority_tick: Tick) -> Option<T>
    where
        F: FnMut(T, &I, f64) -> T,
    {
        let ledger = self.ledger.borrow();
        if !ledger.can_replay_from(authority_tick) {
            return None;
        }
        Some(replay(baseline, &*ledger, authority_tick, &mut self.step))
    }
}

impl<T, I, F> Reanticipator<T> for ReplayReanticipator<I, F>
where
    T: Clone + PartialEq + Interpolate + Distance + 'static,
    F: FnMut(T, &I, f64) -> T,
{
    fn reanticipate(&mut self, value: &mut AnticipatedValue<T>, event: &ReanticipateEvent<T>) {
        let corrected = match self.replay_from(event.authoritative.clone(), event.authority_tick) {
            Some(corrected) => corrected,
            None => {
                warn!(
                    value = %value.name(),
                    authority_tick = %event.authority_tick,
                    evicted_through = ?self.ledger.borrow().evicted_through(),
                    "replay inputs already discarded, snapping to authoritative value"
                );
                event.authoritative.clone()
            }
        };

        let tick = event.previous_anticipation_tick.max(event.authority_tick);
        value.anticipate(corrected.clone(), tick);

        if let Some(gate) = self.gate
            && event.previous_anticipated != corrected
        {
            if gate.should_smooth(&event.previous_anticipated, &corrected) {
                value.smooth(event.previous_anticipated.clone(), corrected, gate.duration);
            } else {
                debug!(value = %value.name(), "correction exceeds smoothing distance, snapping");
            }
        }

        // Nothing before the confirmed tick can be replayed again.
        self.ledger.release_before(event.authority_tick);
    }
}

impl<I, F> fmt::Debug for ReplayReanticipator<I, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayReanticipator")
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::{HistoryLedger, SharedLedger};
    use crate::value::StalePolicy;

    const STEP: f64 = 1.0;

    fn add(state: f64, input: &f64, _dt: f64) -> f64 {
        state + input
    }

    fn predict(shared: &SharedLedger<f64>, value: &mut AnticipatedValue<f64>, tick: u64, input: f64) {
        shared.add(Tick::from(tick), input);
        let next = add(*value.latest(), &input, STEP);
        value.anticipate(next, Tick::from(tick));
    }

    #[test]
    fn test_replays_only_unconfirmed_inputs() {
        let shared = SharedLedger::new(HistoryLedger::new(STEP));
        let mut value = AnticipatedValue::new(0.0f64).with_policy(StalePolicy::Reanticipate);
        value.set_reanticipator(ReplayReanticipator::new(shared.handle(), add));

        for tick in 1..=3 {
            predict(&shared, &mut value, tick, 1.0);
        }
        assert_eq!(value.read(), 3.0);

        value.set_authoritative(0.0, Tick::from(2)).unwrap();
        assert_eq!(value.read(), 1.0);
        assert_eq!(value.anticipation_tick(), Tick::from(3));
    }

    #[test]
    fn test_confirmed_prefix_is_released() {
        let shared = SharedLedger::new(HistoryLedger::new(STEP));
        let mut value = AnticipatedValue::new(0.0f64).with_policy(StalePolicy::Reanticipate);
        value.set_reanticipator(ReplayReanticipator::new(shared.handle(), add));

        for tick in 1..=5 {
            predict(&shared, &mut value, tick, 1.0);
        }
        value.set_authoritative(3.0, Tick::from(3)).unwrap();

        // Entries before the confirmed tick are gone; the confirmed tick stays.
        let ticks: Vec<_> = shared.borrow().entries().map(|e| e.tick).collect();
        assert_eq!(ticks, vec![Tick::from(3), Tick::from(4), Tick::from(5)]);
        assert_eq!(value.read(), 5.0);
    }

    #[test]
    fn test_missing_inputs_snap_to_authority() {
        let shared = SharedLedger::new(HistoryLedger::new(STEP));
        let mut value = AnticipatedValue::new(0.0f64).with_policy(StalePolicy::Reanticipate);
        value.set_reanticipator(ReplayReanticipator::new(shared.handle(), add));

        for tick in 1..=5 {
            predict(&shared, &mut value, tick, 1.0);
        }
        // Caller bug: trimmed past what the authority has confirmed.
        shared.borrow_mut().remove_before(Tick::from(4));

        value.set_authoritative(10.0, Tick::from(2)).unwrap();
        assert_eq!(value.read(), 10.0);
    }

    #[test]
    fn test_small_correction_is_smoothed() {
        let shared = SharedLedger::new(HistoryLedger::new(STEP));
        let mut value = AnticipatedValue::new(0.0f64).with_policy(StalePolicy::Reanticipate);
        value.set_reanticipator(
            ReplayReanticipator::new(shared.handle(), add).with_smoothing(SmoothingGate::new(1.0, 5.0)),
        );
        for tick in 1..=3 {
            predict(&shared, &mut value, tick, 1.0);
        }

        // Replay reproduces the current prediction: nothing to blend.
        value.set_authoritative(2.0, Tick::from(2)).unwrap();
        assert!(!value.is_smoothing());
        assert_eq!(value.read(), 3.0);

        value.set_authoritative(4.0, Tick::from(3)).unwrap();
        assert!(value.is_smoothing());
        assert_eq!(value.read(), 3.0);
        assert_eq!(*value.latest(), 4.0);
        value.update(0.5);
        assert_eq!(value.read(), 3.5);
        value.update(0.5);
        assert_eq!(value.read(), 4.0);
        assert!(!value.is_smoothing());
    }

    #[test]
    fn test_large_correction_snaps() {
        let shared = SharedLedger::new(HistoryLedger::new(STEP));
        let mut value = AnticipatedValue::new(0.0f64).with_policy(StalePolicy::Reanticipate);
        value.set_reanticipator(
            ReplayReanticipator::new(shared.handle(), add).with_smoothing(SmoothingGate::new(1.0, 5.0)),
        );
        for tick in 1..=3 {
            predict(&shared, &mut value, tick, 1.0);
        }
        value.set_authoritative(100.0, Tick::from(2)).unwrap();
        assert!(!value.is_smoothing());
        assert_eq!(value.read(), 101.0);
    }
}
