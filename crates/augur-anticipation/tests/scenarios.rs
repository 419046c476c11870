//! End-to-end reconciliation scenarios: a predictor applying local input,
//! an authority confirming it some ticks later, and the predicted value
//! converging back onto the authoritative timeline.

use std::cell::RefCell;
use std::rc::Rc;

use augur_anticipation::{
    AnticipatedTransform, AnticipatedValue, HistoryLedger, ReanticipateEvent, ReconcileOutcome,
    ReplayReanticipator, SharedLedger, SimulationClock, SmoothingGate, StalePolicy, Tick,
    TransformState, replay,
};
use glam::{Quat, Vec3};

const STEP: f64 = 1.0 / 60.0;

fn t(tick: u64) -> Tick {
    Tick::from(tick)
}

/// One frame of player input.
#[derive(Debug, Clone, Copy)]
struct MoveInput {
    forward: f32,
    turn: f32,
}

/// Deterministic player movement: 4 units/s along local +X, 180 deg/s turn.
fn move_player(state: TransformState, input: &MoveInput, dt: f64) -> TransformState {
    if input.forward == 0.0 && input.turn == 0.0 {
        return state;
    }
    let dt = dt as f32;
    let rotation = state.rotation * Quat::from_rotation_y(input.turn * std::f32::consts::PI * dt);
    let position = state.position + state.right() * (input.forward * 4.0 * dt);
    TransformState {
        position,
        rotation,
        ..state
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn test_agreement_is_idempotent() {
    for policy in [StalePolicy::Ignore, StalePolicy::Reanticipate] {
        let mut value = AnticipatedValue::new(0.0f32).with_policy(policy);
        value.set_authoritative(4.0, t(3)).unwrap();
        let before = (value.read(), value.authoritative_read());

        value.set_authoritative(4.0, t(4)).unwrap();
        assert_eq!((value.read(), value.authoritative_read()), before);
        assert!(!value.is_smoothing());
    }
}

#[test]
fn test_agreement_is_idempotent_through_reanticipation() {
    // A blending callback has nothing to blend when the values agree.
    let mut value = AnticipatedValue::new(0.0f32)
        .with_policy(StalePolicy::Reanticipate)
        .on_reanticipate(|value: &mut AnticipatedValue<f32>, event: &ReanticipateEvent<f32>| {
            if event.previous_anticipated != event.authoritative {
                value.smooth(event.previous_anticipated, event.authoritative, 0.25);
            }
        });
    value.set_authoritative(4.0, t(3)).unwrap();
    value.update(1.0);
    value.set_authoritative(4.0, t(4)).unwrap();
    assert_eq!(value.read(), 4.0);
    assert!(!value.is_smoothing());

    // Replay over buffered inputs that leave the state where it is.
    let state = TransformState::new(Vec3::new(2.0, 0.0, -1.0), Quat::from_rotation_y(0.8));
    let shared = SharedLedger::new(HistoryLedger::new(STEP));
    let mut player = AnticipatedTransform::new(state).with_policy(StalePolicy::Reanticipate);
    player.set_reanticipator(
        ReplayReanticipator::new(shared.handle(), move_player).with_smoothing(SmoothingGate::new(0.1, 2.0)),
    );
    player.set_authoritative(state, t(3)).unwrap();
    for tick in 4..=8u64 {
        shared.add(
            t(tick),
            MoveInput {
                forward: 0.0,
                turn: 0.0,
            },
        );
    }
    let outcome = player.set_authoritative(state, t(5)).unwrap();
    assert_eq!(outcome, ReconcileOutcome::Reanticipated);
    assert_eq!(player.read(), state);
    assert!(!player.is_smoothing());
    assert_eq!(shared.borrow().entries_after(t(5)).count(), 3);
}

#[test]
fn test_replay_is_bit_identical() {
    let mut ledger = HistoryLedger::new(STEP);
    for tick in 1..=90u64 {
        let input = MoveInput {
            forward: if tick % 3 == 0 { 0.0 } else { 1.0 },
            turn: if tick % 7 < 3 { -1.0 } else { 0.5 },
        };
        ledger.add(t(tick), input);
    }
    let baseline = TransformState::new(Vec3::new(1.5, 0.0, -2.0), Quat::IDENTITY);

    let first = replay(baseline, &ledger, t(10), move_player);
    let second = replay(baseline, &ledger, t(10), move_player);
    assert_eq!(first.position.to_array().map(f32::to_bits), second.position.to_array().map(f32::to_bits));
    assert_eq!(first.rotation.to_array().map(f32::to_bits), second.rotation.to_array().map(f32::to_bits));
}

#[test]
fn test_trim_keeps_only_requested_range() {
    let mut ledger = HistoryLedger::new(STEP);
    for tick in 0..20u64 {
        ledger.add(t(tick), tick);
    }
    ledger.remove_before(t(5));
    assert!(ledger.entries().all(|entry| entry.tick >= t(5)));
    ledger.remove_after(t(12));
    assert!(ledger.entries().all(|entry| entry.tick <= t(12)));
    assert_eq!(ledger.len(), 8);
}

#[test]
fn test_smoothing_reaches_endpoints() {
    let mut value = AnticipatedValue::new(0.0f64);
    value.smooth(2.0, 9.0, 0.25);
    assert_eq!(value.read(), 2.0);
    for _ in 0..6 {
        value.update(0.05);
    }
    assert_eq!(value.read(), 9.0);
    assert!(!value.is_smoothing());
}

#[test]
fn test_authority_tick_is_monotonic_for_ordered_delivery() {
    let mut value = AnticipatedValue::new(0i32).with_policy(StalePolicy::Reanticipate);
    let mut last = Tick::ZERO;
    for tick in [1u64, 2, 2, 5, 9, 9, 14] {
        // Duplicates are refused, so the tick never moves back.
        let result = value.set_authoritative(tick as i32, t(tick));
        if t(tick) == last {
            assert!(result.is_err(), "duplicate tick {tick} accepted");
        } else {
            assert!(result.is_ok(), "tick {tick} refused: {result:?}");
        }
        assert!(value.authority_tick() >= last);
        last = value.authority_tick();
    }
    assert_eq!(last, t(14));
}

// ---------------------------------------------------------------------------
// Sample scenarios
// ---------------------------------------------------------------------------

#[test]
fn test_snap_with_correct_anticipation() {
    let mut value = AnticipatedValue::new(0.0f32).with_name("A");
    value.anticipate(5.0, t(10));
    assert_eq!(value.read(), 5.0);

    let outcome = value.set_authoritative(5.0, t(12)).unwrap();
    assert_eq!(outcome, ReconcileOutcome::Ignored);
    assert_eq!(value.read(), 5.0);
    assert_eq!(value.authoritative_read(), 5.0);
}

#[test]
fn test_snap_with_incorrect_anticipation() {
    let mut value = AnticipatedValue::new(0.0f32).with_name("B");
    value.anticipate(5.0, t(10));
    value.set_authoritative(7.3, t(12)).unwrap();
    assert_eq!(value.read(), 5.0);
    assert_eq!(value.authoritative_read(), 7.3);

    // Stays wrong until the next local anticipation.
    value.set_authoritative(7.3, t(13)).unwrap();
    assert_eq!(value.read(), 5.0);
    value.anticipate(1.0, t(14));
    assert_eq!(value.read(), 1.0);
}

#[test]
fn test_reanticipate_replays_unconfirmed_input() {
    let shared = SharedLedger::new(HistoryLedger::new(STEP));
    let mut value = AnticipatedValue::new(0i32).with_policy(StalePolicy::Reanticipate);
    value.set_reanticipator(ReplayReanticipator::new(shared.handle(), |state: i32, delta: &i32, _dt: f64| state + delta));

    for tick in 1..=3u64 {
        shared.add(t(tick), 1);
        let next = value.read() + 1;
        value.anticipate(next, t(tick));
    }
    assert_eq!(value.read(), 3);

    // The authority saw 0 at tick 2, so only tick 3's input is replayed.
    let outcome = value.set_authoritative(0, t(2)).unwrap();
    assert_eq!(outcome, ReconcileOutcome::Reanticipated);
    assert_eq!(value.read(), 1);
}

#[test]
fn test_continuous_extrapolation_tracks_authority() {
    const RATE: f64 = 2.5;
    const LATENCY_TICKS: u64 = 6;

    let clock = Rc::new(RefCell::new(SimulationClock::new(60).unwrap()));
    let local = Rc::clone(&clock);
    let mut value = AnticipatedValue::new(0.0f64)
        .with_name("E")
        .with_policy(StalePolicy::Reanticipate)
        .on_reanticipate(move |v: &mut AnticipatedValue<f64>, e: &ReanticipateEvent<f64>| {
            let clock = local.borrow();
            let extrapolated = e.authoritative + RATE * clock.seconds_behind(e.authority_tick);
            v.anticipate(extrapolated, clock.now());
        });

    let mut in_flight = Vec::new();
    let mut authority_value = 0.0f64;
    for tick in 1..=240u64 {
        let now = clock.borrow_mut().advance();
        authority_value += RATE * STEP;
        in_flight.push((now, authority_value));

        if tick > LATENCY_TICKS {
            let (sent_at, sent_value) = in_flight.remove(0);
            value.set_authoritative(sent_value, sent_at).unwrap();
            let ground_truth = RATE * tick as f64 * STEP;
            assert!(
                (value.read() - ground_truth).abs() < 1e-9,
                "tick {tick}: {} vs {ground_truth}",
                value.read()
            );
        }
    }
}

// ---------------------------------------------------------------------------
// Shared ledger and transform reconciliation
// ---------------------------------------------------------------------------

#[test]
fn test_shared_ledger_waits_for_slowest_value() {
    let shared = SharedLedger::new(HistoryLedger::new(1.0));
    let add = |state: f64, input: &f64, _dt: f64| state + input;

    let mut fast = AnticipatedValue::new(0.0f64).with_policy(StalePolicy::Reanticipate);
    let mut slow = AnticipatedValue::new(0.0f64).with_policy(StalePolicy::Reanticipate);
    fast.set_reanticipator(ReplayReanticipator::new(shared.handle(), add));
    slow.set_reanticipator(ReplayReanticipator::new(shared.handle(), add));

    for tick in 1..=6u64 {
        shared.add(t(tick), 1.0);
        fast.anticipate(tick as f64, t(tick));
        slow.anticipate(tick as f64, t(tick));
    }

    fast.set_authoritative(5.0, t(5)).unwrap();
    assert_eq!(shared.borrow().len(), 6, "slow value has not confirmed anything yet");

    slow.set_authoritative(2.0, t(2)).unwrap();
    assert_eq!(slow.read(), 6.0);
    assert_eq!(shared.borrow().entries().next().map(|e| e.tick), Some(t(2)));

    drop(slow);
    assert_eq!(shared.borrow().entries().next().map(|e| e.tick), Some(t(5)));
}

#[test]
fn test_transform_gate_smooths_small_and_snaps_large() {
    let shared = SharedLedger::new(HistoryLedger::new(STEP));
    let mut player = AnticipatedTransform::new(TransformState::default())
        .with_name("player")
        .with_policy(StalePolicy::Reanticipate);
    player.set_reanticipator(
        ReplayReanticipator::new(shared.handle(), move_player).with_smoothing(SmoothingGate::new(0.1, 1.0)),
    );

    let input = MoveInput {
        forward: 1.0,
        turn: 0.0,
    };
    for tick in 1..=10u64 {
        shared.add(t(tick), input);
        let next = move_player(*player.latest(), &input, STEP);
        player.anticipate(next, t(tick));
    }
    let predicted = player.read().position;

    // Authority was nudged slightly off: the correction is blended.
    let mut nudged = move_player(TransformState::default(), &input, STEP);
    nudged.position.z += 0.2;
    player.set_authoritative(nudged, t(1)).unwrap();
    assert!(player.is_smoothing());
    assert_eq!(player.read().position, predicted);
    player.update(0.1);
    assert!(!player.is_smoothing());
    assert!((player.read().position.z - 0.2).abs() < 1e-5);

    // Authority teleported the player: snap straight to the replayed result.
    let mut teleported = *player.authoritative_ref();
    teleported.position = Vec3::new(50.0, 0.0, 50.0);
    player.set_authoritative(teleported, t(2)).unwrap();
    assert!(!player.is_smoothing());
    assert!(player.read().position.distance(Vec3::new(50.0, 0.0, 50.0)) < 1.0);
}
