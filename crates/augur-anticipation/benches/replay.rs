use augur_anticipation::*;
use criterion::{Criterion, black_box, criterion_group, criterion_main};
use glam::{Quat, Vec3};

const STEP: f64 = 1.0 / 60.0;

fn step(state: TransformState, input: &(f32, f32), dt: f64) -> TransformState {
    let dt = dt as f32;
    let (forward, turn) = *input;
    TransformState {
        position: state.position + state.right() * (forward * 4.0 * dt),
        rotation: state.rotation * Quat::from_rotation_y(turn * std::f32::consts::PI * dt),
        ..state
    }
}

fn filled_ledger(len: u64) -> HistoryLedger<(f32, f32)> {
    let mut ledger = HistoryLedger::new(STEP);
    for tick in 0..len {
        ledger.add(Tick::from(tick), (1.0, if tick % 2 == 0 { 0.5 } else { -0.5 }));
    }
    ledger
}

fn bench_replay_one_second(c: &mut Criterion) {
    let ledger = filled_ledger(60);
    let baseline = TransformState::new(Vec3::ZERO, Quat::IDENTITY);
    c.bench_function("replay_60_steps", |bencher| {
        bencher.iter(|| black_box(replay(black_box(baseline), &ledger, Tick::ZERO, step)))
    });
}

fn bench_replay_partial(c: &mut Criterion) {
    let ledger = filled_ledger(600);
    let baseline = TransformState::default();
    c.bench_function("replay_last_12_of_600", |bencher| {
        bencher.iter(|| black_box(replay(black_box(baseline), &ledger, Tick::from(587), step)))
    });
}

fn bench_reconcile_with_shared_ledger(c: &mut Criterion) {
    c.bench_function("reconcile_transform", |bencher| {
        bencher.iter(|| {
            let shared = SharedLedger::new(HistoryLedger::new(STEP));
            let mut player = AnticipatedTransform::new(TransformState::default())
                .with_policy(StalePolicy::Reanticipate);
            player.set_reanticipator(
                ReplayReanticipator::new(shared.handle(), step).with_smoothing(SmoothingGate::new(0.1, 2.0)),
            );
            for tick in 1..=12u64 {
                let input = (1.0, 0.0);
                shared.add(Tick::from(tick), input);
                let next = step(*player.latest(), &input, STEP);
                player.anticipate(next, Tick::from(tick));
            }
            let _ = player.set_authoritative(TransformState::default(), Tick::from(6));
            black_box(player.read())
        })
    });
}

criterion_group!(
    benches,
    bench_replay_one_second,
    bench_replay_partial,
    bench_reconcile_with_shared_ledger,
);
criterion_main!(benches);
