//! Scripted user activity standing in for keyboard and slider input.
//!
//! The script repeats every [`CYCLE`] ticks: drive forward, turn, trigger
//! each kind of teleport, back up, and turn the other way. Every
//! [`SLIDER_INTERVAL`] ticks one of the sample values is dragged to a new
//! random position.

use rand::{Rng, SeedableRng};
use rand_xoshiro::Xoshiro256StarStar;

use crate::player::{PlayerInput, Teleport, TeleportKind};
use crate::protocol::ValueId;

/// Length of one script cycle in ticks.
pub const CYCLE: u64 = 480;

/// Ticks between slider changes.
pub const SLIDER_INTERVAL: u64 = 90;

/// What the user does on one tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ScriptStep {
    /// Player input for this tick.
    pub input: PlayerInput,
    /// Slider the user released this tick, and where.
    pub slider: Option<(ValueId, f32)>,
}

/// Deterministic source of user activity.
#[derive(Debug)]
pub struct Script {
    rng: Xoshiro256StarStar,
    active_ticks: u64,
}

impl Script {
    /// Creates a script that is active for `active_ticks` ticks and idle
    /// afterwards.
    pub fn new(seed: u64, active_ticks: u64) -> Self {
        Self {
            rng: Xoshiro256StarStar::seed_from_u64(seed),
            active_ticks,
        }
    }

    /// User activity at `tick`.
    pub fn step(&mut self, tick: u64) -> ScriptStep {
        if tick > self.active_ticks {
            return ScriptStep::default();
        }

        let phase = tick % CYCLE;
        let (forward, turn, teleport) = match phase {
            0..120 => (1.0, 0.0, None),
            120..150 => (1.0, 1.0, None),
            150..240 => (1.0, 0.0, None),
            240 => (0.0, 0.0, Some(TeleportKind::Random)),
            241..300 => (0.0, 0.0, None),
            300 => (0.0, 0.0, Some(TeleportKind::SmallRandom)),
            301..360 => (-1.0, 0.0, None),
            360 => (0.0, 0.0, Some(TeleportKind::Center)),
            _ => (0.0, -1.0, None),
        };
        let input = PlayerInput {
            forward,
            turn,
            teleport: teleport.map(|kind| Teleport::roll(kind, &mut self.rng)),
        };

        let slider = (tick % SLIDER_INTERVAL == SLIDER_INTERVAL / 2).then(|| {
            let id = ValueId::ALL[((tick / SLIDER_INTERVAL) % 4) as usize];
            (id, self.rng.gen_range(0.0..10.0))
        });

        ScriptStep { input, slider }
    }
}
