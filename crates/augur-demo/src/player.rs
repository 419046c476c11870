//! Player movement: the deterministic step both sides run on the same input.

use augur_anticipation::TransformState;
use glam::{Quat, Vec3};
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Movement speed along the player's local +X axis, units per second.
pub const MOVE_SPEED: f32 = 4.0;

/// Turn rate in radians per second (180 degrees).
pub const TURN_RATE: f32 = std::f32::consts::PI;

/// Kinds of teleport the user can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TeleportKind {
    /// Anywhere in the play area. The authority picks its own destination.
    Random,
    /// Near the origin. The authority picks its own, slightly different, destination.
    SmallRandom,
    /// Back to the origin facing +Z. Both sides agree.
    Center,
}

/// A teleport and the destination it lands on.
///
/// The predictor fills in the destination it guessed, so replaying the input
/// later lands on the same spot. The authority overwrites random destinations
/// with its own roll before applying the input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Teleport {
    /// What was requested.
    pub kind: TeleportKind,
    /// Where it lands.
    pub position: Vec3,
    /// Horizontal direction to face afterwards.
    pub facing: Vec3,
}

impl Teleport {
    /// Rolls a destination for `kind`.
    pub fn roll(kind: TeleportKind, rng: &mut impl Rng) -> Self {
        let (position, facing) = match kind {
            TeleportKind::Random => (
                Vec3::new(rng.gen_range(-5.0..5.0), 0.0, rng.gen_range(-10.0..10.0)),
                Vec3::new(rng.gen_range(-5.0..5.0), 0.0, rng.gen_range(-10.0..10.0)),
            ),
            TeleportKind::SmallRandom => (
                Vec3::new(rng.gen_range(-0.5..0.5), 0.0, rng.gen_range(-0.5..0.5)),
                Vec3::new(rng.gen_range(-0.5..0.5), 0.0, 1.0),
            ),
            TeleportKind::Center => (Vec3::ZERO, Vec3::Z),
        };
        Self {
            kind,
            position,
            facing,
        }
    }
}

/// One step of player input.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PlayerInput {
    /// -1 (back), 0 or 1 (forward).
    pub forward: f32,
    /// -1 (left), 0 or 1 (right).
    pub turn: f32,
    /// Teleport requested this step, if any.
    pub teleport: Option<Teleport>,
}

impl PlayerInput {
    /// Returns `true` if the input does nothing.
    pub fn is_idle(&self) -> bool {
        self.forward == 0.0 && self.turn == 0.0 && self.teleport.is_none()
    }
}

/// Rotation about +Y that faces `direction` (projected onto the XZ plane).
pub fn look_rotation(direction: Vec3) -> Quat {
    if direction.x == 0.0 && direction.z == 0.0 {
        return Quat::IDENTITY;
    }
    Quat::from_rotation_y(direction.x.atan2(direction.z))
}

/// Applies one step of `input` lasting `dt` seconds.
///
/// Moves along the facing at the start of the step, then turns, then
/// teleports, so the same input always produces the same result. Idle input
/// returns `state` bit for bit.
pub fn move_player(state: TransformState, input: &PlayerInput, dt: f64) -> TransformState {
    if input.is_idle() {
        return state;
    }
    let dt = dt as f32;
    let mut next = state;
    next.position += state.right() * (input.forward * MOVE_SPEED * dt);
    next.rotation = (state.rotation * Quat::from_rotation_y(-input.turn * TURN_RATE * dt)).normalize();

    if let Some(teleport) = input.teleport {
        next.position = teleport.position;
        next.rotation = look_rotation(teleport.facing);
    }
    next
}
