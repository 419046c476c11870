//! Anticipated position, rotation and scale of one networked object.

use glam::{Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::clock::Tick;
use crate::smoothing::{Distance, Interpolate};
use crate::value::AnticipatedValue;

/// Position, rotation and scale of an object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TransformState {
    /// World-space position.
    pub position: Vec3,
    /// Orientation.
    pub rotation: Quat,
    /// Per-axis scale.
    pub scale: Vec3,
}

impl Default for TransformState {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl TransformState {
    /// A unit-scale transform at `position` facing `rotation`.
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }

    /// The local +X axis in world space. Movement input drives along it.
    pub fn right(&self) -> Vec3 {
        self.rotation * Vec3::X
    }
}

impl Interpolate for TransformState {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        Self {
            position: Vec3::interpolate(&from.position, &to.position, t),
            rotation: Quat::interpolate(&from.rotation, &to.rotation, t),
            scale: Vec3::interpolate(&from.scale, &to.scale, t),
        }
    }
}

/// Distance between transforms is the distance between their positions.
impl Distance for TransformState {
    fn distance_squared(&self, other: &Self) -> f64 {
        Distance::distance_squared(&self.position, &other.position)
    }
}

/// An [`AnticipatedValue`] holding a [`TransformState`].
pub type AnticipatedTransform = AnticipatedValue<TransformState>;

impl AnticipatedValue<TransformState> {
    /// Anticipates a new position, keeping rotation and scale.
    pub fn anticipate_move(&mut self, position: Vec3, tick: Tick) {
        let next = TransformState {
            position,
            ..*self.latest()
        };
        self.anticipate(next, tick);
    }

    /// Anticipates a new rotation, keeping position and scale.
    pub fn anticipate_rotate(&mut self, rotation: Quat, tick: Tick) {
        let next = TransformState {
            rotation,
            ..*self.latest()
        };
        self.anticipate(next, tick);
    }

    /// Anticipates a new scale, keeping position and rotation.
    pub fn anticipate_scale(&mut self, scale: Vec3, tick: Tick) {
        let next = TransformState {
            scale,
            ..*self.latest()
        };
        self.anticipate(next, tick);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Role;

    #[test]
    fn test_anticipate_move_keeps_rotation() {
        let rotation = Quat::from_rotation_y(1.0);
        let mut transform = AnticipatedTransform::new(TransformState::new(Vec3::ZERO, rotation));
        transform.anticipate_move(Vec3::new(1.0, 2.0, 3.0), Tick::from(1));
        let state = transform.read();
        assert_eq!(state.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(state.rotation, rotation);
        assert_eq!(state.scale, Vec3::ONE);
    }

    #[test]
    fn test_anticipate_from_smoothing_target() {
        let mut transform = AnticipatedTransform::new(TransformState::default());
        let target = TransformState::new(Vec3::new(2.0, 0.0, 0.0), Quat::IDENTITY);
        transform.smooth(TransformState::default(), target, 1.0);
        transform.anticipate_rotate(Quat::from_rotation_y(0.5), Tick::from(2));
        assert_eq!(transform.read().position, target.position);
    }

    #[test]
    fn test_authority_transform_queues_broadcast() {
        let mut transform = AnticipatedTransform::new(TransformState::default()).with_role(Role::Authority);
        transform.anticipate_scale(Vec3::splat(2.0), Tick::from(7));
        let update = transform.take_broadcast().unwrap();
        assert_eq!(update.tick, Tick::from(7));
        assert_eq!(update.value.scale, Vec3::splat(2.0));
        assert_eq!(transform.authoritative_read().scale, Vec3::splat(2.0));
    }

    #[test]
    fn test_interpolation_endpoints() {
        let a = TransformState::default();
        let b = TransformState {
            position: Vec3::new(4.0, 0.0, 0.0),
            rotation: Quat::from_rotation_y(1.0),
            scale: Vec3::splat(3.0),
        };
        let mid = TransformState::interpolate(&a, &b, 0.5);
        assert_eq!(mid.position, Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(mid.scale, Vec3::splat(2.0));
        assert_eq!(a.distance_squared(&b), 16.0);
    }

    #[test]
    fn test_transform_serializes_through_ron() {
        let state = TransformState::new(Vec3::new(1.0, 0.0, -2.0), Quat::IDENTITY);
        let text = ron::to_string(&state).unwrap();
        let back: TransformState = ron::from_str(&text).unwrap();
        assert_eq!(state, back);
    }
}
