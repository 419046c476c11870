//! Time-bounded interpolation that hides reconciliation jumps.
//!
//! A correction replaces the anticipated value instantly; smoothing instead
//! walks the displayed value from the old prediction to the new one over a
//! short window. Corrections larger than a configured distance are treated as
//! teleports and skip smoothing (see [`SmoothingGate`]).

use std::fmt;

use glam::{Quat, Vec2, Vec3};

/// Boxed interpolation function: `(from, to, t) -> value` with `t` in `[0, 1]`.
pub type InterpolateFn<T> = Box<dyn Fn(&T, &T, f64) -> T>;

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Types that can be blended between two values.
pub trait Interpolate: Sized {
    /// Value at fraction `t` of the way from `from` to `to`.
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self;
}

/// Types with a notion of how far apart two values are.
pub trait Distance {
    /// Squared distance between `self` and `other`.
    fn distance_squared(&self, other: &Self) -> f64;
}

impl Interpolate for f32 {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        from + (to - from) * t as f32
    }
}

impl Interpolate for f64 {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        from + (to - from) * t
    }
}

impl Interpolate for Vec2 {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        from.lerp(*to, t as f32)
    }
}

impl Interpolate for Vec3 {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        from.lerp(*to, t as f32)
    }
}

impl Interpolate for Quat {
    fn interpolate(from: &Self, to: &Self, t: f64) -> Self {
        from.slerp(*to, t as f32)
    }
}

impl Distance for f32 {
    fn distance_squared(&self, other: &Self) -> f64 {
        let d = f64::from(*self) - f64::from(*other);
        d * d
    }
}

impl Distance for f64 {
    fn distance_squared(&self, other: &Self) -> f64 {
        let d = self - other;
        d * d
    }
}

impl Distance for Vec2 {
    fn distance_squared(&self, other: &Self) -> f64 {
        f64::from(Vec2::distance_squared(*self, *other))
    }
}

impl Distance for Vec3 {
    fn distance_squared(&self, other: &Self) -> f64 {
        f64::from(Vec3::distance_squared(*self, *other))
    }
}

/// Linear interpolation on a ring `[0, modulus)`, taking the short way
/// around when the target has wrapped past the end.
pub fn wrapping_lerp(from: f32, to: f32, t: f64, modulus: f32) -> f32 {
    let mut to = to;
    if to - from < -modulus / 2.0 {
        to += modulus;
    } else if to - from > modulus / 2.0 {
        to -= modulus;
    }
    f32::interpolate(&from, &to, t).rem_euclid(modulus)
}

// ---------------------------------------------------------------------------
// Smoothing
// ---------------------------------------------------------------------------

/// An in-progress blend from `from` to `to` over `duration` seconds.
pub struct Smoothing<T> {
    from: T,
    to: T,
    duration: f64,
    elapsed: f64,
    interpolate: InterpolateFn<T>,
}

impl<T: Clone> Smoothing<T> {
    /// Starts a blend with a caller-supplied interpolation function.
    pub fn new(from: T, to: T, duration: f64, interpolate: InterpolateFn<T>) -> Self {
        Self {
            from,
            to,
            duration,
            elapsed: 0.0,
            interpolate,
        }
    }

    /// Advances the blend by `dt` seconds.
    pub fn advance(&mut self, dt: f64) {
        self.elapsed += dt.max(0.0);
    }

    /// Fraction of the blend completed, in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        if self.duration <= 0.0 {
            return 1.0;
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    /// Current blended value. Exactly `from` at the start and exactly `to`
    /// once the duration has elapsed.
    pub fn sample(&self) -> T {
        let progress = self.progress();
        if progress >= 1.0 {
            self.to.clone()
        } else if progress <= 0.0 {
            self.from.clone()
        } else {
            (self.interpolate)(&self.from, &self.to, progress)
        }
    }

    /// Returns `true` once the blend has reached its target.
    pub fn is_complete(&self) -> bool {
        self.progress() >= 1.0
    }

    /// The value the blend converges to.
    pub fn target(&self) -> &T {
        &self.to
    }

    /// The value the blend started from.
    pub fn origin(&self) -> &T {
        &self.from
    }
}

impl<T: fmt::Debug> fmt::Debug for Smoothing<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Smoothing")
            .field("from", &self.from)
            .field("to", &self.to)
            .field("duration", &self.duration)
            .field("elapsed", &self.elapsed)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// SmoothingGate
// ---------------------------------------------------------------------------

/// Decides whether a correction is smoothed or snapped.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SmoothingGate {
    /// Blend duration in seconds. Zero disables smoothing.
    pub duration: f64,
    /// Corrections farther than this are snapped.
    pub max_distance: f64,
}

impl SmoothingGate {
    /// Creates a gate.
    pub fn new(duration: f64, max_distance: f64) -> Self {
        Self {
            duration,
            max_distance,
        }
    }

    /// Returns `true` if moving from `from` to `to` should be smoothed.
    pub fn should_smooth<T: Distance>(&self, from: &T, to: &T) -> bool {
        self.duration > 0.0 && from.distance_squared(to) <= self.max_distance * self.max_distance
    }
}
