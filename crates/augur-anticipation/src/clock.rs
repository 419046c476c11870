//! Simulation time: tick identifiers, the fixed-step clock, and the
//! accumulator that turns variable frame times into fixed steps.
//!
//! Predictor and authority each run their own clock at the same fixed
//! rate. Ticks are what anticipated values and ledger entries are keyed by;
//! the step duration is what replay feeds back into domain functions.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AnticipationError;

/// Default simulation rate shared by predictor and authority.
pub const DEFAULT_TICK_RATE: u32 = 60;

/// Default clamp on a single frame's elapsed time, in seconds.
pub const DEFAULT_MAX_FRAME_TIME: f64 = 0.25;

// ---------------------------------------------------------------------------
// Tick
// ---------------------------------------------------------------------------

/// A simulation step identifier.
///
/// Whole values are discrete steps; a fractional part addresses a point
/// between two steps (render interpolation, sub-step timestamps).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tick(f64);

impl Tick {
    /// The first tick of every simulation.
    pub const ZERO: Tick = Tick(0.0);

    /// Creates a tick from a raw (possibly fractional) step count.
    pub const fn new(value: f64) -> Self {
        Self(value)
    }

    /// Returns the raw step count.
    pub const fn as_f64(self) -> f64 {
        self.0
    }

    /// Number of steps from `earlier` to `self` (negative if `self` is older).
    pub fn steps_since(self, earlier: Tick) -> f64 {
        self.0 - earlier.0
    }

    /// Returns the later of two ticks.
    pub fn max(self, other: Tick) -> Tick {
        if other.0 > self.0 { other } else { self }
    }
}

impl From<u64> for Tick {
    fn from(step: u64) -> Self {
        Self(step as f64)
    }
}

impl fmt::Display for Tick {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// SimulationClock
// ---------------------------------------------------------------------------

/// Monotonic fixed-step clock for one participant.
#[derive(Debug, Clone)]
pub struct SimulationClock {
    tick: u64,
    step_duration: f64,
}

impl SimulationClock {
    /// Creates a clock running at `tick_rate` steps per second.
    pub fn new(tick_rate: u32) -> Result<Self, AnticipationError> {
        if tick_rate == 0 {
            return Err(AnticipationError::InvalidTickRate(tick_rate));
        }
        Ok(Self {
            tick: 0,
            step_duration: 1.0 / f64::from(tick_rate),
        })
    }

    /// Creates a clock with an explicit step duration in seconds.
    pub fn with_step_duration(step_duration: f64) -> Result<Self, AnticipationError> {
        if !step_duration.is_finite() || step_duration <= 0.0 {
            return Err(AnticipationError::InvalidStepDuration(step_duration));
        }
        Ok(Self {
            tick: 0,
            step_duration,
        })
    }

    /// Advances by one step and returns the new current tick.
    pub fn advance(&mut self) -> Tick {
        self.tick = self.tick.saturating_add(1);
        self.now()
    }

    /// The current tick.
    pub fn now(&self) -> Tick {
        Tick::from(self.tick)
    }

    /// The current tick offset by an interpolation fraction in `[0, 1)`.
    pub fn now_with_alpha(&self, alpha: f64) -> Tick {
        Tick::new(self.tick as f64 + alpha.clamp(0.0, 1.0))
    }

    /// Whole steps taken since the clock started.
    pub fn step_count(&self) -> u64 {
        self.tick
    }

    /// Duration of one step in seconds.
    pub fn step_duration(&self) -> f64 {
        self.step_duration
    }

    /// Seconds of simulated time between two ticks.
    pub fn seconds_between(&self, earlier: Tick, later: Tick) -> f64 {
        later.steps_since(earlier) * self.step_duration
    }

    /// Seconds the given authority tick lags behind the local clock.
    pub fn seconds_behind(&self, authority_tick: Tick) -> f64 {
        self.seconds_between(authority_tick, self.now())
    }
}

// ---------------------------------------------------------------------------
// FixedStepper
// ---------------------------------------------------------------------------

/// Accumulator that converts variable frame times into whole fixed steps.
///
/// Frame times are passed in explicitly so that a headless loop (or a test)
/// drives it deterministically.
#[derive(Debug, Clone)]
pub struct FixedStepper {
    step_duration: f64,
    max_frame_time: f64,
    accumulator: f64,
    total_steps: u64,
}

impl FixedStepper {
    /// Creates a stepper emitting steps of `step_duration` seconds. Frames
    /// longer than `max_frame_time` are clamped.
    pub fn new(step_duration: f64, max_frame_time: f64) -> Result<Self, AnticipationError> {
        if !step_duration.is_finite() || step_duration <= 0.0 {
            return Err(AnticipationError::InvalidStepDuration(step_duration));
        }
        if !max_frame_time.is_finite() || max_frame_time <= 0.0 {
            return Err(AnticipationError::InvalidMaxFrameTime(max_frame_time));
        }
        Ok(Self {
            step_duration,
            max_frame_time,
            accumulator: 0.0,
            total_steps: 0,
        })
    }

    /// Feeds one frame's elapsed time and returns how many fixed steps to run.
    pub fn advance(&mut self, frame_time: f64) -> u32 {
        let mut frame_time = frame_time.max(0.0);
        if frame_time > self.max_frame_time {
            warn!(
                "Frame time {:.1}ms exceeds maximum, clamping to {:.1}ms",
                frame_time * 1000.0,
                self.max_frame_time * 1000.0
            );
            frame_time = self.max_frame_time;
        }

        self.accumulator += frame_time;
        let mut steps = 0;
        while self.accumulator >= self.step_duration {
            self.accumulator -= self.step_duration;
            steps += 1;
        }
        self.total_steps += u64::from(steps);
        steps
    }

    /// Fraction of a step left in the accumulator, in `[0, 1)`.
    pub fn alpha(&self) -> f64 {
        if self.accumulator > 0.0 {
            self.accumulator / self.step_duration
        } else {
            0.0
        }
    }

    /// Total steps emitted so far.
    pub fn total_steps(&self) -> u64 {
        self.total_steps
    }
}
