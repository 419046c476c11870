//! Error types for the anticipation core.

use crate::clock::Tick;

/// Errors surfaced by [`AnticipatedValue`](crate::AnticipatedValue) and the
/// simulation clock.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnticipationError {
    /// An authoritative update arrived for a tick at or before the last
    /// confirmed tick while the value rejects out-of-order delivery.
    #[error("out-of-order authoritative update: tick {received} <= confirmed tick {current}")]
    OutOfOrder {
        /// Tick carried by the rejected update.
        received: Tick,
        /// Last confirmed authority tick.
        current: Tick,
    },

    /// A simulation clock was configured with a zero tick rate.
    #[error("invalid tick rate: {0} Hz")]
    InvalidTickRate(u32),

    /// A simulation clock was configured with a non-positive or non-finite step.
    #[error("invalid step duration: {0} s")]
    InvalidStepDuration(f64),

    /// A fixed stepper was configured with a non-positive or non-finite
    /// frame-time clamp.
    #[error("invalid maximum frame time: {0} s")]
    InvalidMaxFrameTime(f64),

    /// An authoritative update carried a NaN or infinite tick.
    #[error("non-finite authority tick: {0}")]
    NonFiniteTick(Tick),
}
