//! Client-side anticipation with authoritative reconciliation.
//!
//! A predicting party applies local changes to an [`AnticipatedValue`]
//! immediately, records the inputs that produced them in a
//! [`HistoryLedger`], and corrects the prediction when the authority
//! confirms a value for an earlier tick: by replaying the buffered inputs
//! on top of the confirmed baseline and smoothing the resulting jump.

pub mod clock;
pub mod error;
pub mod history;
pub mod reconciliation;
pub mod smoothing;
pub mod transform;
pub mod value;

pub use clock::{FixedStepper, SimulationClock, Tick};
pub use error::AnticipationError;
pub use history::{HistoryLedger, LedgerEntry, LedgerHandle, SharedLedger, replay};
pub use reconciliation::ReplayReanticipator;
pub use smoothing::{Distance, Interpolate, InterpolateFn, Smoothing, SmoothingGate, wrapping_lerp};
pub use transform::{AnticipatedTransform, TransformState};
pub use value::{
    AnticipatedValue, AuthoritativeUpdate, ChangeObserver, OutOfOrderPolicy, ReanticipateEvent,
    Reanticipator, ReconcileOutcome, Role, StalePolicy,
};
