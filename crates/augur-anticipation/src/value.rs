//! [`AnticipatedValue`]: a locally predicted value paired with the last
//! value confirmed by the authority.
//!
//! The predicting side writes with [`anticipate`](AnticipatedValue::anticipate)
//! and reads with [`read`](AnticipatedValue::read). Confirmed updates arrive
//! through [`set_authoritative`](AnticipatedValue::set_authoritative), which
//! runs the staleness policy and, if asked to, hands control to a
//! [`Reanticipator`] that rebuilds the prediction.
//!
//! On the authority the same type is used with [`Role::Authority`]: there an
//! anticipation *is* the authoritative write, and it is queued for broadcast.

use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::clock::Tick;
use crate::error::AnticipationError;
use crate::smoothing::{Interpolate, InterpolateFn, Smoothing};

// ---------------------------------------------------------------------------
// Policies
// ---------------------------------------------------------------------------

/// What happens when a newer authoritative value arrives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum StalePolicy {
    /// Keep the local prediction. The anticipated value only follows the
    /// authority when no local prediction is outstanding.
    #[default]
    Ignore,
    /// Rebuild the prediction on every newer authoritative value, through
    /// the reanticipation callback or, without one, by snapping.
    Reanticipate,
}

/// What happens when an authoritative value arrives for a tick at or before
/// the last confirmed one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum OutOfOrderPolicy {
    /// Record it as-is. The authority tick may move backwards; no
    /// reanticipation runs.
    Accept,
    /// Refuse it with [`AnticipationError::OutOfOrder`].
    #[default]
    Reject,
}

/// Which side of the connection owns this value instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Role {
    /// Predicts locally and reconciles against confirmed updates.
    #[default]
    Predictor,
    /// Writes ground truth; every anticipation is authoritative.
    Authority,
}

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// Snapshot handed to a [`Reanticipator`].
#[derive(Debug, Clone, PartialEq)]
pub struct ReanticipateEvent<T> {
    /// Anticipated value just before the update was applied.
    pub previous_anticipated: T,
    /// Tick `previous_anticipated` was set at.
    pub previous_anticipation_tick: Tick,
    /// Newly confirmed value.
    pub authoritative: T,
    /// Tick the authority produced `authoritative` at.
    pub authority_tick: Tick,
}

/// Rebuilds the anticipated value after a newer authoritative value arrived.
///
/// Implementations typically replay buffered inputs on top of
/// `event.authoritative` and call [`AnticipatedValue::anticipate`], possibly
/// followed by [`AnticipatedValue::smooth`].
pub trait Reanticipator<T> {
    /// Called once per newer authoritative value under
    /// [`StalePolicy::Reanticipate`].
    fn reanticipate(&mut self, value: &mut AnticipatedValue<T>, event: &ReanticipateEvent<T>);
}

impl<T, F> Reanticipator<T> for F
where
    F: FnMut(&mut AnticipatedValue<T>, &ReanticipateEvent<T>),
{
    fn reanticipate(&mut self, value: &mut AnticipatedValue<T>, event: &ReanticipateEvent<T>) {
        self(value, event)
    }
}

/// Notified whenever the authoritative value changes.
pub trait ChangeObserver<T> {
    /// `name` is the value's label, `previous` and `current` the
    /// authoritative values before and after the change.
    fn authoritative_changed(&mut self, name: &str, previous: &T, current: &T);
}

impl<T, F> ChangeObserver<T> for F
where
    F: FnMut(&str, &T, &T),
{
    fn authoritative_changed(&mut self, name: &str, previous: &T, current: &T) {
        self(name, previous, current)
    }
}

// ---------------------------------------------------------------------------
// Outcomes
// ---------------------------------------------------------------------------

/// What [`AnticipatedValue::set_authoritative`] did with an update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconcileOutcome {
    /// Newer value recorded; the local prediction was kept.
    Ignored,
    /// Newer value recorded; no prediction was outstanding, so the
    /// anticipated value now equals it.
    Followed,
    /// The reanticipation callback rebuilt the prediction.
    Reanticipated,
    /// No callback was installed; the anticipated value snapped to the
    /// authoritative one.
    Snapped,
    /// Not newer than the last confirmation; recorded without reconciling.
    Recorded,
    /// The value is the authority; the update was written as ground truth.
    Authored,
}

/// A confirmed value ready to be broadcast by the authority.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthoritativeUpdate<T> {
    /// Tick the value was produced at.
    pub tick: Tick,
    /// The confirmed value.
    pub value: T,
}

// ---------------------------------------------------------------------------
// AnticipatedValue
// ---------------------------------------------------------------------------

/// A predicted value and its last authoritative confirmation.
pub struct AnticipatedValue<T> {
    name: String,
    anticipated: T,
    authoritative: T,
    anticipation_tick: Tick,
    authority_tick: Tick,
    confirmed: bool,
    outstanding: bool,
    stale_policy: StalePolicy,
    out_of_order: OutOfOrderPolicy,
    role: Role,
    smoothing: Option<Smoothing<T>>,
    pending_broadcast: Option<AuthoritativeUpdate<T>>,
    on_reanticipate: Option<Box<dyn Reanticipator<T>>>,
    on_authoritative_changed: Option<Box<dyn ChangeObserver<T>>>,
}

impl<T: Clone + PartialEq + 'static> AnticipatedValue<T> {
    /// Creates a predictor-side value where both sides start at `initial`.
    pub fn new(initial: T) -> Self {
        Self {
            name: String::new(),
            anticipated: initial.clone(),
            authoritative: initial,
            anticipation_tick: Tick::ZERO,
            authority_tick: Tick::ZERO,
            confirmed: false,
            outstanding: false,
            stale_policy: StalePolicy::default(),
            out_of_order: OutOfOrderPolicy::default(),
            role: Role::default(),
            smoothing: None,
            pending_broadcast: None,
            on_reanticipate: None,
            on_authoritative_changed: None,
        }
    }

    /// Labels the value for logging and change notifications.
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the staleness policy.
    pub fn with_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    /// Sets the out-of-order policy.
    pub fn with_out_of_order(mut self, policy: OutOfOrderPolicy) -> Self {
        self.out_of_order = policy;
        self
    }

    /// Sets which side owns the value.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    /// Installs a reanticipation closure.
    pub fn on_reanticipate<F>(mut self, f: F) -> Self
    where
        F: FnMut(&mut AnticipatedValue<T>, &ReanticipateEvent<T>) + 'static,
    {
        self.set_reanticipator(f);
        self
    }

    /// Installs a change-notification closure.
    pub fn on_authoritative_changed<F>(mut self, f: F) -> Self
    where
        F: FnMut(&str, &T, &T) + 'static,
    {
        self.set_change_observer(f);
        self
    }

    /// Installs or replaces the reanticipation callback.
    pub fn set_reanticipator(&mut self, reanticipator: impl Reanticipator<T> + 'static) {
        self.on_reanticipate = Some(Box::new(reanticipator));
    }

    /// Removes the reanticipation callback.
    pub fn clear_reanticipator(&mut self) {
        self.on_reanticipate = None;
    }

    /// Installs or replaces the change observer.
    pub fn set_change_observer(&mut self, observer: impl ChangeObserver<T> + 'static) {
        self.on_authoritative_changed = Some(Box::new(observer));
    }

    /// Changes the staleness policy.
    pub fn set_stale_policy(&mut self, policy: StalePolicy) {
        self.stale_policy = policy;
    }

    /// Drops callbacks, active smoothing and any unsent broadcast.
    pub fn teardown(&mut self) {
        self.on_reanticipate = None;
        self.on_authoritative_changed = None;
        self.smoothing = None;
        self.pending_broadcast = None;
    }

    // --- Reads ---

    /// The value to display: the prediction, including smoothing progress.
    pub fn read(&self) -> T {
        self.anticipated.clone()
    }

    /// Borrowing form of [`read`](Self::read).
    pub fn read_ref(&self) -> &T {
        &self.anticipated
    }

    /// The last confirmed value.
    pub fn authoritative_read(&self) -> T {
        self.authoritative.clone()
    }

    /// Borrowing form of [`authoritative_read`](Self::authoritative_read).
    pub fn authoritative_ref(&self) -> &T {
        &self.authoritative
    }

    /// The value the prediction is heading to: the smoothing target while a
    /// blend is active, the anticipated value otherwise.
    pub fn latest(&self) -> &T {
        self.smoothing
            .as_ref()
            .map_or(&self.anticipated, |smoothing| smoothing.target())
    }

    /// Tick the anticipated value was last set at.
    pub fn anticipation_tick(&self) -> Tick {
        self.anticipation_tick
    }

    /// Tick of the last confirmation.
    pub fn authority_tick(&self) -> Tick {
        self.authority_tick
    }

    /// The value's label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The staleness policy.
    pub fn stale_policy(&self) -> StalePolicy {
        self.stale_policy
    }

    /// The out-of-order policy.
    pub fn out_of_order_policy(&self) -> OutOfOrderPolicy {
        self.out_of_order
    }

    /// Which side owns the value.
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns `true` while a smoothing blend is running.
    pub fn is_smoothing(&self) -> bool {
        self.smoothing.is_some()
    }

    /// Returns `true` if the anticipated value came from a local
    /// anticipation rather than from following the authority.
    pub fn has_outstanding_prediction(&self) -> bool {
        self.outstanding
    }

    // --- Writes ---

    /// Overwrites the prediction.
    ///
    /// No validation against the authoritative side and no communication with
    /// the authority. Cancels any running smoothing. On an authority-role
    /// value this is also the authoritative write.
    pub fn anticipate(&mut self, value: T, tick: Tick) {
        self.smoothing = None;
        if self.role == Role::Authority {
            self.author(value, tick);
            return;
        }
        self.anticipated = value;
        self.anticipation_tick = tick;
        self.outstanding = true;
    }

    /// Records a confirmed value from the authority and applies the staleness
    /// policy.
    ///
    /// The authoritative side is always overwritten (unless the out-of-order
    /// policy refuses the update). The change observer fires before the
    /// policy runs and never changes the anticipated value.
    pub fn set_authoritative(
        &mut self,
        value: T,
        tick: Tick,
    ) -> Result<ReconcileOutcome, AnticipationError> {
        if !tick.as_f64().is_finite() {
            warn!(value = %self.name, received = %tick, "rejecting authoritative update with non-finite tick");
            return Err(AnticipationError::NonFiniteTick(tick));
        }
        if self.role == Role::Authority {
            self.anticipate(value, tick);
            return Ok(ReconcileOutcome::Authored);
        }

        let is_newer = !self.confirmed || tick > self.authority_tick;
        if !is_newer {
            match self.out_of_order {
                OutOfOrderPolicy::Reject => {
                    warn!(
                        value = %self.name,
                        received = %tick,
                        current = %self.authority_tick,
                        "rejecting out-of-order authoritative update"
                    );
                    return Err(AnticipationError::OutOfOrder {
                        received: tick,
                        current: self.authority_tick,
                    });
                }
                OutOfOrderPolicy::Accept => {
                    debug!(
                        value = %self.name,
                        received = %tick,
                        current = %self.authority_tick,
                        "recording out-of-order authoritative update"
                    );
                    self.record_authoritative(value, tick);
                    return Ok(ReconcileOutcome::Recorded);
                }
            }
        }

        let previous_anticipated = self.anticipated.clone();
        let previous_anticipation_tick = self.anticipation_tick;
        self.record_authoritative(value, tick);

        let outcome = match self.stale_policy {
            StalePolicy::Ignore => {
                if self.outstanding {
                    ReconcileOutcome::Ignored
                } else {
                    self.follow_authoritative();
                    ReconcileOutcome::Followed
                }
            }
            StalePolicy::Reanticipate => match self.on_reanticipate.take() {
                Some(mut reanticipator) => {
                    let event = ReanticipateEvent {
                        previous_anticipated,
                        previous_anticipation_tick,
                        authoritative: self.authoritative.clone(),
                        authority_tick: tick,
                    };
                    reanticipator.reanticipate(self, &event);
                    // The callback may have installed a replacement.
                    if self.on_reanticipate.is_none() {
                        self.on_reanticipate = Some(reanticipator);
                    }
                    ReconcileOutcome::Reanticipated
                }
                None => {
                    self.follow_authoritative();
                    ReconcileOutcome::Snapped
                }
            },
        };

        debug!(value = %self.name, %tick, ?outcome, "authoritative update applied");
        Ok(outcome)
    }

    /// Authority-side write: sets both sides at `tick` and queues the value
    /// for broadcast.
    pub fn author(&mut self, value: T, tick: Tick) {
        self.anticipated = value.clone();
        self.anticipation_tick = tick;
        self.record_authoritative(value.clone(), tick);
        self.pending_broadcast = Some(AuthoritativeUpdate { tick, value });
    }

    /// Takes the latest authored value that has not been broadcast yet.
    pub fn take_broadcast(&mut self) -> Option<AuthoritativeUpdate<T>> {
        self.pending_broadcast.take()
    }

    // --- Smoothing ---

    /// Blends the displayed value from `from` to `to` over `duration` seconds
    /// using the type's own interpolation.
    pub fn smooth(&mut self, from: T, to: T, duration: f64)
    where
        T: Interpolate,
    {
        self.smooth_with(from, to, duration, T::interpolate);
    }

    /// Blends the displayed value from `from` to `to` over `duration` seconds
    /// with a caller-supplied interpolation (e.g. one that wraps around).
    ///
    /// A non-positive or non-finite duration sets the value to `to`
    /// immediately.
    pub fn smooth_with<F>(&mut self, from: T, to: T, duration: f64, interpolate: F)
    where
        F: Fn(&T, &T, f64) -> T + 'static,
    {
        if !duration.is_finite() || duration <= 0.0 {
            self.smoothing = None;
            self.anticipated = to;
            return;
        }
        let interpolate: InterpolateFn<T> = Box::new(interpolate);
        self.anticipated = from.clone();
        self.smoothing = Some(Smoothing::new(from, to, duration, interpolate));
    }

    /// Advances any running blend by `dt` seconds. Call once per simulation
    /// step or render frame.
    pub fn update(&mut self, dt: f64) {
        let Some(smoothing) = self.smoothing.as_mut() else {
            return;
        };
        smoothing.advance(dt);
        self.anticipated = smoothing.sample();
        if smoothing.is_complete() {
            self.smoothing = None;
        }
    }

    // --- Internals ---

    fn record_authoritative(&mut self, value: T, tick: Tick) {
        let previous = std::mem::replace(&mut self.authoritative, value);
        self.authority_tick = tick;
        self.confirmed = true;
        if previous != self.authoritative
            && let Some(observer) = self.on_authoritative_changed.as_mut()
        {
            observer.authoritative_changed(&self.name, &previous, &self.authoritative);
        }
    }

    fn follow_authoritative(&mut self) {
        self.smoothing = None;
        self.anticipated = self.authoritative.clone();
        self.anticipation_tick = self.authority_tick;
        self.outstanding = false;
    }
}

impl<T: fmt::Debug> fmt::Debug for AnticipatedValue<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnticipatedValue")
            .field("name", &self.name)
            .field("anticipated", &self.anticipated)
            .field("authoritative", &self.authoritative)
            .field("anticipation_tick", &self.anticipation_tick)
            .field("authority_tick", &self.authority_tick)
            .field("outstanding", &self.outstanding)
            .field("stale_policy", &self.stale_policy)
            .field("role", &self.role)
            .field("smoothing", &self.smoothing)
            .finish_non_exhaustive()
    }
}
