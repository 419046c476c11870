//! Time-indexed history of local inputs, kept for replay.
//!
//! The predicting side appends one entry per simulation step. When the
//! authority confirms a value for tick `T`, everything recorded after `T` is
//! replayed on top of the confirmed baseline ([`replay`]) and everything
//! before `T` can be forgotten.
//!
//! A single input stream usually drives several anticipated values (the
//! position and rotation of one actor). [`SharedLedger`] makes that sharing
//! explicit: every consumer holds a [`LedgerHandle`] and the ledger is only
//! trimmed up to the oldest point any live consumer still needs.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::{BTreeMap, VecDeque};
use std::rc::Rc;

use tracing::{trace, warn};

use crate::clock::Tick;

// ---------------------------------------------------------------------------
// LedgerEntry
// ---------------------------------------------------------------------------

/// One recorded step: when it happened, what was applied, and the step
/// duration it was applied with.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerEntry<I> {
    /// Tick the item was recorded at.
    pub tick: Tick,
    /// The recorded item (typically one step of input).
    pub item: I,
    /// Step duration in seconds the item was originally simulated with.
    pub step_duration: f64,
}

// ---------------------------------------------------------------------------
// HistoryLedger
// ---------------------------------------------------------------------------

/// Append-only, tick-ordered log of items.
///
/// Entries must be added in non-decreasing tick order. This is not
/// enforced: out-of-order adds are stored as given and replayed in the order
/// they were added.
#[derive(Debug, Clone)]
pub struct HistoryLedger<I> {
    entries: VecDeque<LedgerEntry<I>>,
    step_duration: f64,
    capacity: Option<usize>,
    evicted_through: Option<Tick>,
}

impl<I> HistoryLedger<I> {
    /// Creates an unbounded ledger recording `step_duration` for every
    /// [`add`](Self::add).
    pub fn new(step_duration: f64) -> Self {
        Self {
            entries: VecDeque::new(),
            step_duration,
            capacity: None,
            evicted_through: None,
        }
    }

    /// Creates a ledger that evicts its oldest entry once `capacity` entries
    /// are stored. A capacity of zero means unbounded.
    pub fn with_capacity(step_duration: f64, capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            step_duration,
            capacity: (capacity > 0).then_some(capacity),
            evicted_through: None,
        }
    }

    /// Appends an item recorded at `tick` with the ledger's step duration.
    pub fn add(&mut self, tick: Tick, item: I) {
        let step_duration = self.step_duration;
        self.add_with_step(tick, item, step_duration);
    }

    /// Appends an item recorded at `tick` with an explicit step duration.
    pub fn add_with_step(&mut self, tick: Tick, item: I, step_duration: f64) {
        if let Some(capacity) = self.capacity
            && self.entries.len() >= capacity
            && let Some(oldest) = self.entries.pop_front()
        {
            warn!(
                tick = %oldest.tick,
                capacity,
                "history ledger full, evicting oldest entry"
            );
            self.note_evicted(oldest.tick);
        }
        self.entries.push_back(LedgerEntry {
            tick,
            item,
            step_duration,
        });
    }

    /// Removes every entry with a tick strictly before `tick`.
    pub fn remove_before(&mut self, tick: Tick) {
        let before = self.entries.len();
        let mut newest_removed = None;
        self.entries.retain(|entry| {
            if entry.tick < tick {
                newest_removed = Some(newest_removed.map_or(entry.tick, |t: Tick| t.max(entry.tick)));
                false
            } else {
                true
            }
        });
        if let Some(removed) = newest_removed {
            self.note_evicted(removed);
        }
        trace!(%tick, removed = before - self.entries.len(), "ledger trimmed before");
    }

    /// Removes every entry with a tick strictly after `tick`.
    pub fn remove_after(&mut self, tick: Tick) {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.tick <= tick);
        trace!(%tick, removed = before - self.entries.len(), "ledger trimmed after");
    }

    /// Removes every entry without recording an eviction.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// All entries in insertion order. Iterating does not consume them.
    pub fn entries(&self) -> impl Iterator<Item = &LedgerEntry<I>> {
        self.entries.iter()
    }

    /// Entries recorded strictly after `tick`, in insertion order.
    pub fn entries_after(&self, tick: Tick) -> impl Iterator<Item = &LedgerEntry<I>> {
        self.entries.iter().filter(move |entry| entry.tick > tick)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no entries are stored.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Step duration used by [`add`](Self::add).
    pub fn step_duration(&self) -> f64 {
        self.step_duration
    }

    /// Newest tick ever dropped from the front of the ledger, if any.
    ///
    /// Replay from an authority tick older than this is missing inputs.
    pub fn evicted_through(&self) -> Option<Tick> {
        self.evicted_through
    }

    /// Returns `true` if every entry after `tick` is still stored.
    pub fn can_replay_from(&self, tick: Tick) -> bool {
        self.evicted_through.is_none_or(|evicted| evicted <= tick)
    }

    fn note_evicted(&mut self, tick: Tick) {
        self.evicted_through = Some(self.evicted_through.map_or(tick, |t| t.max(tick)));
    }
}

// ---------------------------------------------------------------------------
// replay
// ---------------------------------------------------------------------------

/// Folds every entry recorded after `after` through `step`, starting from
/// `baseline`.
///
/// `step` receives the state, the recorded item, and the step duration the
/// item was originally simulated with, so the result does not depend on
/// when the replay runs.
pub fn replay<S, I, F>(baseline: S, ledger: &HistoryLedger<I>, after: Tick, mut step: F) -> S
where
    F: FnMut(S, &I, f64) -> S,
{
    ledger
        .entries_after(after)
        .fold(baseline, |state, entry| step(state, &entry.item, entry.step_duration))
}

// ---------------------------------------------------------------------------
// SharedLedger
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct SharedState<I> {
    ledger: HistoryLedger<I>,
    releases: BTreeMap<u64, Option<Tick>>,
    next_handle: u64,
}

impl<I> SharedState<I> {
    /// Trims up to the oldest release point, once every consumer has one.
    fn trim_to_releases(&mut self) {
        let mut oldest: Option<Tick> = None;
        for release in self.releases.values() {
            match release {
                None => return,
                Some(tick) => {
                    oldest = Some(match oldest {
                        Some(current) if current < *tick => current,
                        _ => *tick,
                    });
                }
            }
        }
        if let Some(tick) = oldest {
            self.ledger.remove_before(tick);
        }
    }
}

#[derive(Debug)]
struct Shared<I> {
    state: RefCell<SharedState<I>>,
    /// Handles dropped while `state` was borrowed, unregistered on the next
    /// mutable access.
    retired: RefCell<Vec<u64>>,
}

impl<I> Shared<I> {
    fn state_mut(&self) -> RefMut<'_, SharedState<I>> {
        let mut state = self.state.borrow_mut();
        self.reap_retired(&mut state);
        state
    }

    fn reap_retired(&self, state: &mut SharedState<I>) {
        let retired = std::mem::take(&mut *self.retired.borrow_mut());
        if retired.is_empty() {
            return;
        }
        for id in retired {
            state.releases.remove(&id);
        }
        state.trim_to_releases();
    }
}

/// A [`HistoryLedger`] shared by the anticipated values driven by one
/// input stream.
///
/// Single-threaded: every clone refers to the same ledger.
#[derive(Debug)]
pub struct SharedLedger<I> {
    shared: Rc<Shared<I>>,
}

impl<I> Clone for SharedLedger<I> {
    fn clone(&self) -> Self {
        Self {
            shared: Rc::clone(&self.shared),
        }
    }
}

impl<I> SharedLedger<I> {
    /// Wraps a ledger for sharing.
    pub fn new(ledger: HistoryLedger<I>) -> Self {
        Self {
            shared: Rc::new(Shared {
                state: RefCell::new(SharedState {
                    ledger,
                    releases: BTreeMap::new(),
                    next_handle: 0,
                }),
                retired: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Registers a new consumer. Until it calls
    /// [`LedgerHandle::release_before`], nothing is trimmed.
    pub fn handle(&self) -> LedgerHandle<I> {
        let mut state = self.shared.state_mut();
        let id = state.next_handle;
        state.next_handle += 1;
        state.releases.insert(id, None);
        LedgerHandle {
            id,
            shared: Rc::clone(&self.shared),
        }
    }

    /// Records an item with the ledger's step duration.
    pub fn add(&self, tick: Tick, item: I) {
        self.shared.state_mut().ledger.add(tick, item);
    }

    /// Read access to the underlying ledger.
    pub fn borrow(&self) -> Ref<'_, HistoryLedger<I>> {
        Ref::map(self.shared.state.borrow(), |state| &state.ledger)
    }

    /// Write access to the underlying ledger (e.g. `remove_after` before a
    /// resimulation pass rewrites future entries).
    pub fn borrow_mut(&self) -> RefMut<'_, HistoryLedger<I>> {
        RefMut::map(self.shared.state_mut(), |state| &mut state.ledger)
    }

    /// Number of live consumers.
    pub fn consumer_count(&self) -> usize {
        self.shared.state.borrow().releases.len() - self.shared.retired.borrow().len()
    }
}

/// One consumer's view of a [`SharedLedger`].
///
/// Dropping the handle unregisters the consumer.
#[derive(Debug)]
pub struct LedgerHandle<I> {
    id: u64,
    shared: Rc<Shared<I>>,
}

impl<I> LedgerHandle<I> {
    /// Read access to the shared ledger.
    pub fn borrow(&self) -> Ref<'_, HistoryLedger<I>> {
        Ref::map(self.shared.state.borrow(), |state| &state.ledger)
    }

    /// Declares that this consumer no longer needs entries before `tick`.
    ///
    /// Release points only move forward.
    pub fn release_before(&self, tick: Tick) {
        let mut state = self.shared.state_mut();
        if let Some(release) = state.releases.get_mut(&self.id) {
            *release = Some(release.map_or(tick, |current| current.max(tick)));
        }
        state.trim_to_releases();
    }
}

impl<I> Drop for LedgerHandle<I> {
    fn drop(&mut self) {
        match self.shared.state.try_borrow_mut() {
            Ok(mut state) => {
                self.shared.reap_retired(&mut state);
                state.releases.remove(&self.id);
                state.trim_to_releases();
            }
            // Someone is reading the ledger; unregister on the next write.
            Err(_) => self.shared.retired.borrow_mut().push(self.id),
        }
    }
}
