//! A single observer set per list (spec §4.7).
//!
//! Every component reaches the same [`EventBus`] instance rather than holding
//! its own ad-hoc callback list; this is the crate's answer to the design
//! note in spec §9 about a shared `emit` callback being monkey-patched by
//! successive enhancers. Listeners run synchronously, in subscription order,
//! and a panicking listener is caught and logged rather than aborting its
//! siblings.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::form::DataSnapshot;

/// The named events the engine emits. Payload fields are additive; new
/// variants may gain fields but never lose them.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// The viewport's geometry (container size, total virtual size, or
    /// orientation) changed.
    ViewportChanged,
    /// `scrollPosition` changed as a direct result of user input or
    /// `scrollToIndex`.
    ScrollPositionChanged {
        /// The new scroll position, in pixels.
        position: f64,
    },
    /// The computed visible range changed. Always follows the
    /// `ScrollPositionChanged` that caused it, within the same turn.
    VirtualRangeChanged {
        /// First index now in the (overscanned) visible range.
        start: usize,
        /// Last index now in the (overscanned) visible range.
        end: usize,
    },
    /// A range finished loading successfully.
    RangeLoaded {
        /// The range identifier (`floor(start / rangeSize)`).
        range_id: usize,
        /// Number of items the adapter returned for this range.
        count: usize,
    },
    /// A range failed to load (adapter rejection or `{error}` response).
    RangeFailed {
        /// The range identifier that failed.
        range_id: usize,
        /// How many consecutive attempts have now failed for this range.
        attempts: u32,
        /// The adapter-reported or synthesized error message.
        message: String,
    },
    /// Adapter metadata reported a larger total than previously known.
    TotalChanged {
        /// The new, larger, total item count.
        total: usize,
    },
    /// Placeholders were synthesized to fill empty slots in a range.
    PlaceholdersShown {
        /// First index that received a placeholder.
        start: usize,
        /// Last index that received a placeholder.
        end: usize,
    },
    /// Previously placeholder slots were overwritten with real items.
    PlaceholdersReplaced {
        /// First index whose placeholder was replaced.
        start: usize,
        /// Last index whose placeholder was replaced.
        end: usize,
    },
    /// `setItems` replaced the sparse array wholesale.
    ItemsSet {
        /// The new total item count.
        total: usize,
    },
    /// A pagination sentinel (or other "load more" affordance) fired.
    LoadMoreTriggered {
        /// Which edge of the scroll container triggered the load.
        direction: TriggerDirection,
        /// The sentinel's position at trigger time, in pixels.
        position: f64,
        /// How many times this sentinel has fired so far.
        trigger_count: u32,
    },
    /// Measured sizes changed enough to recompute the estimated item size.
    DimensionsChanged {
        /// The recomputed estimated item size.
        estimated_item_size: f64,
    },
    /// The pagination strategy was reconfigured; loaded/pending ranges were
    /// cleared.
    StrategyChanged,
    /// A field's value changed and survived deduplication (form core).
    FieldChange {
        /// The registry key of the field that changed.
        field: String,
    },
    /// The form's pristine/dirty state flipped.
    StateChange {
        /// Whether the form now differs from its last snapshot.
        modified: bool,
    },
    /// A protection overlay was clicked while the form was dirty (spec §4.9,
    /// §8 scenario S6): the listener decides via [`ConflictResolution`]
    /// whether to keep the in-progress edits or fall back to the last
    /// snapshot.
    DataConflict {
        /// The form's in-progress (dirty) data at the moment of the click.
        current_data: DataSnapshot,
        /// The data the form would revert to if the conflict is resolved by
        /// proceeding (its last-synced snapshot).
        new_data: DataSnapshot,
        /// `.cancel()`/`.proceed()` handle; calling neither leaves the
        /// overlays in place (spec S6).
        resolution: ConflictResolution,
    },
    /// Validation produced at least one error.
    ValidationError,
    /// A submit attempt started.
    Submit,
    /// A submit attempt completed successfully.
    SubmitSuccess,
    /// A submit attempt failed.
    SubmitError {
        /// The error message surfaced to the caller.
        message: String,
    },
    /// The list (or form) was destroyed; no further events will be emitted.
    Destroyed,
}

/// Which edge of the scroll container a sentinel or boundary event refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDirection {
    /// The top (or start, for horizontal orientation) sentinel.
    Start,
    /// The bottom (or end) sentinel.
    End,
}

/// The decision a [`Event::DataConflict`] listener reaches via
/// [`ConflictResolution`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Keep the overlays and the dirty edits; do nothing further.
    Cancel,
    /// Discard the dirty edits, reverting to the last snapshot.
    Proceed,
}

/// A shared `.cancel()`/`.proceed()` handle attached to
/// [`Event::DataConflict`] (spec §4.9, §8 S6). Cloned copies observe the same
/// decision, mirroring how [`Unsubscribe`] hands out one disposer per
/// subscription rather than per clone.
#[derive(Clone)]
pub struct ConflictResolution {
    decision: Rc<Cell<Option<ConflictDecision>>>,
}

impl ConflictResolution {
    /// A fresh, undecided handle.
    pub fn new() -> Self {
        Self { decision: Rc::new(Cell::new(None)) }
    }

    /// Keep the overlays in place; the form stays dirty (spec S6: "calling
    /// its `.cancel()` leaves overlays in place").
    pub fn cancel(&self) {
        self.decision.set(Some(ConflictDecision::Cancel));
    }

    /// Accept the overwrite; the caller is expected to reset the form to
    /// `new_data` and re-snapshot.
    pub fn proceed(&self) {
        self.decision.set(Some(ConflictDecision::Proceed));
    }

    /// The decision reached so far, if any.
    pub fn decision(&self) -> Option<ConflictDecision> {
        self.decision.get()
    }
}

impl Default for ConflictResolution {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for ConflictResolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConflictResolution").field("decision", &self.decision()).finish()
    }
}

impl PartialEq for ConflictResolution {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.decision, &other.decision)
    }
}

/// The envelope every listener receives: the event itself, plus a
/// best-effort snapshot of the viewport's scroll position at emit time and a
/// millisecond timestamp supplied by the caller (the bus never reads the
/// clock itself, since [`Event`]-emitting code runs inside a `wasm32` host
/// where `instant::now`-style calls are the caller's responsibility).
#[derive(Debug, Clone)]
pub struct Envelope {
    /// The event payload.
    pub event: Event,
    /// The scroll position at the time of emission, if a viewport exists.
    pub viewport_position: Option<f64>,
    /// Caller-supplied timestamp, in milliseconds.
    pub timestamp: f64,
}

type Listener = Rc<dyn Fn(&Envelope)>;

/// An opaque handle returned by [`EventBus::subscribe`]. Dropping it does
/// *not* unsubscribe; call [`Unsubscribe::unsubscribe`] explicitly, mirroring
/// the explicit-disposer pattern spec §9 calls for in place of destructor-time
/// magic.
#[must_use = "dropping this handle does not unsubscribe; call `.unsubscribe()`"]
pub struct Unsubscribe {
    bus: Rc<Inner>,
    id: u64,
}

impl fmt::Debug for Unsubscribe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Unsubscribe").field("id", &self.id).finish()
    }
}

impl Unsubscribe {
    /// Remove the associated listener from the bus. A no-op if already
    /// unsubscribed.
    pub fn unsubscribe(self) {
        self.bus.listeners.borrow_mut().retain(|(id, _)| *id != self.id);
    }
}

struct Inner {
    listeners: RefCell<Vec<(u64, Listener)>>,
    next_id: RefCell<u64>,
}

/// The typed, single-instance-per-list observer registry described in spec
/// §4.7.
#[derive(Clone)]
pub struct EventBus {
    inner: Rc<Inner>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("listener_count", &self.inner.listeners.borrow().len())
            .finish()
    }
}

impl Default for EventBus {
    fn default() -> Self { Self::new() }
}

impl EventBus {
    /// Construct an empty bus.
    pub fn new() -> Self {
        Self {
            inner: Rc::new(Inner {
                listeners: RefCell::new(Vec::new()),
                next_id: RefCell::new(0),
            }),
        }
    }

    /// Register a listener. Listeners must not throw; if one panics, the
    /// panic is caught, logged, and the remaining listeners still run (spec
    /// §4.7, §7 "Listener errors").
    pub fn subscribe(&self, f: impl Fn(&Envelope) + 'static) -> Unsubscribe {
        let id = {
            let mut next_id = self.inner.next_id.borrow_mut();
            let id = *next_id;
            *next_id += 1;
            id
        };
        self.inner.listeners.borrow_mut().push((id, Rc::new(f)));
        Unsubscribe {
            bus: self.inner.clone(),
            id,
        }
    }

    /// Emit an event synchronously to every current listener, in
    /// subscription order.
    pub fn emit(&self, event: Event, viewport_position: Option<f64>, timestamp: f64) {
        let envelope = Envelope {
            event,
            viewport_position,
            timestamp,
        };
        // Snapshot listeners before calling out: a listener that subscribes
        // or unsubscribes during dispatch must not affect this round.
        let listeners: Vec<Listener> = self.inner.listeners.borrow().iter().map(|(_, l)| l.clone()).collect();
        for listener in listeners {
            let envelope = &envelope;
            let result = catch_unwind(AssertUnwindSafe(|| listener(envelope)));
            if let Err(panic) = result {
                log::error!("event bus listener panicked while handling {:?}: {}", envelope.event, describe_panic(&panic));
            }
        }
    }

    /// Remove every listener. Called on destroy.
    pub fn clear(&self) {
        self.inner.listeners.borrow_mut().clear();
    }

    /// Number of currently registered listeners, mostly useful for tests.
    pub fn listener_count(&self) -> usize {
        self.inner.listeners.borrow().len()
    }
}

fn describe_panic(panic: &Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn emits_in_subscription_order() {
        let bus = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let order = order.clone();
            bus.subscribe(move |_| order.borrow_mut().push(1));
        }
        {
            let order = order.clone();
            bus.subscribe(move |_| order.borrow_mut().push(2));
        }
        bus.emit(Event::Destroyed, None, 0.0);
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let bus = EventBus::new();
        let calls = Rc::new(Cell::new(0));
        let handle = {
            let calls = calls.clone();
            bus.subscribe(move |_| calls.set(calls.get() + 1))
        };
        bus.emit(Event::Destroyed, None, 0.0);
        handle.unsubscribe();
        bus.emit(Event::Destroyed, None, 0.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn a_panicking_listener_does_not_stop_others() {
        let bus = EventBus::new();
        let calls = Rc::new(Cell::new(0));
        bus.subscribe(|_| panic!("boom"));
        {
            let calls = calls.clone();
            bus.subscribe(move |_| calls.set(calls.get() + 1));
        }
        bus.emit(Event::Destroyed, None, 0.0);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn clear_removes_all_listeners() {
        let bus = EventBus::new();
        bus.subscribe(|_| {});
        bus.subscribe(|_| {});
        assert_eq!(bus.listener_count(), 2);
        bus.clear();
        assert_eq!(bus.listener_count(), 0);
    }
}
