//! Field-change binding and deduplication (spec §4.9 bullet 2, §8 property 8).
//!
//! The original form core binds `input`/`change` DOM events directly and
//! compares each new value against a per-field "last emitted value" cache
//! before telling anything downstream. [`dedup_emit`] is that comparison,
//! pulled out as a pure function so it is host-testable without a `window`;
//! [`FieldBinder`] is the thin DOM-facing wrapper that calls it from every
//! [`FieldHandle::on`] subscription.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::event_bus::{Event, EventBus};
use crate::form::field::{FieldHandle, FieldRegistry, FieldValue, ListenerToken};
use crate::form::state::ModifiedTracker;

/// Compare `value` against `cache[key]` under [`FieldValue::is_value_equal`],
/// updating the cache and returning `true` only when it actually changed
/// (spec §8 property 8: same-value `input` then `change` yields exactly one
/// emission; distinct values each yield one).
pub fn dedup_emit(cache: &mut HashMap<String, FieldValue>, key: &str, value: FieldValue) -> bool {
    let changed = match cache.get(key) {
        Some(previous) => !FieldValue::is_value_equal(previous, &value),
        None => true,
    };
    if changed {
        cache.insert(key.to_string(), value);
    }
    changed
}

/// Binds `input` and `change` listeners on every field in a [`FieldRegistry`],
/// routing deduplicated changes into a [`ModifiedTracker`] and emitting
/// `field:change` (spec §4.9: "Emits `field:change` and `change` only when
/// the value actually changes").
pub struct FieldBinder {
    last_emitted: Rc<RefCell<HashMap<String, FieldValue>>>,
    bound: Vec<(Rc<dyn FieldHandle>, ListenerToken)>,
}

impl FieldBinder {
    /// Bind every field in `registry`. `now` is called once per surviving
    /// change to timestamp the emitted event.
    pub fn bind(registry: &FieldRegistry, tracker: Rc<RefCell<ModifiedTracker>>, events: EventBus, now: Rc<dyn Fn() -> f64>) -> Self {
        let last_emitted: Rc<RefCell<HashMap<String, FieldValue>>> = Rc::new(RefCell::new(HashMap::new()));
        let mut bound = Vec::new();

        for (key, handle) in registry.iter_fields() {
            last_emitted.borrow_mut().insert(key.clone(), handle.get_value());

            for event_name in ["input", "change"] {
                let key = key.clone();
                let tracker = tracker.clone();
                let events = events.clone();
                let last_emitted = last_emitted.clone();
                let now = now.clone();
                let token = handle.on(
                    event_name,
                    Rc::new(move |value: FieldValue| {
                        let changed = dedup_emit(&mut last_emitted.borrow_mut(), &key, value.clone());
                        if !changed {
                            return;
                        }
                        let timestamp = now();
                        tracker.borrow_mut().set_field_value(&key, value, timestamp);
                        events.emit(Event::FieldChange { field: key.clone() }, None, timestamp);
                    }),
                );
                bound.push((handle.clone(), token));
            }
        }

        Self { last_emitted, bound }
    }

    /// Number of field/event-name listener pairs currently bound, mostly
    /// useful for tests and `destroy()` bookkeeping.
    pub fn bound_count(&self) -> usize {
        self.bound.len()
    }

    /// Unbind every listener (spec §5: "A destroyed list MUST... clear all
    /// listeners").
    pub fn unbind(self) {
        for (handle, token) in self.bound {
            handle.off(token);
        }
    }
}

impl std::fmt::Debug for FieldBinder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldBinder")
            .field("bound_fields", &self.last_emitted.borrow().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s8_same_value_dedupes_across_input_then_change() {
        let mut cache = HashMap::new();
        assert!(dedup_emit(&mut cache, "username", FieldValue::Text("jane".into())));
        // Simulates the `change` event firing right after `input` with the
        // same value: must not count as a second emission.
        assert!(!dedup_emit(&mut cache, "username", FieldValue::Text("jane".into())));
    }

    #[test]
    fn s8_distinct_consecutive_values_each_emit() {
        let mut cache = HashMap::new();
        assert!(dedup_emit(&mut cache, "age", FieldValue::Number(1.0)));
        assert!(dedup_emit(&mut cache, "age", FieldValue::Number(2.0)));
        assert!(dedup_emit(&mut cache, "age", FieldValue::Number(3.0)));
    }

    #[test]
    fn distinct_fields_track_independent_caches() {
        let mut cache = HashMap::new();
        assert!(dedup_emit(&mut cache, "a", FieldValue::Bool(true)));
        assert!(dedup_emit(&mut cache, "b", FieldValue::Bool(true)));
    }
}
