//! Modified-state tracking (spec §4.9, §8 properties 6-7, scenario S5).

use std::collections::HashMap;

use crate::event_bus::{Event, EventBus};
use crate::form::field::FieldValue;

/// A named snapshot of field values: `initialData`/`currentData` in spec
/// terms.
pub type DataSnapshot = HashMap<String, FieldValue>;

/// `hasDataChanged(initial, current)` (spec §8 property 7): true if any key
/// present in either snapshot differs under [`FieldValue::is_value_equal`].
/// A key missing from one side is treated as `Null` (symmetric with JS's
/// `undefined`).
pub fn has_data_changed(initial: &DataSnapshot, current: &DataSnapshot) -> bool {
    let mut keys: std::collections::HashSet<&String> = initial.keys().collect();
    keys.extend(current.keys());
    keys.into_iter().any(|key| {
        let a = initial.get(key).unwrap_or(&FieldValue::Null);
        let b = current.get(key).unwrap_or(&FieldValue::Null);
        !FieldValue::is_value_equal(a, b)
    })
}

/// Pristine/dirty, mirrored to consumers via `state:change` (spec §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    /// `currentData` equals `initialData`.
    Pristine,
    /// `currentData` differs from `initialData`.
    Dirty,
}

/// Owns `initialData`, `currentData`, `errors`, and the derived `modified`
/// flag, emitting `state:change` on pristine/dirty transitions (spec §4.9,
/// scenario S5).
pub struct ModifiedTracker {
    initial: DataSnapshot,
    current: DataSnapshot,
    errors: HashMap<String, String>,
    state: FormState,
    events: EventBus,
}

impl ModifiedTracker {
    /// Construct with an initial snapshot; the tracker starts pristine.
    pub fn new(initial: DataSnapshot, events: EventBus) -> Self {
        Self {
            current: initial.clone(),
            initial,
            errors: HashMap::new(),
            state: FormState::Pristine,
            events,
        }
    }

    /// Whether the form currently differs from its last snapshot.
    pub fn modified(&self) -> bool {
        self.state == FormState::Dirty
    }

    /// The current pristine/dirty state.
    pub fn state(&self) -> FormState { self.state }

    /// Read-only view of the current data snapshot.
    pub fn current(&self) -> &DataSnapshot { &self.current }

    /// Read-only view of the initial (last-snapshotted) data.
    pub fn initial(&self) -> &DataSnapshot { &self.initial }

    /// Current validation errors, keyed by field.
    pub fn errors(&self) -> &HashMap<String, String> { &self.errors }

    /// `setFieldValue(key, value)`: update `currentData` and re-derive
    /// `modified`, emitting `state:change` exactly on a pristine/dirty
    /// transition (spec S5: setting back to the original value flips back to
    /// pristine and emits again).
    pub fn set_field_value(&mut self, key: &str, value: FieldValue, now: f64) {
        self.current.insert(key.to_string(), value);
        self.recompute(now);
    }

    /// Replace the whole current snapshot at once (bulk field sync),
    /// re-deriving `modified`.
    pub fn set_current(&mut self, snapshot: DataSnapshot, now: f64) {
        self.current = snapshot;
        self.recompute(now);
    }

    /// `snapshot()` (spec §4.9: called after a successful submit): the
    /// current data becomes the new baseline, returning the form to
    /// pristine.
    pub fn snapshot(&mut self, now: f64) {
        self.initial = self.current.clone();
        self.recompute(now);
    }

    /// Set or clear a single field's validation error.
    pub fn set_error(&mut self, key: &str, message: Option<String>) {
        match message {
            Some(message) => { self.errors.insert(key.to_string(), message); }
            None => { self.errors.remove(key); }
        }
    }

    /// Clear every validation error.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    fn recompute(&mut self, now: f64) {
        let modified = has_data_changed(&self.initial, &self.current);
        let new_state = if modified { FormState::Dirty } else { FormState::Pristine };
        if new_state != self.state {
            self.state = new_state;
            self.events.emit(Event::StateChange { modified }, None, now);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s5_modified_detection_round_trip() {
        let mut initial = DataSnapshot::new();
        initial.insert("username".into(), FieldValue::Text("john".into()));
        initial.insert("age".into(), FieldValue::Number(25.0));

        let mut tracker = ModifiedTracker::new(initial, EventBus::new());
        assert!(!tracker.modified());

        tracker.set_field_value("username", FieldValue::Text("jane".into()), 0.0);
        assert!(tracker.modified());
        assert_eq!(tracker.state(), FormState::Dirty);

        tracker.set_field_value("username", FieldValue::Text("john".into()), 1.0);
        assert!(!tracker.modified());
        assert_eq!(tracker.state(), FormState::Pristine);
    }

    #[test]
    fn state_change_emits_only_on_transition() {
        use std::cell::Cell;
        use std::rc::Rc;

        let events = EventBus::new();
        let count = Rc::new(Cell::new(0));
        {
            let count = count.clone();
            events.subscribe(move |_| count.set(count.get() + 1));
        }

        let mut initial = DataSnapshot::new();
        initial.insert("x".into(), FieldValue::Number(1.0));
        let mut tracker = ModifiedTracker::new(initial, events);

        tracker.set_field_value("x", FieldValue::Number(2.0), 0.0);
        assert_eq!(count.get(), 1);
        // Re-setting the same (already dirty) value must not re-emit.
        tracker.set_field_value("x", FieldValue::Number(2.0), 1.0);
        assert_eq!(count.get(), 1);
    }

    #[test]
    fn has_data_changed_treats_missing_as_null() {
        let initial = DataSnapshot::new();
        let mut current = DataSnapshot::new();
        assert!(!has_data_changed(&initial, &current));
        current.insert("x".into(), FieldValue::Null);
        assert!(!has_data_changed(&initial, &current));
        current.insert("x".into(), FieldValue::Bool(true));
        assert!(has_data_changed(&initial, &current));
    }
}
