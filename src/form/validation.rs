//! Ordered validation rules (spec §4.9 last bullet, §7 "Validation errors").

use std::rc::Rc;

use crate::event_bus::{Event, EventBus};
use crate::form::field::FieldValue;
use crate::form::state::DataSnapshot;

/// The result of running a single rule against a field's current value.
pub enum RuleOutcome {
    /// The value is acceptable.
    Valid,
    /// The value is rejected; `None` falls back to the rule's own `message`.
    Invalid(Option<String>),
}

/// `{field, validate(value, data) -> true|false|string, message?}` (spec
/// §4.9): a falsy result or an explicit string both become an error.
pub struct ValidationRule {
    /// The registry key this rule validates.
    pub field: String,
    /// The check itself.
    pub check: Rc<dyn Fn(&FieldValue, &DataSnapshot) -> RuleOutcome>,
    /// Fallback message when the check returns `Invalid(None)`.
    pub message: Option<String>,
}

impl ValidationRule {
    /// Construct a rule with a fallback message.
    pub fn new(field: impl Into<String>, message: impl Into<String>, check: impl Fn(&FieldValue, &DataSnapshot) -> RuleOutcome + 'static) -> Self {
        Self {
            field: field.into(),
            check: Rc::new(check),
            message: Some(message.into()),
        }
    }
}

/// Runs an ordered rule list against a data snapshot (spec §4.9: "validate()
/// runs an ordered rule list; ... Validating a single field clears or
/// replaces its entry").
pub struct Validator {
    rules: Vec<ValidationRule>,
}

impl Validator {
    /// Construct a validator from an ordered rule list. Order matters only
    /// in that later rules for the same field overwrite earlier ones in the
    /// resulting error map (each field keeps its last-evaluated rule's
    /// message).
    pub fn new(rules: Vec<ValidationRule>) -> Self {
        Self { rules }
    }

    /// Validate every rule against `data`, returning the full error map.
    /// Fields with no rule, or whose rule passed, are absent from the map.
    pub fn validate_all(&self, data: &DataSnapshot) -> std::collections::HashMap<String, String> {
        let mut errors = std::collections::HashMap::new();
        for rule in &self.rules {
            let value = data.get(&rule.field).unwrap_or(&FieldValue::Null);
            match (rule.check)(value, data) {
                RuleOutcome::Valid => { errors.remove(&rule.field); }
                RuleOutcome::Invalid(message) => {
                    let message = message.or_else(|| rule.message.clone()).unwrap_or_default();
                    errors.insert(rule.field.clone(), message);
                }
            }
        }
        errors
    }

    /// Validate a single field's rules only, used when a field changes and
    /// the form wants to clear or replace just that field's error (spec
    /// §4.9: "Validating a single field clears or replaces its entry").
    pub fn validate_field(&self, field: &str, data: &DataSnapshot) -> Option<String> {
        let value = data.get(field).unwrap_or(&FieldValue::Null);
        let mut result = None;
        for rule in self.rules.iter().filter(|r| r.field == field) {
            result = match (rule.check)(value, data) {
                RuleOutcome::Valid => None,
                RuleOutcome::Invalid(message) => Some(message.or_else(|| rule.message.clone()).unwrap_or_default()),
            };
        }
        result
    }

    /// Run every rule, emitting `validation:error` if any field failed.
    pub fn validate_and_emit(&self, data: &DataSnapshot, events: &EventBus, now: f64) -> std::collections::HashMap<String, String> {
        let errors = self.validate_all(data);
        if !errors.is_empty() {
            events.emit(Event::ValidationError, None, now);
        }
        errors
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn non_empty_text(value: &FieldValue, _data: &DataSnapshot) -> RuleOutcome {
        match value {
            FieldValue::Text(s) if !s.is_empty() => RuleOutcome::Valid,
            _ => RuleOutcome::Invalid(None),
        }
    }

    #[test]
    fn validate_all_maps_falsy_rules_to_errors() {
        let rules = vec![ValidationRule::new("username", "required", non_empty_text)];
        let validator = Validator::new(rules);

        let mut data = DataSnapshot::new();
        data.insert("username".into(), FieldValue::Text(String::new()));
        let errors = validator.validate_all(&data);
        assert_eq!(errors.get("username"), Some(&"required".to_string()));

        data.insert("username".into(), FieldValue::Text("jane".into()));
        let errors = validator.validate_all(&data);
        assert!(!errors.contains_key("username"));
    }

    #[test]
    fn validate_and_emit_fires_only_when_errors_exist() {
        use std::cell::Cell;
        use std::rc::Rc as StdRc;

        let events = EventBus::new();
        let fired = StdRc::new(Cell::new(false));
        {
            let fired = fired.clone();
            events.subscribe(move |_| fired.set(true));
        }
        let rules = vec![ValidationRule::new("username", "required", non_empty_text)];
        let validator = Validator::new(rules);

        let mut data = DataSnapshot::new();
        data.insert("username".into(), FieldValue::Text("jane".into()));
        validator.validate_and_emit(&data, &events, 0.0);
        assert!(!fired.get());

        data.insert("username".into(), FieldValue::Text(String::new()));
        validator.validate_and_emit(&data, &events, 0.0);
        assert!(fired.get());
    }
}
