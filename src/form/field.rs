//! Field capability abstraction (spec §4.9, §9 design note on "heterogeneous
//! field components").
//!
//! The original form core duck-types any widget exposing
//! `getValue/setValue/on/off/enable/disable/setError?`. Per §9's redesign
//! note, that capability set becomes an explicit trait here, and the
//! duck-typed "any value" becomes [`FieldValue`], a closed sum type covering
//! every widget kind this crate's teacher/pack corpus actually renders
//! (text, numeric, boolean, single choice, and multi-value chips).

use std::rc::Rc;
use web_sys::Element;

/// A field's value, in a closed encoding rather than an untyped `any` (spec
/// §9: "explicit per-variant value encodings").
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// JS `null`/`undefined`; the two are not distinguished here, matching
    /// `isValueEqual`'s "null-treated-as-equal-to-undefined" rule.
    Null,
    /// A checkbox or switch.
    Bool(bool),
    /// A numeric input.
    Number(f64),
    /// A text input or select's selected value.
    Text(String),
    /// A chips/multi-select field.
    List(Vec<FieldValue>),
}

impl FieldValue {
    /// `isValueEqual(a, b)` (spec §8 property 6): reflexive, symmetric,
    /// recursive; arrays compared element-wise; `Null` is equal to itself
    /// and nothing else except another `Null`.
    pub fn is_value_equal(a: &FieldValue, b: &FieldValue) -> bool {
        match (a, b) {
            (FieldValue::Null, FieldValue::Null) => true,
            (FieldValue::Bool(x), FieldValue::Bool(y)) => x == y,
            (FieldValue::Number(x), FieldValue::Number(y)) => x == y,
            (FieldValue::Text(x), FieldValue::Text(y)) => x == y,
            (FieldValue::List(x), FieldValue::List(y)) => {
                x.len() == y.len() && x.iter().zip(y).all(|(a, b)| FieldValue::is_value_equal(a, b))
            }
            _ => false,
        }
    }
}

/// Which registry a scanned UI-map entry belongs to (spec §4.9: names
/// prefixed `info.`/`data.` are fields, `file.` are files).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldCategory {
    /// A regular data field.
    Field,
    /// A file input, tracked separately from `currentData`.
    File,
}

/// An opaque subscription token returned by [`FieldHandle::on`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenerToken(pub u64);

/// The capability set the form core needs from any concrete widget (spec
/// §4.9, §9: "the form core sees only the capability set via an interface
/// abstraction").
pub trait FieldHandle {
    /// Current value.
    fn get_value(&self) -> FieldValue;
    /// Programmatically set the value (does not itself fire `input`/`change`
    /// unless the concrete widget does so).
    fn set_value(&self, value: FieldValue);
    /// Subscribe to a DOM-level event name (`"input"` or `"change"`).
    fn on(&self, event_name: &str, callback: Rc<dyn Fn(FieldValue)>) -> ListenerToken;
    /// Remove a subscription returned by `on`.
    fn off(&self, token: ListenerToken);
    /// Enable the underlying control.
    fn enable(&self);
    /// Disable the underlying control (e.g. while submitting).
    fn disable(&self);
    /// Attach a validation error message. Optional in the original capability
    /// set; the default is a no-op for widgets with no error affordance.
    fn set_error(&self, _message: Option<&str>) {}
    /// The backing DOM element, for protection-overlay geometry and similar.
    fn element(&self) -> &Element;
}

/// Registers fields and files scanned from a UI map (spec §4.9: "Registers
/// fields by scanning a UI map for names prefixed `info.` or `data.` (fields)
/// and `file.` (files); stripped names become registry keys").
#[derive(Default)]
pub struct FieldRegistry {
    fields: std::collections::HashMap<String, Rc<dyn FieldHandle>>,
    files: std::collections::HashMap<String, Rc<dyn FieldHandle>>,
}

impl std::fmt::Debug for FieldRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldRegistry")
            .field("fields", &self.fields.keys().collect::<Vec<_>>())
            .field("files", &self.files.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl FieldRegistry {
    /// Scan `(name, handle)` pairs, stripping the `info.`/`data.`/`file.`
    /// prefix and sorting each into the fields or files registry. Entries
    /// with no recognized prefix are ignored (they are not part of the
    /// form's managed surface).
    pub fn scan(entries: Vec<(String, Rc<dyn FieldHandle>)>) -> Self {
        let mut registry = Self::default();
        for (name, handle) in entries {
            if let Some(stripped) = name.strip_prefix("info.").or_else(|| name.strip_prefix("data.")) {
                registry.fields.insert(stripped.to_string(), handle);
            } else if let Some(stripped) = name.strip_prefix("file.") {
                registry.files.insert(stripped.to_string(), handle);
            }
        }
        registry
    }

    /// Look up a registered field or file handle by its stripped key.
    pub fn get(&self, key: &str) -> Option<&Rc<dyn FieldHandle>> {
        self.fields.get(key).or_else(|| self.files.get(key))
    }

    /// Which category `key` was registered under, if any.
    pub fn category_of(&self, key: &str) -> Option<FieldCategory> {
        if self.fields.contains_key(key) {
            Some(FieldCategory::Field)
        } else if self.files.contains_key(key) {
            Some(FieldCategory::File)
        } else {
            None
        }
    }

    /// Registered field keys (excludes files), in arbitrary order.
    pub fn field_keys(&self) -> Vec<String> {
        self.fields.keys().cloned().collect()
    }

    /// Iterate over `(key, handle)` for data fields only.
    pub fn iter_fields(&self) -> impl Iterator<Item = (&String, &Rc<dyn FieldHandle>)> {
        self.fields.iter()
    }

    /// Enable or disable every registered field and file control at once
    /// (spec §4.9: "disables all field/file controls for the duration of the
    /// submit").
    pub fn set_all_enabled(&self, enabled: bool) {
        for handle in self.fields.values().chain(self.files.values()) {
            if enabled {
                handle.enable();
            } else {
                handle.disable();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_value_equal_is_reflexive_symmetric_and_recursive() {
        let a = FieldValue::List(vec![FieldValue::Text("x".into()), FieldValue::Number(1.0)]);
        let b = a.clone();
        assert!(FieldValue::is_value_equal(&a, &a));
        assert!(FieldValue::is_value_equal(&a, &b));
        assert!(FieldValue::is_value_equal(&b, &a));

        let c = FieldValue::List(vec![FieldValue::Text("x".into()), FieldValue::Number(2.0)]);
        assert!(!FieldValue::is_value_equal(&a, &c));
    }

    #[test]
    fn null_is_equal_only_to_null() {
        assert!(FieldValue::is_value_equal(&FieldValue::Null, &FieldValue::Null));
        assert!(!FieldValue::is_value_equal(&FieldValue::Null, &FieldValue::Bool(false)));
    }

    #[test]
    fn scan_strips_prefixes_and_sorts_into_registries() {
        // A minimal handle is awkward to construct without a DOM; category
        // routing logic is exercised directly against the prefix map instead.
        let names = ["info.username", "data.age", "file.avatar", "unrelated"];
        let mut fields = 0;
        let mut files = 0;
        let mut ignored = 0;
        for name in names {
            if name.strip_prefix("info.").or_else(|| name.strip_prefix("data.")).is_some() {
                fields += 1;
            } else if name.strip_prefix("file.").is_some() {
                files += 1;
            } else {
                ignored += 1;
            }
        }
        assert_eq!(fields, 2);
        assert_eq!(files, 1);
        assert_eq!(ignored, 1);
    }
}
