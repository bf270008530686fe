//! Placeholder synthesis (spec §4.4, §9 tagged-union design note).
//!
//! Spec §9 flags "Placeholders signaled by a magic `_placeholder` property"
//! as better modeled with a tagged union; this module is that union: a
//! [`Slot`] is `Empty`, `Placeholder`, or `Loaded(T)`, so no downstream code
//! ever tests a boolean flag on an otherwise-real item.

use std::collections::HashMap;

use super::adapter::ListItem;

/// Number of items sampled when learning placeholder field structure (spec
/// §4.4: "sample first `SAMPLE_SIZE` items").
const SAMPLE_SIZE: usize = 20;

/// The character placeholders mask string fields with.
const MASK_CHAR: char = '\u{2588}'; // a solid block, unambiguously "not real data"

/// A slot in the collection's sparse array: unknown, synthesized, or real.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T: ListItem> {
    /// No data has ever been requested or synthesized for this index.
    Empty,
    /// A synthesized stand-in shown while the covering range loads.
    Placeholder(PlaceholderItem),
    /// Real data returned by the adapter.
    Loaded(T),
}

impl<T: ListItem> Slot<T> {
    /// Whether this slot is a synthesized placeholder (spec invariant 7:
    /// "every item with `_placeholder=true`...").
    pub fn is_placeholder(&self) -> bool {
        matches!(self, Slot::Placeholder(_))
    }

    /// Whether this slot holds real data.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Slot::Loaded(_))
    }

    /// The real item, if loaded.
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Slot::Loaded(item) => Some(item),
            _ => None,
        }
    }
}

/// A synthesized item: masked string fields sized to match observed real
/// items, shown in place of data that has not yet arrived.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaceholderItem {
    /// Synthetic id, `"placeholder-{index}"`.
    pub id: String,
    /// Masked field values, keyed by field name.
    pub fields: HashMap<&'static str, String>,
}

/// Observed `(min_len, max_len)` for a single field, learned from a sample
/// of real items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldLengthRange {
    min_len: usize,
    max_len: usize,
}

/// The learned shape of "a typical item" in this collection, used to
/// fabricate placeholders (spec: Data Model, "Placeholder Structure").
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaceholderStructure {
    fields: HashMap<&'static str, FieldLengthRange>,
}

impl PlaceholderStructure {
    /// `analyzeDataStructure(items[])` (spec §4.4): sample the first
    /// `SAMPLE_SIZE` items and record per-field min/max observed length.
    pub fn analyze<T: ListItem>(items: &[T]) -> Self {
        let mut fields: HashMap<&'static str, FieldLengthRange> = HashMap::new();
        for item in items.iter().take(SAMPLE_SIZE) {
            for (name, len) in item.sample_fields() {
                fields
                    .entry(name)
                    .and_modify(|range| {
                        range.min_len = range.min_len.min(len);
                        range.max_len = range.max_len.max(len);
                    })
                    .or_insert(FieldLengthRange { min_len: len, max_len: len });
            }
        }
        Self { fields }
    }

    /// Whether any fields have been learned yet.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// `generatePlaceholderItem(i)` (spec §4.4): fabricate a placeholder for
    /// index `i` using the learned field lengths. `pick_len` resolves a
    /// `(min, max)` pair to a single length (the caller supplies randomness,
    /// e.g. `rand`, or a deterministic midpoint for tests).
    pub fn generate(&self, index: usize, mut pick_len: impl FnMut(usize, usize) -> usize) -> PlaceholderItem {
        let mut fields = HashMap::new();
        for (name, range) in &self.fields {
            let len = pick_len(range.min_len, range.max_len);
            fields.insert(*name, MASK_CHAR.to_string().repeat(len));
        }
        PlaceholderItem {
            id: format!("placeholder-{index}"),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, PartialEq)]
    struct Row {
        id: String,
        title: String,
    }

    impl ListItem for Row {
        fn stable_id(&self) -> std::borrow::Cow<'_, str> { std::borrow::Cow::Borrowed(&self.id) }

        fn sample_fields(&self) -> Vec<(&'static str, usize)> {
            vec![("title", self.title.len())]
        }
    }

    #[test]
    fn analyze_records_min_and_max_observed_length() {
        let rows = vec![
            Row { id: "1".into(), title: "short".into() },
            Row { id: "2".into(), title: "a rather longer title".into() },
        ];
        let structure = PlaceholderStructure::analyze(&rows);
        assert!(!structure.is_empty());
        let placeholder = structure.generate(0, |min, max| (min + max) / 2);
        let len = placeholder.fields["title"].chars().count();
        assert!(len >= 5 && len <= 22);
    }

    #[test]
    fn placeholder_id_is_stable_per_index() {
        let structure = PlaceholderStructure::default();
        let p = structure.generate(42, |_, _| 0);
        assert_eq!(p.id, "placeholder-42");
    }

    #[test]
    fn slot_classification() {
        let empty: Slot<Row> = Slot::Empty;
        let placeholder: Slot<Row> = Slot::Placeholder(PlaceholderItem { id: "placeholder-0".into(), fields: HashMap::new() });
        let loaded: Slot<Row> = Slot::Loaded(Row { id: "1".into(), title: "x".into() });

        assert!(!empty.is_placeholder() && !empty.is_loaded());
        assert!(placeholder.is_placeholder() && !placeholder.is_loaded());
        assert!(!loaded.is_placeholder() && loaded.is_loaded());
    }
}
