//! Renderer (spec §4.5 "Rendering" bullets, §6): instantiates item elements
//! via a user template, positions them by virtual offset, and cooperates
//! with the [`crate::pool::ElementPool`] for element reuse. Template panics
//! are caught per item and replaced with a fallback node (spec §6, §7).

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;

use crate::collection::{ListItem, Slot};

/// What a template sees for a given index: a real item or a synthesized
/// placeholder (spec §4.4/§9: the tagged-union resolution of the
/// `_placeholder` flag carries through to the rendering boundary too).
pub enum ItemView<'a, T: ListItem> {
    /// Real data.
    Loaded(&'a T),
    /// A synthesized placeholder; templates typically render masked
    /// skeleton content for this case.
    Placeholder(&'a crate::collection::PlaceholderItem),
}

impl<'a, T: ListItem> ItemView<'a, T> {
    /// Build a view from a slot reference. `None` for `Slot::Empty`, since
    /// the renderer should not render an index with nothing to show yet.
    pub fn from_slot(slot: &'a Slot<T>) -> Option<Self> {
        match slot {
            Slot::Empty => None,
            Slot::Placeholder(p) => Some(ItemView::Placeholder(p)),
            Slot::Loaded(item) => Some(ItemView::Loaded(item)),
        }
    }
}

/// What a template hands back for one item (spec §6: "`template(item, index)`
/// returns a string or an `Element`"). A string is inserted into a detached
/// container and its first element child is taken, exactly as the spec
/// describes; an `Element` is used directly.
pub enum ItemMarkup {
    /// Inner HTML to install on the pooled wrapper element.
    Html(String),
    /// A caller-constructed element, appended into the pooled wrapper.
    Element(web_sys::Element),
}

/// A total function from `(item view, index)` to markup. Per spec §6, "The
/// template MUST be total (never throw)"; this crate enforces that
/// defensively by catching panics rather than trusting callers, exactly as
/// it catches panics from event-bus listeners.
pub type Template<T> = Rc<dyn Fn(ItemView<'_, T>, usize) -> ItemMarkup>;

/// Wraps a user [`Template`], providing the panic/fallback behavior spec §7
/// describes for "Template errors".
pub struct Renderer<T: ListItem> {
    template: Template<T>,
}

impl<T: ListItem> Renderer<T> {
    /// Wrap `template`.
    pub fn new(template: Template<T>) -> Self {
        Self { template }
    }

    /// Render a single item, catching a panicking template and substituting
    /// a fallback node. The error is logged, never propagated (spec §7:
    /// "the viewport never sees exceptions from the collection").
    pub fn render_item(&self, view: ItemView<'_, T>, index: usize) -> ItemMarkup {
        let template = self.template.clone();
        // `view` borrows from the collection's sparse array; wrap the call
        // boundary only, not a captured value, so `AssertUnwindSafe` is
        // sound here (no partially-mutated state escapes a panic).
        let result = catch_unwind(AssertUnwindSafe(|| template(view, index)));
        match result {
            Ok(markup) => markup,
            Err(panic) => {
                log::error!("template panicked while rendering index {index}: {}", describe_panic(&panic));
                ItemMarkup::Html(fallback_markup(index))
            }
        }
    }
}

fn describe_panic(panic: &Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "<non-string panic payload>".to_string()
    }
}

fn fallback_markup(index: usize) -> String {
    format!(r#"<div class="rangeview-item-error" data-fallback-index="{index}">Failed to render item</div>"#)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[derive(Clone, PartialEq)]
    struct Row(usize);
    impl ListItem for Row {
        fn stable_id(&self) -> Cow<'_, str> { Cow::Owned(self.0.to_string()) }
    }

    #[test]
    fn panicking_template_yields_fallback_without_propagating() {
        let template: Template<Row> = Rc::new(|_view, _index| panic!("template exploded"));
        let renderer = Renderer::new(template);
        let row = Row(3);
        // Should not unwind past this call.
        let markup = renderer.render_item(ItemView::Loaded(&row), 3);
        assert!(matches!(markup, ItemMarkup::Html(_)));
    }

    #[test]
    fn healthy_template_passes_markup_through() {
        let template: Template<Row> = Rc::new(|view, index| match view {
            ItemView::Loaded(row) => ItemMarkup::Html(format!("<div>{}:{index}</div>", row.0)),
            ItemView::Placeholder(_) => ItemMarkup::Html("<div>...</div>".to_string()),
        });
        let renderer = Renderer::new(template);
        let row = Row(7);
        match renderer.render_item(ItemView::Loaded(&row), 7) {
            ItemMarkup::Html(s) => assert_eq!(s, "<div>7:7</div>"),
            ItemMarkup::Element(_) => panic!("expected html markup"),
        }
    }
}
