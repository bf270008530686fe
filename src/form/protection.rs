//! Data-conflict protection overlays and the `beforeunload` guard (spec
//! §4.9, §8 scenario S6, §9 design note on window-globals).
//!
//! Per §9: "Window-globals (`window.addEventListener("beforeunload", …)`) are
//! process-wide state and must be owned by a single component at a time;
//! model as a scoped acquisition whose release removes the listener on
//! destroy." [`ScopedListener`] is that acquisition, generalizing the
//! `Drop`-disconnects idiom `crate::resize_observer::ResizeObserver` already
//! uses for its JS-side resource.

use std::cell::RefCell;
use std::rc::Rc;

use wasm_bindgen::prelude::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Element, Event, EventTarget, HtmlElement, Window};

use crate::event_bus::{ConflictResolution, Event as BusEvent, EventBus};
use crate::form::state::ModifiedTracker;

/// Whether protection overlays and the `beforeunload` confirmation are
/// active (spec §4.9: "when `protectChanges.onDataOverwrite` is enabled AND
/// the form is dirty" / "`protectChanges.beforeUnload` is enabled AND
/// dirty").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProtectionConfig {
    /// Show four click-catching overlays around the form while dirty.
    pub on_data_overwrite: bool,
    /// Force the browser's native unload confirmation while dirty.
    pub before_unload: bool,
}

/// A DOM event listener that removes itself when dropped (spec §9: "a scoped
/// acquisition whose release removes the listener on destroy").
pub struct ScopedListener {
    target: EventTarget,
    event_name: &'static str,
    closure: Option<Closure<dyn FnMut(Event)>>,
}

impl ScopedListener {
    /// Attach `callback` for `event_name` on `target`.
    pub fn attach(target: EventTarget, event_name: &'static str, callback: impl FnMut(Event) + 'static) -> Self {
        let closure = Closure::wrap(Box::new(callback) as Box<dyn FnMut(Event)>);
        let _ = target.add_event_listener_with_callback(event_name, closure.as_ref().unchecked_ref());
        Self {
            target,
            event_name,
            closure: Some(closure),
        }
    }
}

impl Drop for ScopedListener {
    fn drop(&mut self) {
        if let Some(closure) = self.closure.take() {
            let _ = self.target.remove_event_listener_with_callback(self.event_name, closure.as_ref().unchecked_ref());
        }
    }
}

/// The four fixed-positioned transparent overlays placed around the form's
/// client rect (spec §4.9, §8 scenario S6: "Exactly four overlay elements
/// exist in the document body with `position: fixed`").
pub struct OverlaySet {
    document: web_sys::Document,
    elements: Vec<Element>,
    _click_listeners: Vec<ScopedListener>,
    _reposition_listeners: Vec<ScopedListener>,
}

/// The four edges an overlay is anchored to, for positioning math.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edge {
    Top,
    Bottom,
    Left,
    Right,
}

const EDGES: [Edge; 4] = [Edge::Top, Edge::Bottom, Edge::Left, Edge::Right];

impl OverlaySet {
    /// Create and append four overlays around `form_element`'s current
    /// client rect, wiring click-to-emit and resize/scroll reposition.
    ///
    /// `tracker` sources the `data:conflict` payload: `current_data` is the
    /// dirty in-progress snapshot, `new_data` is the last-synced baseline the
    /// form would revert to if the click is resolved with `.proceed()`.
    pub fn mount(
        document: web_sys::Document,
        window: Window,
        form_element: Element,
        events: EventBus,
        tracker: Rc<RefCell<ModifiedTracker>>,
    ) -> Self {
        let mut elements = Vec::with_capacity(4);
        let mut click_listeners = Vec::with_capacity(4);

        for edge in EDGES {
            let el = document.create_element("div").expect("create overlay div");
            let html_el: &HtmlElement = el.dyn_ref().expect("div is an HtmlElement");
            let style = html_el.style();
            let _ = style.set_property("position", "fixed");
            let _ = style.set_property("background", "transparent");
            let _ = style.set_property("z-index", "2147483647");
            let _ = el.set_attribute("data-rangeview-overlay-edge", edge_name(edge));
            let _ = document.body().expect("document has a body").append_child(&el);

            let events = events.clone();
            let tracker = tracker.clone();
            let listener = ScopedListener::attach(el.clone().into(), "click", move |_evt: Event| {
                let (current_data, new_data) = {
                    let tracker = tracker.borrow();
                    (tracker.current().clone(), tracker.initial().clone())
                };
                let resolution = ConflictResolution::new();
                events.emit(BusEvent::DataConflict { current_data, new_data, resolution }, None, 0.0);
            });
            click_listeners.push(listener);
            elements.push(el);
        }

        let mut reposition_listeners = Vec::with_capacity(2);
        for event_name in ["resize", "scroll"] {
            let elements_for_reposition = elements.clone();
            let form_for_reposition = form_element.clone();
            let listener = ScopedListener::attach(window.clone().into(), event_name, move |_evt: Event| {
                reposition(&elements_for_reposition, &form_for_reposition);
            });
            reposition_listeners.push(listener);
        }

        reposition(&elements, &form_element);

        Self {
            document,
            elements,
            _click_listeners: click_listeners,
            _reposition_listeners: reposition_listeners,
        }
    }

    /// Current overlay count, for tests and invariant checks (spec S6:
    /// "Exactly four overlay elements").
    pub fn count(&self) -> usize {
        self.elements.len()
    }

    /// Tear down all four overlays (spec §4.9: "torn down on return to
    /// pristine or on destroy").
    pub fn unmount(self) {
        for el in &self.elements {
            if let Some(parent) = el.parent_node() {
                let _ = parent.remove_child(el);
            }
        }
        let _ = self.document; // keep field alive through the method for clarity
    }
}

fn edge_name(edge: Edge) -> &'static str {
    match edge {
        Edge::Top => "top",
        Edge::Bottom => "bottom",
        Edge::Left => "left",
        Edge::Right => "right",
    }
}

/// Recompute the four overlays' rects from `form_element`'s current
/// bounding client rect, covering the viewport on the outside of each edge
/// up to that edge (spec §4.9: "Positions are recomputed on window `resize`
/// and `scroll`").
fn reposition(elements: &[Element], form_element: &Element) {
    let rect = form_element.get_bounding_client_rect();
    let window = web_sys::window().expect("window exists");
    let viewport_width = window.inner_width().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);
    let viewport_height = window.inner_height().ok().and_then(|v| v.as_f64()).unwrap_or(0.0);

    let set_rect = |el: &Element, top: f64, left: f64, width: f64, height: f64| {
        if let Some(html_el) = el.dyn_ref::<HtmlElement>() {
            let style = html_el.style();
            let _ = style.set_property("top", &format!("{top}px"));
            let _ = style.set_property("left", &format!("{left}px"));
            let _ = style.set_property("width", &format!("{}px", width.max(0.0)));
            let _ = style.set_property("height", &format!("{}px", height.max(0.0)));
        }
    };

    for (el, edge) in elements.iter().zip(EDGES) {
        match edge {
            Edge::Top => set_rect(el, 0.0, 0.0, viewport_width, rect.top()),
            Edge::Bottom => set_rect(el, rect.bottom(), 0.0, viewport_width, viewport_height - rect.bottom()),
            Edge::Left => set_rect(el, rect.top(), 0.0, rect.left(), rect.height()),
            Edge::Right => set_rect(el, rect.top(), rect.right(), viewport_width - rect.right(), rect.height()),
        }
    }
}

/// Owns the `beforeunload` listener while the form is dirty and protection
/// is enabled (spec §4.9: "sets `returnValue = ""` to force the browser's
/// confirmation dialog").
pub struct BeforeUnloadGuard {
    _listener: ScopedListener,
}

impl BeforeUnloadGuard {
    /// Attach the guard.
    pub fn attach(window: Window) -> Self {
        let listener = ScopedListener::attach(window.into(), "beforeunload", |evt: Event| {
            if let Ok(unload_event) = evt.dyn_into::<web_sys::BeforeUnloadEvent>() {
                unload_event.set_return_value("");
            }
        });
        Self { _listener: listener }
    }
}

#[cfg(test)]
mod tests {
    // `OverlaySet`/`BeforeUnloadGuard` need a real `window`/`document` and so
    // are exercised only in `wasm32` integration contexts, not here. The edge
    // → rect math is the one pure piece, covered indirectly via `reposition`
    // above; it is only reachable with a real `Element`, so it is left to
    // the wasm-hosted test harness the consuming app builds.
    #[test]
    fn edge_names_are_stable() {
        use super::{edge_name, Edge};
        assert_eq!(edge_name(Edge::Top), "top");
        assert_eq!(edge_name(Edge::Right), "right");
    }
}
