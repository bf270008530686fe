//! Intersection-Based Pagination Trigger (spec §4.8, optional plugin):
//! invisible sentinel elements at the top and/or bottom of the scroll
//! container whose intersection with the viewport fires
//! `load:more:triggered`, debounced and capped.
//!
//! [`TriggerGate`] is the debounce/cap bookkeeping, pulled out as a pure
//! struct the same way `speed::SpeedTracker` separates its arithmetic from
//! `web_sys` wiring; [`IntersectionTrigger`] is the sentinel-element and
//! `IntersectionObserver` wiring around it.

use wasm_bindgen::prelude::Closure;
use wasm_bindgen::JsCast;
use web_sys::{Element, IntersectionObserver, IntersectionObserverEntry, IntersectionObserverInit};

use crate::event_bus::{Event, EventBus, TriggerDirection};
use crate::orientation::Orientation;

/// Tunables for a sentinel pair (spec §4.8: "Debounced by `debounceMs`;
/// capped by `maxTriggers`").
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SentinelConfig {
    /// Minimum milliseconds between accepted triggers for one sentinel.
    pub debounce_ms: f64,
    /// Maximum number of triggers a sentinel will fire. `0` means unlimited.
    pub max_triggers: u32,
}

impl Default for SentinelConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 200.0,
            max_triggers: 0,
        }
    }
}

/// Pure debounce/cap decision for one sentinel (spec §4.8). Kept separate
/// from the DOM wiring so the cap/debounce interaction is host-testable.
#[derive(Debug, Clone, Copy)]
pub struct TriggerGate {
    config: SentinelConfig,
    count: u32,
    last_fired_at: Option<f64>,
}

impl TriggerGate {
    /// Construct a fresh, unfired gate.
    pub fn new(config: SentinelConfig) -> Self {
        Self {
            config,
            count: 0,
            last_fired_at: None,
        }
    }

    /// How many times this gate has fired so far.
    pub fn trigger_count(&self) -> u32 {
        self.count
    }

    /// Decide whether an intersection at `now` should fire, updating
    /// internal state if so. Returns the new trigger count on success.
    pub fn try_fire(&mut self, now: f64) -> Option<u32> {
        if self.config.max_triggers != 0 && self.count >= self.config.max_triggers {
            return None;
        }
        if let Some(last) = self.last_fired_at {
            if now - last < self.config.debounce_ms {
                return None;
            }
        }
        self.count += 1;
        self.last_fired_at = Some(now);
        Some(self.count)
    }

    /// Reset the gate, e.g. when the list's data source changes.
    pub fn reset(&mut self) {
        self.count = 0;
        self.last_fired_at = None;
    }
}

/// One edge's sentinel: the invisible DOM element plus its debounce gate.
struct Sentinel {
    element: Element,
    direction: TriggerDirection,
    gate: TriggerGate,
}

/// Owns the top and/or bottom sentinel elements and the single
/// `IntersectionObserver` watching both, emitting `LoadMoreTriggered` through
/// the shared [`EventBus`] (spec §4.8).
pub struct IntersectionTrigger {
    observer: IntersectionObserver,
    _closure: Closure<dyn FnMut(Vec<wasm_bindgen::JsValue>)>,
    sentinels: std::rc::Rc<std::cell::RefCell<Vec<Sentinel>>>,
}

impl IntersectionTrigger {
    /// Create and observe sentinel elements for each requested edge, appended
    /// as children of `container`. `now` supplies the timestamp used for
    /// debounce decisions and the emitted envelope.
    pub fn mount(
        container: &Element,
        document: &web_sys::Document,
        edges: &[TriggerDirection],
        config: SentinelConfig,
        events: EventBus,
        now: std::rc::Rc<dyn Fn() -> f64>,
    ) -> Self {
        let sentinels = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));

        for &direction in edges {
            let el = document.create_element("div").expect("create sentinel div");
            if let Some(html_el) = el.dyn_ref::<web_sys::HtmlElement>() {
                let style = html_el.style();
                let _ = style.set_property("position", "absolute");
                let _ = style.set_property("width", "1px");
                let _ = style.set_property("height", "1px");
                let _ = style.set_property("pointer-events", "none");
                let _ = style.set_property("visibility", "hidden");
            }
            let _ = container.append_child(&el);
            sentinels.borrow_mut().push(Sentinel {
                element: el,
                direction,
                gate: TriggerGate::new(config),
            });
        }

        let sentinels_for_callback = sentinels.clone();
        let closure = Closure::wrap(Box::new(move |entries: Vec<wasm_bindgen::JsValue>| {
            let timestamp = now();
            let mut registered = sentinels_for_callback.borrow_mut();
            for raw_entry in entries {
                let entry: IntersectionObserverEntry = match raw_entry.dyn_into() {
                    Ok(entry) => entry,
                    Err(_) => continue,
                };
                if !entry.is_intersecting() {
                    continue;
                }
                let target = entry.target();
                if let Some(sentinel) = registered.iter_mut().find(|s| s.element == target) {
                    if let Some(trigger_count) = sentinel.gate.try_fire(timestamp) {
                        let rect = entry.bounding_client_rect();
                        let position = match sentinel.direction {
                            TriggerDirection::Start => rect.top(),
                            TriggerDirection::End => rect.bottom(),
                        };
                        events.emit(
                            Event::LoadMoreTriggered {
                                direction: sentinel.direction,
                                position,
                                trigger_count,
                            },
                            None,
                            timestamp,
                        );
                    }
                }
            }
        }) as Box<dyn FnMut(Vec<wasm_bindgen::JsValue>)>);

        let mut init = IntersectionObserverInit::new();
        init.root(Some(container));
        let observer =
            IntersectionObserver::new_with_options(closure.as_ref().unchecked_ref(), &init).expect("construct IntersectionObserver");
        for sentinel in sentinels.borrow().iter() {
            observer.observe(&sentinel.element);
        }

        Self {
            observer,
            _closure: closure,
            sentinels,
        }
    }

    /// Reposition sentinels along the main axis at the container's start and
    /// end, called on every `viewport:changed` (spec §4.8: "Sentinel position
    /// is updated on every `viewport:changed`").
    pub fn reposition(&self, orientation: Orientation, total_virtual_size: f64) {
        for sentinel in self.sentinels.borrow().iter() {
            let position = match sentinel.direction {
                TriggerDirection::Start => 0.0,
                TriggerDirection::End => (total_virtual_size - 1.0).max(0.0),
            };
            orientation.position_item_element(&sentinel.element, position, 1.0, total_virtual_size, false, crate::orientation::CrossAxisAlign::Start, None);
        }
    }

    /// Current trigger counts, in sentinel registration order, mostly for
    /// tests and diagnostics.
    pub fn trigger_counts(&self) -> Vec<(TriggerDirection, u32)> {
        self.sentinels.borrow().iter().map(|s| (s.direction, s.gate.trigger_count())).collect()
    }

    /// Disconnect the observer and detach sentinel elements from the DOM
    /// (spec §5: "A destroyed list MUST ... clear ... sentinels").
    pub fn destroy(self) {
        self.observer.disconnect();
        for sentinel in self.sentinels.borrow().iter() {
            if let Some(parent) = sentinel.element.parent_node() {
                let _ = parent.remove_child(&sentinel.element);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gate_respects_max_triggers_cap() {
        let mut gate = TriggerGate::new(SentinelConfig {
            debounce_ms: 0.0,
            max_triggers: 2,
        });
        assert_eq!(gate.try_fire(0.0), Some(1));
        assert_eq!(gate.try_fire(1.0), Some(2));
        assert_eq!(gate.try_fire(2.0), None);
    }

    #[test]
    fn gate_debounces_rapid_intersections() {
        let mut gate = TriggerGate::new(SentinelConfig {
            debounce_ms: 200.0,
            max_triggers: 0,
        });
        assert_eq!(gate.try_fire(0.0), Some(1));
        assert_eq!(gate.try_fire(50.0), None);
        assert_eq!(gate.try_fire(250.0), Some(2));
    }

    #[test]
    fn zero_max_triggers_means_unlimited() {
        let mut gate = TriggerGate::new(SentinelConfig {
            debounce_ms: 0.0,
            max_triggers: 0,
        });
        for i in 1..=10 {
            assert_eq!(gate.try_fire(i as f64), Some(i));
        }
    }

    #[test]
    fn reset_clears_count_and_debounce_window() {
        let mut gate = TriggerGate::new(SentinelConfig {
            debounce_ms: 1000.0,
            max_triggers: 1,
        });
        assert_eq!(gate.try_fire(0.0), Some(1));
        assert_eq!(gate.try_fire(1.0), None);
        gate.reset();
        assert_eq!(gate.try_fire(1.0), Some(1));
    }
}
