//! Viewport Controller (spec §4.5): owns scroll position, container
//! measurement, the computed visible range, and the measured-size cache.
//!
//! This module holds the *pure* state the teacher crate's `ScrollManager`
//! held (compare `examples/WorldSEnder-yew-virtualized/src/lib.rs`'s
//! `generate_scroll_state`/`regenerate_scroll_state`) generalized onto the
//! full geometry contract from spec §4.1: overscan, boundary resistance,
//! scrollbar metrics, and speed-adaptive buffering. DOM wiring (the wheel
//! listener, the scrollbar track/thumb elements, the `ResizeObserver`) is
//! driven from the `VirtualList` component in `lib.rs`, exactly as the
//! teacher crate keeps `ScrollManager` DOM-free and lets `VirtualList`'s
//! `Component` methods own the `NodeRef`s and listeners.

use crate::event_bus::{Event, EventBus};
use crate::geometry::{self, ItemRange, ScrollAlignment, ScrollDirection, ScrollbarMetrics};
use crate::orientation::Orientation;
use crate::speed::{SpeedConfig, SpeedTracker, Strategy};
use std::collections::BTreeMap;

/// Tunables for a [`Viewport`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportConfig {
    /// Items rendered beyond the visible range on each side (spec
    /// "Overscan").
    pub overscan: usize,
    /// Fallback size (px) for any index without a measured size yet.
    pub initial_estimated_item_size: f64,
    /// Wheel-delta multiplier (spec §4.5 step 2: `sensitivity`).
    pub sensitivity: f64,
    /// Resistance `[0,1]` applied to over-scroll past `[0, maxScroll]`
    /// during boundary animations (spec §4.1 `applyBoundaryResistance`).
    pub boundary_resistance: f64,
    /// Scrollbar fade timeout, in milliseconds (spec §4.5 `FADE_TIMEOUT`).
    pub fade_timeout_ms: u32,
}

impl Default for ViewportConfig {
    fn default() -> Self {
        Self {
            overscan: 3,
            initial_estimated_item_size: 50.0,
            sensitivity: 1.0,
            boundary_resistance: 0.5,
            fade_timeout_ms: 600,
        }
    }
}

/// The pure scroll/geometry core of the viewport (spec: Data Model,
/// "Viewport State"). Exclusively owns `scrollPosition`, `measuredSizes`,
/// and the derived `visibleRange`/`totalVirtualSize` (spec "Ownership").
pub struct Viewport {
    config: ViewportConfig,
    orientation: Orientation,
    events: EventBus,
    speed: SpeedTracker,

    scroll_position: f64,
    container_size: f64,
    estimated_item_size: f64,
    measured_sizes: BTreeMap<usize, f64>,

    visible_range: ItemRange,
    total_virtual_size: f64,
    last_direction: ScrollDirection,
}

impl Viewport {
    /// Construct a viewport at rest, with no container size yet.
    pub fn new(config: ViewportConfig, orientation: Orientation, events: EventBus) -> Self {
        let estimated_item_size = config.initial_estimated_item_size;
        Self {
            config,
            orientation,
            events,
            speed: SpeedTracker::new(SpeedConfig::default()),
            scroll_position: 0.0,
            container_size: 0.0,
            estimated_item_size,
            measured_sizes: BTreeMap::new(),
            visible_range: ItemRange::EMPTY,
            total_virtual_size: 0.0,
            last_direction: ScrollDirection::Neutral,
        }
    }

    /// Current orientation.
    pub fn orientation(&self) -> Orientation { self.orientation }

    /// Current scroll position, in pixels.
    pub fn scroll_position(&self) -> f64 { self.scroll_position }

    /// Current computed visible range (including overscan).
    pub fn visible_range(&self) -> ItemRange { self.visible_range }

    /// Current exact total virtual size, in pixels.
    pub fn total_virtual_size(&self) -> f64 { self.total_virtual_size }

    /// Current estimated item size, recomputed from measured sizes as they
    /// accumulate (spec §4.5 "Measured size update").
    pub fn estimated_item_size(&self) -> f64 { self.estimated_item_size }

    /// Measured sizes recorded so far, keyed by item index. Used by the host
    /// component to position individual rendered items precisely rather
    /// than by the (possibly stale) estimate alone.
    pub fn measured_sizes(&self) -> &BTreeMap<usize, f64> { &self.measured_sizes }

    /// Pixel offset to translate the items container by, so that the first
    /// visible item lands at the viewport's top/left edge.
    pub fn container_position(&self) -> f64 {
        geometry::container_position(self.visible_range.start, &self.measured_sizes, self.estimated_item_size)
    }

    /// Highest allowed scroll position for the current geometry.
    pub fn max_scroll(&self) -> f64 {
        (self.total_virtual_size - self.container_size).max(0.0)
    }

    /// Update the container's measured size (spec §4.5: ResizeObserver on
    /// the component element), recomputing geometry against `total_items`.
    pub fn set_container_size(&mut self, size: f64, total_items: usize, now: f64) {
        self.container_size = size;
        self.recompute(total_items, now);
    }

    /// Directly set the authoritative item count changed (e.g. after a
    /// collection `setItems`/`setTotalItems`), recomputing geometry.
    pub fn notify_total_items_changed(&mut self, total_items: usize, now: f64) {
        self.recompute(total_items, now);
    }

    /// Handle a single wheel tick (spec §4.5 "Scroll loop", steps 2-4).
    /// `raw_delta` is `event.deltaY` or `event.deltaX` depending on
    /// orientation, `delta_time` is milliseconds since the previous tick.
    /// Returns `true` if the visible range changed as a result.
    pub fn handle_wheel(&mut self, raw_delta: f64, delta_time: f64, total_items: usize, now: f64) -> bool {
        let delta = raw_delta * self.config.sensitivity;
        self.speed.record(delta, delta_time);

        let requested = self.scroll_position + delta;
        let resisted = geometry::apply_boundary_resistance(requested, self.max_scroll(), self.config.boundary_resistance);
        let clamped = resisted.clamp(0.0, self.max_scroll());

        self.last_direction = match self.speed.direction() {
            d if d > 0 => ScrollDirection::Forward,
            d if d < 0 => ScrollDirection::Backward,
            _ => ScrollDirection::Neutral,
        };

        self.set_scroll_position(clamped, total_items, now)
    }

    /// `scrollToIndex(i, alignment)` (spec §4.5): compute the target
    /// position via geometry, then jump there directly (no resistance — a
    /// programmatic jump is not a boundary overscroll). `geometry`'s own
    /// per-alignment clamp is authoritative here; this must not additionally
    /// clamp to `max_scroll()`, or a `Start`-aligned jump to the last item
    /// (spec §8 S1) would get pulled back to a container-filling position.
    pub fn scroll_to_index(&mut self, index: usize, alignment: ScrollAlignment, total_items: usize, now: f64) -> bool {
        let target = geometry::scroll_position_for_index(
            index,
            alignment,
            self.container_size,
            self.estimated_item_size,
            &self.measured_sizes,
            total_items,
        );
        self.commit_scroll_position(target.max(0.0), total_items, now)
    }

    /// Directly set the scroll position (e.g. from a scrollbar drag),
    /// clamping to `[0, maxScroll]` (spec invariant 2).
    pub fn set_scroll_position(&mut self, position: f64, total_items: usize, now: f64) -> bool {
        let clamped = position.clamp(0.0, self.max_scroll());
        self.commit_scroll_position(clamped, total_items, now)
    }

    /// Install an already-resolved scroll position, emit the change events,
    /// and recompute the visible range. Callers are responsible for clamping
    /// to whatever bound is correct for their case.
    fn commit_scroll_position(&mut self, position: f64, total_items: usize, now: f64) -> bool {
        let changed_position = position != self.scroll_position;
        self.scroll_position = position;

        if changed_position {
            self.events.emit(Event::ScrollPositionChanged { position }, Some(position), now);
        }

        let range_changed = self.recompute(total_items, now);
        changed_position || range_changed
    }

    /// Recompute `visible_range`/`total_virtual_size` from current state,
    /// emitting `virtual:range:changed` if the range moved. Spec §5
    /// ordering guarantee: a `virtual:range:changed` always follows the
    /// `scroll:position:changed` that caused it, in the same turn — callers
    /// that go through `set_scroll_position`/`handle_wheel` get this for
    /// free since both call `recompute` after emitting the position event.
    fn recompute(&mut self, total_items: usize, now: f64) -> bool {
        self.total_virtual_size = geometry::total_virtual_size(total_items, self.estimated_item_size, &self.measured_sizes);

        let new_range = geometry::visible_range(
            self.scroll_position,
            self.container_size,
            self.estimated_item_size,
            total_items,
            self.config.overscan,
            &self.measured_sizes,
        );

        let changed = new_range != self.visible_range;
        self.visible_range = new_range;
        if changed {
            self.events.emit(
                Event::VirtualRangeChanged { start: new_range.start, end: new_range.end },
                Some(self.scroll_position),
                now,
            );
        }
        changed
    }

    /// Record a measured size for `index` (spec §4.5: "Schedule
    /// measureItemSize on next animation frame"), recompute the estimated
    /// item size as the mean of all measured sizes, and re-derive total
    /// virtual size (spec §4.5 "Measured size update").
    pub fn measure_item(&mut self, index: usize, size: f64, total_items: usize, now: f64) {
        self.measured_sizes.insert(index, size);
        let mean = self.measured_sizes.values().sum::<f64>() / self.measured_sizes.len() as f64;
        self.estimated_item_size = mean.round();
        self.recompute(total_items, now);
        self.events.emit(Event::DimensionsChanged { estimated_item_size: self.estimated_item_size }, Some(self.scroll_position), now);
    }

    /// Custom-scrollbar thumb geometry for a track of `track_size` pixels.
    pub fn scrollbar_metrics(&self, track_size: f64) -> ScrollbarMetrics {
        geometry::scrollbar_metrics(self.scroll_position, self.total_virtual_size, self.container_size, track_size)
    }

    /// Map a scrollbar drag delta (pixels along the track) onto a scroll
    /// position (spec §4.5 "Scrollbar drag": `(delta in main axis) /
    /// trackSize * maxScroll`).
    pub fn scroll_position_for_drag_delta(&self, delta: f64, track_size: f64) -> f64 {
        if track_size <= 0.0 {
            return self.scroll_position;
        }
        self.scroll_position + (delta / track_size) * self.max_scroll()
    }

    /// The loading guidance the collection should act on for the current
    /// scroll speed (spec §4.2 output, consumed by the collection per §9's
    /// resolution that speed classification is a viewport concern).
    pub fn loading_guidance(&self) -> crate::speed::LoadingGuidance {
        self.speed.guidance(self.estimated_item_size)
    }

    /// Current speed-classified strategy, exposed for diagnostics/tests.
    pub fn speed_strategy(&self) -> Strategy { self.speed.strategy() }

    /// Direction bias to feed into [`crate::geometry::buffer_ranges`]; only
    /// "significant" direction changes (spec §4.2) flip the bias away from
    /// neutral.
    pub fn buffer_direction(&self) -> ScrollDirection {
        if self.speed.significant_direction_change() || self.last_direction != ScrollDirection::Neutral {
            self.last_direction
        } else {
            ScrollDirection::Neutral
        }
    }

    /// Reset to the top, clearing measured sizes (used when the list's
    /// orientation or container changes in a way that invalidates prior
    /// measurements).
    pub fn reset(&mut self) {
        self.scroll_position = 0.0;
        self.measured_sizes.clear();
        self.estimated_item_size = self.config.initial_estimated_item_size;
        self.visible_range = ItemRange::EMPTY;
        self.total_virtual_size = 0.0;
        self.speed.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport() -> Viewport {
        let config = ViewportConfig {
            overscan: 2,
            initial_estimated_item_size: 50.0,
            ..ViewportConfig::default()
        };
        Viewport::new(config, Orientation::Vertical, EventBus::new())
    }

    #[test]
    fn s1_initial_and_scrolled_ranges() {
        let mut vp = viewport();
        vp.set_container_size(500.0, 1_000_000, 0.0);
        assert_eq!(vp.visible_range(), ItemRange::new(0, 11));

        vp.scroll_to_index(999_999, ScrollAlignment::Start, 1_000_000, 0.0);
        assert_eq!(vp.scroll_position(), 49_999_950.0);
        assert_eq!(vp.visible_range(), ItemRange::new(999_997, 999_999));
    }

    #[test]
    fn scroll_position_stays_within_bounds() {
        let mut vp = viewport();
        vp.set_container_size(500.0, 100, 0.0);
        vp.handle_wheel(-1000.0, 16.0, 100, 0.0);
        assert_eq!(vp.scroll_position(), 0.0);
        vp.handle_wheel(1_000_000.0, 16.0, 100, 0.0);
        assert!(vp.scroll_position() <= vp.max_scroll());
    }

    #[test]
    fn range_changed_event_follows_position_changed_in_emit_order() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let events = EventBus::new();
        let order = Rc::new(RefCell::new(Vec::new()));
        {
            let order = order.clone();
            events.subscribe(move |envelope| {
                order.borrow_mut().push(match envelope.event {
                    Event::ScrollPositionChanged { .. } => "position",
                    Event::VirtualRangeChanged { .. } => "range",
                    _ => "other",
                });
            });
        }
        let mut vp = Viewport::new(ViewportConfig::default(), Orientation::Vertical, events);
        vp.set_container_size(500.0, 1000, 0.0);
        order.borrow_mut().clear();
        vp.handle_wheel(500.0, 16.0, 1000, 1.0);
        let order = order.borrow();
        let pos_idx = order.iter().position(|e| *e == "position");
        let range_idx = order.iter().position(|e| *e == "range");
        if let (Some(p), Some(r)) = (pos_idx, range_idx) {
            assert!(p < r);
        }
    }

    #[test]
    fn measuring_items_updates_estimated_size() {
        let mut vp = viewport();
        vp.set_container_size(500.0, 100, 0.0);
        vp.measure_item(0, 80.0, 100, 0.0);
        vp.measure_item(1, 120.0, 100, 0.0);
        assert_eq!(vp.estimated_item_size(), 100.0);
    }
}
