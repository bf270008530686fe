//! A virtualized list engine for Yew: range-based lazy loading, element
//! recycling, and placeholder synthesis for bounded-memory scrolling over
//! arbitrarily large sequences.
//!
//! [`VirtualList`] is the public composition root. It wires the engine's
//! modules together in a fixed dependency order (element -> events ->
//! orientation -> viewport -> renderer -> pool -> collection -> intersection
//! triggers -> public API), each stage built from the previous and
//! contributing a disposer to the list the component tears down on
//! `destroy`.

#![deny(missing_docs, bare_trait_objects, anonymous_parameters, elided_lifetimes_in_paths)]
#![warn(missing_debug_implementations)]

mod resize_observer;

pub mod collection;
pub mod error;
pub mod event_bus;
pub mod form;
pub mod geometry;
pub mod intersection;
pub mod orientation;
pub mod pool;
pub mod renderer;
pub mod speed;
pub mod viewport;

use core::fmt;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use gloo_timers::callback::Timeout;
use wasm_bindgen::prelude::{wasm_bindgen, Closure};
use wasm_bindgen::JsCast;
use web_sys::{Document, Element, HtmlElement, MouseEvent, WheelEvent};
use yew::prelude::*;

use collection::{Collection, CollectionConfig, DataAdapter, ListItem, PaginationStrategy};
use event_bus::{Event, EventBus, TriggerDirection};
use geometry::ItemRange;
use intersection::{IntersectionTrigger, SentinelConfig};
use orientation::{CrossAxisAlign, Orientation};
use pool::{ElementPool, PoolConfig};
use renderer::{ItemMarkup, ItemView, Renderer, Template};
use resize_observer::{ObservedElement, ResizeObserver};
use viewport::{Viewport, ViewportConfig};

/// Structural tag used to stamp the virtual index onto a rendered wrapper
/// element, correlating a `ResizeObserver` callback with the index it fired
/// for without a side table keyed by `web_sys::Element` identity.
#[wasm_bindgen]
extern "C" {
    type IndexedElementDuck;
    #[wasm_bindgen(method, getter, structural, js_name = __rangeview_index)]
    fn rangeview_index(this: &IndexedElementDuck) -> Option<usize>;
    #[wasm_bindgen(method, setter, structural, js_name = __rangeview_index)]
    fn set_rangeview_index(this: &IndexedElementDuck, index: usize);
}

fn tag_index(el: &Element, index: usize) {
    el.unchecked_ref::<IndexedElementDuck>().set_rangeview_index(index);
}

fn tagged_index(el: &Element) -> Option<usize> {
    el.unchecked_ref::<IndexedElementDuck>().rangeview_index()
}

/// Current time in milliseconds, the single clock source every module below
/// takes as an explicit parameter rather than reading itself (spec: modules
/// own geometry/bookkeeping, never the clock).
fn now_ms() -> f64 {
    web_sys::window().and_then(|w| w.performance()).map(|p| p.now()).unwrap_or(0.0)
}

/// A shared data adapter, wrapped so it can live in [`VirtualListProps`]
/// (Yew properties must be `PartialEq`; an arbitrary `A` usually isn't, so
/// equality here is `Rc` identity, mirroring how the teacher crate's
/// [`ItemGenerator`](struct@ItemGenerator) in its original form compares
/// function pointers by identity rather than value).
pub struct Adapter<A>(Rc<A>);

impl<A> Adapter<A> {
    /// Wrap an adapter instance.
    pub fn new(adapter: A) -> Self {
        Self(Rc::new(adapter))
    }
}

impl<A> Clone for Adapter<A> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<A> PartialEq for Adapter<A> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<A> fmt::Debug for Adapter<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Adapter").finish_non_exhaustive()
    }
}

impl<A> From<A> for Adapter<A> {
    fn from(adapter: A) -> Self {
        Self::new(adapter)
    }
}

/// A shared [`Template`], wrapped the same way [`Adapter`] wraps the data
/// adapter, so it can live in [`VirtualListProps`] despite `Rc<dyn Fn(..)>`
/// not being `PartialEq` on its own.
pub struct ItemTemplate<T: ListItem>(Template<T>);

impl<T: ListItem> ItemTemplate<T> {
    /// Wrap a template function.
    pub fn new(template: impl Fn(ItemView<'_, T>, usize) -> ItemMarkup + 'static) -> Self {
        Self(Rc::new(template))
    }
}

impl<T: ListItem> Clone for ItemTemplate<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: ListItem> PartialEq for ItemTemplate<T> {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl<T: ListItem> fmt::Debug for ItemTemplate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemTemplate").finish_non_exhaustive()
    }
}

/// Properties for a [`VirtualList`].
#[derive(Properties)]
pub struct VirtualListProps<T, A>
where
    T: ListItem,
    A: DataAdapter<T> + 'static,
{
    /// The data source. Shared as an `Rc` so the host application can hold
    /// onto the same instance outside the component (e.g. to call
    /// `setTotalItems`-equivalent methods is not exposed; mutation happens
    /// only through the list itself).
    pub adapter: Adapter<A>,
    /// Renders one item (real or placeholder) to markup.
    pub template: ItemTemplate<T>,
    /// Main scroll axis. Defaults to vertical.
    #[prop_or(Orientation::Vertical)]
    pub orientation: Orientation,
    /// Viewport tunables (overscan, sensitivity, boundary resistance, ...).
    #[prop_or_default]
    pub viewport: ViewportConfig,
    /// Element pool tunables (capacity, selection/reuse policy, cleanup).
    #[prop_or_default]
    pub pool: PoolConfig,
    /// Pagination strategy dispatched against `adapter`.
    #[prop_or(PaginationStrategy::Offset)]
    pub strategy: PaginationStrategy,
    /// Items per loaded range. `None` derives a size from viewport geometry
    /// once the container is first measured (spec §4.4 "Range-size
    /// selection").
    #[prop_or_default]
    pub range_size: Option<usize>,
    /// Seeds `Collection::set_total_items` at construction, for "massive
    /// list" bootstrapping (e.g. a server-reported count known up front).
    #[prop_or_default]
    pub initial_total_items: usize,
    /// Optional intersection-based pagination sentinels; `None` disables
    /// the plugin entirely (spec §4.8, optional).
    #[prop_or_default]
    pub intersection: Option<(Vec<TriggerDirection>, SentinelConfig)>,
    /// Classes applied to the scrolling viewport element itself.
    #[prop_or_default]
    pub classes: Classes,
    /// Classes applied to each item's pooled wrapper element.
    #[prop_or_default]
    pub item_classes: Classes,
}

impl<T, A> PartialEq for VirtualListProps<T, A>
where
    T: ListItem,
    A: DataAdapter<T> + 'static,
{
    fn eq(&self, other: &Self) -> bool {
        self.adapter == other.adapter
            && self.template == other.template
            && self.orientation == other.orientation
            && self.viewport == other.viewport
            && self.pool == other.pool
            && self.strategy == other.strategy
            && self.range_size == other.range_size
            && self.initial_total_items == other.initial_total_items
            && self.intersection == other.intersection
            && self.classes == other.classes
            && self.item_classes == other.item_classes
    }
}

impl<T, A> fmt::Debug for VirtualListProps<T, A>
where
    T: ListItem,
    A: DataAdapter<T> + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualListProps")
            .field("orientation", &self.orientation)
            .field("viewport", &self.viewport)
            .field("pool", &self.pool)
            .field("strategy", &self.strategy)
            .field("range_size", &self.range_size)
            .field("initial_total_items", &self.initial_total_items)
            .finish_non_exhaustive()
    }
}

/// Messages driving [`VirtualList`]. Most don't trigger a Yew re-render:
/// the scrolling surface is managed imperatively (direct `web_sys` writes
/// into element styles acquired from the [`ElementPool`]), the same way a
/// virtualization engine in any framework has to bypass its own diffing for
/// the high-frequency scroll path.
pub enum VirtualListMsg {
    /// A wheel event on the viewport.
    Wheel(WheelEvent),
    /// The container's measured main-axis size changed.
    ContainerResized(f64),
    /// A rendered item's measured main-axis size changed.
    ItemResized(usize, f64),
    /// An async `load_missing_ranges` call finished; resync rendering.
    RangesSettled,
    /// Scrollbar thumb drag started at this main-axis client position.
    ScrollbarDown(f64),
    /// Scrollbar thumb dragged to this main-axis client position.
    ScrollbarMove(f64),
    /// Scrollbar thumb drag released.
    ScrollbarUp,
    /// A sentinel fired (spec §4.8).
    LoadMore(TriggerDirection),
    /// The `Defer` strategy's debounce elapsed; reassess and load.
    DeferredLoad,
}

/// One currently-attached item wrapper: the pooled element plus the
/// `ResizeObserver` subscription measuring it.
struct Rendered {
    element: Element,
    _observed: ObservedElement,
}

/// Bookkeeping for an in-progress scrollbar thumb drag.
struct Drag {
    start_client: f64,
    start_scroll: f64,
}

const ITEM_ELEMENT_TYPE: &str = "item";

/// The virtualized list component (spec §2 "Composition"). Generic over the
/// item payload `T` and the injected [`DataAdapter`] `A`.
pub struct VirtualList<T, A>
where
    T: ListItem,
    A: DataAdapter<T> + 'static,
{
    events: EventBus,
    viewport: Viewport,
    pool: ElementPool,
    collection: Rc<RefCell<Collection<T, A>>>,
    renderer: Renderer<T>,
    intersection: Option<IntersectionTrigger>,

    rendered: HashMap<usize, Rendered>,
    drag: Option<Drag>,
    scrollbar_visible: bool,
    fade_timeout: Option<Timeout>,
    loads_timeout: Option<Timeout>,

    container_ref: NodeRef,
    items_ref: NodeRef,
    thumb_ref: NodeRef,
    _container_observed: Option<ObservedElement>,
    _container_observer: Option<ResizeObserver>,
    disposers: Vec<Box<dyn FnOnce()>>,
}

impl<T, A> Component for VirtualList<T, A>
where
    T: ListItem,
    A: DataAdapter<T> + 'static,
{
    type Message = VirtualListMsg;
    type Properties = VirtualListProps<T, A>;

    fn create(ctx: &Context<Self>) -> Self {
        let props = ctx.props();

        // element -> events
        let document = web_sys::window().expect("window").document().expect("document");
        let events = EventBus::new();

        // -> orientation
        let orientation = props.orientation;

        // -> viewport
        let mut viewport = Viewport::new(props.viewport, orientation, events.clone());

        // -> renderer
        let renderer = Renderer::new(props.template.0.clone());

        // -> pool
        let pool = ElementPool::new(document, props.pool, now_ms);

        // -> collection
        let range_size = props.range_size.unwrap_or_else(|| {
            collection::derive_range_size(0.0, props.viewport.initial_estimated_item_size, props.viewport.overscan)
        });
        let collection_config = CollectionConfig { range_size, strategy: props.strategy };
        let collection = Collection::from_shared(props.adapter.0.clone(), collection_config, events.clone())
            .expect("adapter does not implement the configured pagination strategy");
        let collection = Rc::new(RefCell::new(collection));

        let now = now_ms();
        if props.initial_total_items > 0 {
            collection.borrow_mut().set_total_items(props.initial_total_items, now);
            viewport.notify_total_items_changed(props.initial_total_items, now);
        }

        let mut disposers: Vec<Box<dyn FnOnce()>> = Vec::new();
        {
            let events = events.clone();
            disposers.push(Box::new(move || events.clear()));
        }
        {
            let pool = pool.clone();
            disposers.push(Box::new(move || pool.clear()));
        }

        // Re-render/resync whenever the engine reports a range settling
        // asynchronously, or a sentinel fires pagination (spec §4.8).
        let link = ctx.link().clone();
        let _range_settled_sub = events.subscribe(move |envelope| {
            if let Event::RangeLoaded { .. } | Event::RangeFailed { .. } | Event::PlaceholdersReplaced { .. } = envelope.event {
                link.send_message(VirtualListMsg::RangesSettled);
            }
        });

        Self {
            events,
            viewport,
            pool,
            collection,
            renderer,
            intersection: None,
            rendered: HashMap::new(),
            drag: None,
            scrollbar_visible: false,
            fade_timeout: None,
            loads_timeout: None,
            container_ref: NodeRef::default(),
            items_ref: NodeRef::default(),
            thumb_ref: NodeRef::default(),
            _container_observed: None,
            _container_observer: None,
            disposers,
        }
    }

    fn update(&mut self, ctx: &Context<Self>, msg: Self::Message) -> bool {
        let props = ctx.props();
        let now = now_ms();
        let total_items = self.collection.borrow().total_items();

        match msg {
            VirtualListMsg::Wheel(event) => {
                event.prevent_default();
                let raw_delta = match props.orientation {
                    Orientation::Vertical => event.delta_y(),
                    Orientation::Horizontal => event.delta_x(),
                };
                let changed = self.viewport.handle_wheel(raw_delta, 16.0, total_items, now);
                self.show_scrollbar();
                if changed {
                    self.sync(ctx);
                }
                self.kick_off_loads(ctx);
                false
            }
            VirtualListMsg::ContainerResized(size) => {
                self.viewport.set_container_size(size, total_items, now);
                self.sync(ctx);
                self.kick_off_loads(ctx);
                false
            }
            VirtualListMsg::ItemResized(index, size) => {
                self.viewport.measure_item(index, size, total_items, now);
                self.sync(ctx);
                false
            }
            VirtualListMsg::RangesSettled => {
                self.sync(ctx);
                false
            }
            VirtualListMsg::ScrollbarDown(client_pos) => {
                self.drag = Some(Drag {
                    start_client: client_pos,
                    start_scroll: self.viewport.scroll_position(),
                });
                false
            }
            VirtualListMsg::ScrollbarMove(client_pos) => {
                if let Some(drag) = &self.drag {
                    let delta = client_pos - drag.start_client;
                    let track_size = self.track_size();
                    let position = if track_size > 0.0 {
                        drag.start_scroll + (delta / track_size) * self.viewport.max_scroll()
                    } else {
                        drag.start_scroll
                    };
                    self.viewport.set_scroll_position(position, total_items, now);
                    self.sync(ctx);
                    self.kick_off_loads(ctx);
                }
                false
            }
            VirtualListMsg::ScrollbarUp => {
                self.drag = None;
                false
            }
            VirtualListMsg::LoadMore(_direction) => {
                self.kick_off_loads(ctx);
                false
            }
            VirtualListMsg::DeferredLoad => {
                self.kick_off_loads(ctx);
                false
            }
        }
    }

    fn changed(&mut self, ctx: &Context<Self>, _old_props: &Self::Properties) -> bool {
        let props = ctx.props();
        let now = now_ms();
        self.viewport = Viewport::new(props.viewport, props.orientation, self.events.clone());
        self.renderer = Renderer::new(props.template.0.clone());
        if let Some(el) = self.container_ref.cast::<HtmlElement>() {
            let size = match props.orientation {
                Orientation::Vertical => el.client_height(),
                Orientation::Horizontal => el.client_width(),
            } as f64;
            let total_items = self.collection.borrow().total_items();
            self.viewport.set_container_size(size, total_items, now);
        }
        self.sync(ctx);
        true
    }

    fn view(&self, ctx: &Context<Self>) -> Html {
        let props = ctx.props();
        let onwheel = ctx.link().callback(VirtualListMsg::Wheel);
        let link = ctx.link().clone();
        let orientation = props.orientation;
        let onmousedown_thumb = Callback::from(move |e: MouseEvent| {
            e.prevent_default();
            let pos = match orientation {
                Orientation::Vertical => e.client_y(),
                Orientation::Horizontal => e.client_x(),
            } as f64;
            link.send_message(VirtualListMsg::ScrollbarDown(pos));
        });

        html! {
            <div
                ref={self.container_ref.clone()}
                class={classes!("rangeview-viewport", props.classes.clone())}
                role="list"
                style="position:relative;overflow:hidden;width:100%;height:100%;"
                onwheel={onwheel}
            >
                <div
                    ref={self.items_ref.clone()}
                    class={classes!("rangeview-items", props.item_classes.clone())}
                    style="position:relative;width:100%;height:100%;"
                ></div>
                <div
                    class={"rangeview-scrollbar-track"}
                    style="position:absolute;top:0;right:0;width:8px;height:100%;"
                >
                    <div
                        ref={self.thumb_ref.clone()}
                        class={"rangeview-scrollbar-thumb"}
                        style="position:absolute;width:100%;"
                        onmousedown={onmousedown_thumb}
                    ></div>
                </div>
            </div>
        }
    }

    fn rendered(&mut self, ctx: &Context<Self>, first_render: bool) {
        if !first_render {
            return;
        }
        let props = ctx.props();
        let now = now_ms();

        let Some(container) = self.container_ref.cast::<Element>() else { return };
        let window = web_sys::window().expect("window");
        let document: Document = window.document().expect("document");

        let html_el: HtmlElement = container.clone().unchecked_into();
        let size = match props.orientation {
            Orientation::Vertical => html_el.client_height(),
            Orientation::Horizontal => html_el.client_width(),
        } as f64;
        let total_items = self.collection.borrow().total_items();
        self.viewport.set_container_size(size, total_items, now);

        // ResizeObserver wiring (supplemented feature: every rendered item
        // is observed, not just the container).
        let link = ctx.link().clone();
        let orientation = props.orientation;
        let container_for_cb = container.clone();
        let observer = ResizeObserver::new(move |entries| {
            for entry in entries {
                let target = entry.target();
                let rect = entry.content_rect();
                let size = match orientation {
                    Orientation::Vertical => rect.height(),
                    Orientation::Horizontal => rect.width(),
                };
                if target == container_for_cb {
                    link.send_message(VirtualListMsg::ContainerResized(size));
                } else if let Some(index) = tagged_index(&target) {
                    link.send_message(VirtualListMsg::ItemResized(index, size));
                }
            }
        });
        let observed = observer.observe(container.clone());
        self._container_observer = Some(observer);
        self._container_observed = Some(observed);

        // Scrollbar drag: window-level listeners so the drag tracks the
        // pointer even once it leaves the thumb element.
        let link = ctx.link().clone();
        let orientation_for_move = props.orientation;
        let move_closure = Closure::<dyn FnMut(MouseEvent)>::wrap(Box::new(move |e: MouseEvent| {
            let pos = match orientation_for_move {
                Orientation::Vertical => e.client_y(),
                Orientation::Horizontal => e.client_x(),
            } as f64;
            link.send_message(VirtualListMsg::ScrollbarMove(pos));
        }));
        let _ = window.add_event_listener_with_callback("mousemove", move_closure.as_ref().unchecked_ref());

        let link = ctx.link().clone();
        let up_closure = Closure::<dyn FnMut(MouseEvent)>::wrap(Box::new(move |_e: MouseEvent| {
            link.send_message(VirtualListMsg::ScrollbarUp);
        }));
        let _ = window.add_event_listener_with_callback("mouseup", up_closure.as_ref().unchecked_ref());

        {
            let window = window.clone();
            let move_target: web_sys::EventTarget = window.clone().into();
            let up_target: web_sys::EventTarget = window.into();
            self.disposers.push(Box::new(move || {
                let _ = move_target.remove_event_listener_with_callback("mousemove", move_closure.as_ref().unchecked_ref());
                let _ = up_target.remove_event_listener_with_callback("mouseup", up_closure.as_ref().unchecked_ref());
            }));
        }

        // Intersection triggers (spec §4.8, optional).
        if let Some((edges, config)) = &props.intersection {
            let trigger = IntersectionTrigger::mount(&container, &document, edges, *config, self.events.clone(), Rc::new(now_ms));
            self.intersection = Some(trigger);
        }

        self.sync(ctx);
        self.kick_off_loads(ctx);
    }

    fn destroy(&mut self, _ctx: &Context<Self>) {
        // Torn down in roughly reverse dependency order (spec §5: "A
        // destroyed list MUST disconnect observers, clear the element pool,
        // detach sentinels, clear event bus listeners").
        if let Some(trigger) = self.intersection.take() {
            trigger.destroy();
        }
        for (_, rendered) in self.rendered.drain() {
            self.pool.release(rendered.element, ITEM_ELEMENT_TYPE, now_ms());
        }
        while let Some(dispose) = self.disposers.pop() {
            dispose();
        }
        self.pool.clear();
        self.events.emit(Event::Destroyed, None, now_ms());
        self.events.clear();
    }
}

impl<T, A> VirtualList<T, A>
where
    T: ListItem,
    A: DataAdapter<T> + 'static,
{
    /// Recompute visible range/geometry-dependent DOM state: item wrapper
    /// acquire/release/position, container transform, and scrollbar metrics
    /// (spec §4.5 "Rendering" bullets).
    fn sync(&mut self, ctx: &Context<Self>) {
        let props = ctx.props();
        let now = now_ms();
        let visible = self.viewport.visible_range();
        let total_items = self.collection.borrow().total_items();

        self.sync_items(props, visible, total_items, now);
        self.sync_scrollbar();

        if let Some(trigger) = &self.intersection {
            trigger.reposition(props.orientation, self.viewport.total_virtual_size());
        }
    }

    /// Diff `self.rendered` against the current visible range, releasing
    /// evicted wrappers back to the pool and acquiring/positioning new ones
    /// (spec §4.3 "Rendering loop"). Offsets are accumulated in a single
    /// ascending pass starting from `viewport.container_position()`, the
    /// same pixel offset the viewport itself uses to translate the items
    /// container -- O(visible range) rather than re-summing from index 0
    /// per item.
    fn sync_items(&mut self, props: &VirtualListProps<T, A>, visible: ItemRange, total_items: usize, now: f64) {
        let Some(items_container) = self.items_ref.cast::<Element>() else { return };

        let wanted: Vec<usize> = if visible.is_empty_range() {
            Vec::new()
        } else {
            (visible.start..=visible.end.min(total_items.saturating_sub(1))).collect()
        };
        let wanted_set: std::collections::HashSet<usize> = wanted.iter().copied().collect();

        let stale: Vec<usize> = self.rendered.keys().copied().filter(|i| !wanted_set.contains(i)).collect();
        for index in stale {
            if let Some(entry) = self.rendered.remove(&index) {
                if let Some(parent) = entry.element.parent_node() {
                    let _ = parent.remove_child(&entry.element);
                }
                self.pool.release(entry.element, ITEM_ELEMENT_TYPE, now);
            }
        }

        let total_virtual_size = self.viewport.total_virtual_size();
        let mut offset = self.viewport.container_position();
        for index in wanted {
            let size = self.item_size(index);

            if let Some(entry) = self.rendered.get(&index) {
                props.orientation.position_item_element(&entry.element, offset, size, total_virtual_size, false, CrossAxisAlign::Stretch, None);
            } else {
                let slot = self.collection.borrow().slot(index).clone();
                if let Some(view) = renderer::ItemView::from_slot(&slot) {
                    let markup = self.renderer.render_item(view, index);
                    if let Some(wrapper) = self.pool.acquire(ITEM_ELEMENT_TYPE, now, Some(size), "div") {
                        wrapper.set_class_name(&props.item_classes.to_string());
                        apply_markup(&wrapper, markup);
                        tag_index(&wrapper, index);
                        let _ = wrapper.set_attribute("data-item-index", &index.to_string());
                        let _ = wrapper.set_attribute("role", "listitem");
                        let _ = items_container.append_child(&wrapper);
                        props.orientation.position_item_element(&wrapper, offset, size, total_virtual_size, false, CrossAxisAlign::Stretch, None);

                        if let Some(observer) = &self._container_observer {
                            let observed = observer.observe(wrapper.clone());
                            self.rendered.insert(index, Rendered { element: wrapper, _observed: observed });
                        }
                    }
                }
            }

            offset += size;
        }
    }

    fn item_size(&self, index: usize) -> f64 {
        self.viewport.measured_sizes().get(&index).copied().unwrap_or_else(|| self.viewport.estimated_item_size())
    }

    fn track_size(&self) -> f64 {
        self.thumb_ref
            .cast::<HtmlElement>()
            .and_then(|t| t.parent_element())
            .map(|p| p.client_height() as f64)
            .unwrap_or(0.0)
    }

    fn sync_scrollbar(&self) {
        let track_size = self.track_size();
        if track_size <= 0.0 {
            return;
        }
        let metrics = self.viewport.scrollbar_metrics(track_size);
        if let Some(thumb) = self.thumb_ref.cast::<HtmlElement>() {
            let style = thumb.style();
            let _ = style.set_property("height", &format!("{}px", metrics.thumb_size));
            let _ = style.set_property("top", &format!("{}px", metrics.thumb_position));
            let _ = style.set_property("opacity", if self.scrollbar_visible { "1" } else { "0" });
        }
    }

    fn show_scrollbar(&mut self) {
        self.scrollbar_visible = true;
        self.sync_scrollbar();
    }

    /// Spawn the async range-load pass for the current visible range plus
    /// the Speed Tracker's prefetch buffer (spec §2/§4.2: scroll speed drives
    /// loading strategy), then synthesize placeholders for whatever remains
    /// empty so scrolling ahead of loaded data never stalls (spec §4.4).
    ///
    /// A `Defer` classification (fast scrolling) debounces the whole pass by
    /// `defer_timeout_ms`, re-assessing speed fresh when the timer fires
    /// rather than loading against a scroll position that's already stale.
    fn kick_off_loads(&mut self, ctx: &Context<Self>) {
        let visible = self.viewport.visible_range();
        if visible.is_empty_range() {
            return;
        }
        let now = now_ms();
        self.collection.borrow_mut().show_placeholders(visible, now, |min, max| {
            let r = js_sys::Math::random();
            min + ((max - min) as f64 * r).round() as usize
        });

        let guidance = self.viewport.loading_guidance();
        log::debug!(
            "scroll speed strategy {:?}, prefetch {} items, defer {}ms",
            self.viewport.speed_strategy(),
            guidance.prefetch_count,
            guidance.defer_timeout_ms,
        );

        if guidance.strategy == speed::Strategy::Defer && guidance.defer_timeout_ms > 0 {
            let link = ctx.link().clone();
            self.loads_timeout = Some(Timeout::new(guidance.defer_timeout_ms, move || {
                link.send_message(VirtualListMsg::DeferredLoad);
            }));
            return;
        }
        self.loads_timeout = None;

        let direction = self.viewport.buffer_direction();
        let collection = self.collection.clone();
        let link = ctx.link().clone();
        wasm_bindgen_futures::spawn_local(async move {
            let now = now_ms();
            collection.borrow_mut().load_missing_ranges(visible, now).await;
            let now = now_ms();
            collection.borrow_mut().load_buffer_ranges(visible, guidance.prefetch_count, direction, now).await;
            link.send_message(VirtualListMsg::RangesSettled);
        });
    }
}

/// Install `markup` as `wrapper`'s content, per spec §6 ("String results are
/// wrapped by inserting into a container and taking its first element
/// child" -- here the wrapper itself plays that container's role, since it's
/// a pooled, reset element to begin with).
fn apply_markup(wrapper: &Element, markup: ItemMarkup) {
    match markup {
        ItemMarkup::Html(html) => wrapper.set_inner_html(&html),
        ItemMarkup::Element(el) => {
            wrapper.set_inner_html("");
            let _ = wrapper.append_child(&el);
        }
    }
}
