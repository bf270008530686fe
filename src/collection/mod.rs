//! Collection Coordinator (spec §4.4): owns the sparse item array and the
//! loaded/pending/failed range bookkeeping, drives range loading against an
//! injected [`DataAdapter`], and synthesizes placeholders so scrolling ahead
//! of loaded data never stalls the view.

mod adapter;
mod placeholder;
mod ranges;

pub use adapter::{
    AdapterError, CursorParams, DataAdapter, ListItem, LoadOutcome, OffsetParams, PageParams, PaginationStrategy, ResponseMeta,
};
pub use placeholder::{PlaceholderItem, PlaceholderStructure, Slot};
pub use ranges::{FailureInfo, RangeTracker};

use std::rc::Rc;

use futures::future::join_all;

use crate::error::ConfigError;
use crate::event_bus::{Event, EventBus};
use crate::geometry::{self, ItemRange};

/// Maximum number of ranges allowed in flight at once (spec §4.4
/// `MAX_CONCURRENT`, §5 "Back-pressure").
const MAX_CONCURRENT: usize = 4;

/// Maximum number of new ranges queued per `loadMissingRanges` tick (spec
/// §4.4 `MAX_RANGES_PER_TICK`).
const MAX_RANGES_PER_TICK: usize = 3;

/// Range-size auto-selection bounds (spec §4.4 "Range-size selection").
const RANGE_SIZE_MIN: usize = 10;
const RANGE_SIZE_MAX: usize = 100;

/// Derive a default range size from viewport geometry when the caller did
/// not supply one explicitly: `clamp(10, ceil((itemsInViewport + 2 *
/// overscan) * 1.5), 100)`.
pub fn derive_range_size(container_size: f64, estimated_item_size: f64, overscan: usize) -> usize {
    let items_in_viewport = (container_size / estimated_item_size.max(1.0)).ceil().max(1.0) as usize;
    let raw = ((items_in_viewport + 2 * overscan) as f64 * 1.5).ceil() as usize;
    raw.clamp(RANGE_SIZE_MIN, RANGE_SIZE_MAX)
}

/// Configuration for a [`Collection`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollectionConfig {
    /// Items per range (`rangeId = floor(index / range_size)`).
    pub range_size: usize,
    /// Pagination strategy dispatched against the adapter.
    pub strategy: PaginationStrategy,
}

/// The sparse item array plus range bookkeeping (spec: Data Model).
///
/// `Collection` exclusively owns the sparse array and range sets (spec
/// "Ownership"); the viewport and renderer read through `Collection`'s
/// methods but never mutate this state directly.
pub struct Collection<T: ListItem, A: DataAdapter<T>> {
    adapter: Rc<A>,
    config: CollectionConfig,
    events: EventBus,
    slots: Vec<Slot<T>>,
    total_items: usize,
    massive_mode: bool,
    tracker: RangeTracker,
    structure: PlaceholderStructure,
    structure_learned: bool,
    _marker: std::marker::PhantomData<T>,
}

impl<T: ListItem, A: DataAdapter<T>> Collection<T, A> {
    /// Construct a collection against `adapter`. Fails synchronously if the
    /// adapter does not implement the method `config.strategy` requires
    /// (spec §7 "Configuration errors").
    pub fn new(adapter: A, config: CollectionConfig, events: EventBus) -> Result<Self, ConfigError> {
        Self::from_shared(Rc::new(adapter), config, events)
    }

    /// Like [`Collection::new`], but for a caller that already holds the
    /// adapter behind an `Rc` (e.g. a host component sharing one adapter
    /// instance across props and the collection itself), avoiding a second
    /// allocation.
    pub fn from_shared(adapter: Rc<A>, config: CollectionConfig, events: EventBus) -> Result<Self, ConfigError> {
        if config.range_size == 0 {
            return Err(ConfigError::NonPositiveSize {
                field: "range_size",
                value: 0,
            });
        }
        config.strategy.validate(adapter.as_ref())?;
        Ok(Self {
            adapter,
            config,
            events,
            slots: Vec::new(),
            total_items: 0,
            massive_mode: false,
            tracker: RangeTracker::new(),
            structure: PlaceholderStructure::default(),
            structure_learned: false,
            _marker: std::marker::PhantomData,
        })
    }

    /// Current authoritative item count.
    pub fn total_items(&self) -> usize { self.total_items }

    /// Read-only access to a slot, or `Slot::Empty` past the current sparse
    /// array length.
    pub fn slot(&self, index: usize) -> &Slot<T> {
        self.slots.get(index).unwrap_or(&Slot::Empty)
    }

    /// Loaded range ids, for geometry queries.
    pub fn loaded_ranges(&self) -> &std::collections::HashSet<usize> { self.tracker.loaded_set() }

    /// Number of ranges currently in flight.
    pub fn pending_count(&self) -> usize { self.tracker.pending_count() }

    /// `setItems(items[])` (spec §4.4): replace the sparse array wholesale,
    /// marking every covering range loaded and resetting failures.
    pub fn set_items(&mut self, items: Vec<T>, now: f64) {
        self.total_items = items.len();
        self.massive_mode = false;
        self.tracker.clear();
        if !items.is_empty() {
            self.structure = PlaceholderStructure::analyze(&items);
            self.structure_learned = true;
        }
        self.slots = items.into_iter().map(Slot::Loaded).collect();

        let last_range = geometry::range_id_for_index(self.total_items.saturating_sub(1), self.config.range_size);
        for range_id in 0..=last_range.min(usize::MAX) {
            if self.total_items == 0 {
                break;
            }
            self.tracker.mark_loaded(range_id);
        }

        self.events.emit(Event::ItemsSet { total: self.total_items }, None, now);
    }

    /// `setTotalItems(n)` (spec §4.4): the authoritative total for "massive
    /// list" mode, where `totalItems` far exceeds loaded items. Once in
    /// massive mode, `total_items` is never decremented by incremental
    /// loads (spec invariant and §5 "`total:changed`... honored only
    /// monotonically upward").
    pub fn set_total_items(&mut self, n: usize, now: f64) {
        if n > self.total_items {
            self.total_items = n;
            self.massive_mode = true;
            self.events.emit(Event::TotalChanged { total: n }, None, now);
        }
    }

    /// `rangeId = floor(offset / rangeSize)`.
    pub fn range_id_for_offset(&self, offset: usize) -> usize {
        geometry::range_id_for_index(offset, self.config.range_size)
    }

    /// Resolve the cursor protocol left open in spec §9: the cursor for
    /// `offset` is the id of the item loaded at `offset - 1`, or `None` if
    /// that slot is not yet loaded (callers should treat `None` as "not
    /// eligible to load via cursor yet").
    pub fn cursor_for_offset(&self, offset: usize) -> Option<String> {
        if offset == 0 {
            return Some(String::new());
        }
        match self.slots.get(offset - 1) {
            Some(Slot::Loaded(item)) => Some(item.stable_id().into_owned()),
            _ => None,
        }
    }

    /// `loadRange(offset, limit)` (spec §4.4 steps 1-5).
    pub async fn load_range(&mut self, offset: usize, limit: usize, now: f64) -> Vec<T> {
        let range_id = self.range_id_for_offset(offset);
        if self.tracker.is_pending(range_id) {
            return Vec::new();
        }
        self.tracker.mark_pending(range_id);

        let outcome = self.dispatch_load(offset, limit).await;

        let result = match outcome {
            Ok(outcome) => {
                if let Some(total) = outcome.meta.total {
                    self.set_total_items(total, now);
                }
                if !self.structure_learned && !outcome.items.is_empty() {
                    self.structure = PlaceholderStructure::analyze(&outcome.items);
                    self.structure_learned = true;
                }
                let count = outcome.items.len();
                self.update_loaded_data(outcome.items.clone(), offset, now);
                self.tracker.mark_loaded(range_id);
                self.events.emit(Event::RangeLoaded { range_id, count }, None, now);
                outcome.items
            }
            Err(err) => {
                self.tracker.clear_pending(range_id);
                let info = self.tracker.record_failure(range_id, now);
                self.events.emit(
                    Event::RangeFailed {
                        range_id,
                        attempts: info.attempts,
                        message: err.message,
                    },
                    None,
                    now,
                );
                Vec::new()
            }
        };
        // "Always remove from pendingRanges in a finally": mark_loaded above
        // already cleared it on success; clear unconditionally on failure
        // path too (already done) and as a safety net here.
        self.tracker.clear_pending_if_not_loaded(range_id);
        result
    }

    async fn dispatch_load(&self, offset: usize, limit: usize) -> Result<LoadOutcome<T>, AdapterError> {
        match self.config.strategy {
            PaginationStrategy::Page => {
                let page = offset / limit.max(1) + 1;
                self.adapter.load_page(PageParams { page, limit }).await
            }
            PaginationStrategy::Offset => self.adapter.load_range(OffsetParams { offset, limit }).await,
            PaginationStrategy::Cursor => {
                let cursor = self.cursor_for_offset(offset);
                match cursor {
                    Some(cursor) => {
                        let cursor = if cursor.is_empty() { None } else { Some(cursor) };
                        self.adapter.load_with_cursor(CursorParams { cursor, limit }).await
                    }
                    None => Err(AdapterError {
                        message: format!("cursor pagination requires offset {} - 1 to already be loaded", offset),
                    }),
                }
            }
        }
    }

    /// `loadMissingRanges(visibleRange)` (spec §4.4): back-pressured,
    /// backoff-respecting batch load of whatever ranges cover
    /// `visible_range` and aren't already loaded or pending.
    pub async fn load_missing_ranges(&mut self, visible_range: ItemRange, now: f64) {
        if visible_range.is_empty_range() {
            return;
        }
        let first_range_id = geometry::range_id_for_index(visible_range.start, self.config.range_size);
        let last_range_id = geometry::range_id_for_index(visible_range.end, self.config.range_size);
        let queued = self.queue_eligible_ranges(first_range_id..=last_range_id, now);
        self.load_range_ids(queued, now).await;
    }

    /// `bufferRanges` consumer (spec §2/§4.2: the Speed Tracker's loading
    /// guidance drives prefetch beyond the bare visible range). Widens
    /// `visible_range` by `prefetch_count` items, biased by `direction`, via
    /// [`geometry::buffer_ranges`], then loads whatever of that widened
    /// envelope is still missing.
    pub async fn load_buffer_ranges(
        &mut self,
        visible_range: ItemRange,
        prefetch_count: usize,
        direction: geometry::ScrollDirection,
        now: f64,
    ) {
        if visible_range.is_empty_range() || prefetch_count == 0 {
            return;
        }
        let buffered = geometry::buffer_ranges(
            visible_range,
            self.tracker.loaded_set(),
            self.config.range_size,
            prefetch_count,
            direction,
            self.total_items,
        );

        let mut range_ids: Vec<usize> = buffered
            .into_iter()
            .flat_map(|r| {
                let first = geometry::range_id_for_index(r.start, self.config.range_size);
                let last = geometry::range_id_for_index(r.end, self.config.range_size);
                first..=last
            })
            .collect();
        range_ids.sort_unstable();
        range_ids.dedup();

        let queued = self.queue_eligible_ranges(range_ids, now);
        self.load_range_ids(queued, now).await;
    }

    /// Filter `range_ids` down to those not already loaded/pending and past
    /// their retry backoff, capped at [`MAX_RANGES_PER_TICK`] per tick with
    /// ranges overdue for a retry (per [`RangeTracker::due_retries`])
    /// prioritized ahead of ranges never yet attempted.
    fn queue_eligible_ranges(&self, range_ids: impl IntoIterator<Item = usize>, now: f64) -> Vec<usize> {
        if self.tracker.pending_count() >= MAX_CONCURRENT {
            return Vec::new();
        }
        let due: std::collections::HashSet<usize> = self.tracker.due_retries(now).into_iter().collect();
        let mut candidates: Vec<usize> = range_ids
            .into_iter()
            .filter(|&range_id| {
                !self.tracker.is_loaded(range_id) && !self.tracker.is_pending(range_id) && self.tracker.retry_eligible(range_id, now)
            })
            .collect();
        candidates.sort_by_key(|id| !due.contains(id));
        candidates.truncate(MAX_RANGES_PER_TICK);
        candidates
    }

    async fn load_range_ids(&mut self, range_ids: Vec<usize>, now: f64) {
        for batch in range_ids.chunks(MAX_CONCURRENT) {
            let mut futures = Vec::new();
            for &range_id in batch {
                let offset = range_id * self.config.range_size;
                futures.push(self.load_range(offset, self.config.range_size, now));
            }
            // Promise.allSettled equivalent: `load_range` already absorbs
            // its own errors into recorded failure state, so a plain
            // `join_all` here never short-circuits on one range's failure.
            let _: Vec<Vec<T>> = join_all(futures).await;
        }
    }

    /// `updateLoadedData(items, offset)` (spec §4.4): grow the sparse array
    /// with `Slot::Empty` padding if needed, write each item at
    /// `offset + i`, and emit `placeholders:replaced` for any slot that held
    /// a placeholder. Never shrinks `total_items` for massive lists.
    pub fn update_loaded_data(&mut self, items: Vec<T>, offset: usize, now: f64) {
        let required_len = offset + items.len();
        if self.slots.len() < required_len {
            self.slots.resize(required_len, Slot::Empty);
        }

        let mut replaced_start: Option<usize> = None;
        let mut replaced_end: Option<usize> = None;

        for (i, item) in items.into_iter().enumerate() {
            let index = offset + i;
            if self.slots[index].is_placeholder() {
                replaced_start.get_or_insert(index);
                replaced_end = Some(index);
            }
            self.slots[index] = Slot::Loaded(item);
        }

        if let (Some(start), Some(end)) = (replaced_start, replaced_end) {
            self.events.emit(Event::PlaceholdersReplaced { start, end }, None, now);
        }

        if !self.massive_mode && self.slots.len() > self.total_items {
            self.total_items = self.slots.len();
        }
    }

    /// `showPlaceholders(range)` (spec §4.4, resolving the §9 Open Question
    /// in favor of the range-taking form only): fill `Slot::Empty` entries
    /// within `range` with synthesized placeholders.
    pub fn show_placeholders(&mut self, range: ItemRange, now: f64, mut pick_len: impl FnMut(usize, usize) -> usize) {
        if range.is_empty_range() {
            return;
        }
        let required_len = (range.end + 1).max(self.slots.len());
        if self.slots.len() < required_len {
            self.slots.resize(required_len, Slot::Empty);
        }

        let mut shown = false;
        for index in range.start..=range.end.min(self.slots.len().saturating_sub(1)) {
            if matches!(self.slots[index], Slot::Empty) {
                self.slots[index] = Slot::Placeholder(self.structure.generate(index, &mut pick_len));
                shown = true;
            }
        }
        if shown {
            self.events.emit(Event::PlaceholdersShown { start: range.start, end: range.end }, None, now);
        }
    }

    /// Clear all range bookkeeping and re-validate the strategy against a
    /// new configuration (spec §6: "changing [the strategy]... clears
    /// `loadedRanges` and `pendingRanges` and emits `strategy:changed`").
    pub fn set_strategy(&mut self, strategy: PaginationStrategy, now: f64) -> Result<(), ConfigError> {
        strategy.validate(self.adapter.as_ref())?;
        self.config.strategy = strategy;
        self.tracker.clear();
        self.events.emit(Event::StrategyChanged, None, now);
        Ok(())
    }

    /// Forget recorded failures without touching loaded/pending state (spec
    /// §7: consumers "may read, clear, or retry").
    pub fn clear_failures(&mut self) {
        self.tracker.clear_failures();
    }

    /// Failure info for a given range, if any.
    pub fn failure(&self, range_id: usize) -> Option<FailureInfo> {
        self.tracker.failure(range_id)
    }
}

impl RangeTracker {
    /// Defensive re-assertion of the `finally` semantics spec §4.4 step 5
    /// calls for: a range must never remain pending once its load call has
    /// returned, loaded or not.
    fn clear_pending_if_not_loaded(&mut self, range_id: usize) {
        if !self.is_loaded(range_id) {
            self.clear_pending(range_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[derive(Clone, PartialEq, Debug)]
    struct Row {
        id: String,
        title: String,
    }

    impl ListItem for Row {
        fn stable_id(&self) -> std::borrow::Cow<'_, str> { std::borrow::Cow::Borrowed(&self.id) }
        fn sample_fields(&self) -> Vec<(&'static str, usize)> { vec![("title", self.title.len())] }
    }

    struct PageAdapter {
        total: usize,
        log: RefCell<Vec<PageParams>>,
    }

    #[async_trait::async_trait(?Send)]
    impl DataAdapter<Row> for PageAdapter {
        async fn load_page(&self, params: PageParams) -> Result<LoadOutcome<Row>, AdapterError> {
            self.log.borrow_mut().push(params);
            let start = (params.page - 1) * params.limit;
            let items = (start..start + 10.min(params.limit))
                .map(|i| Row { id: i.to_string(), title: format!("item {i}") })
                .collect();
            Ok(LoadOutcome {
                items,
                meta: ResponseMeta { total: Some(self.total) },
            })
        }
        fn supports_page(&self) -> bool { true }
    }

    struct FailingAdapter {
        fail_times: RefCell<u32>,
    }

    #[async_trait::async_trait(?Send)]
    impl DataAdapter<Row> for FailingAdapter {
        async fn load_range(&self, _params: OffsetParams) -> Result<LoadOutcome<Row>, AdapterError> {
            let mut remaining = self.fail_times.borrow_mut();
            if *remaining > 0 {
                *remaining -= 1;
                Err(AdapterError { message: "boom".into() })
            } else {
                Ok(LoadOutcome { items: vec![], meta: ResponseMeta::default() })
            }
        }
        fn supports_range(&self) -> bool { true }
    }

    fn config(strategy: PaginationStrategy) -> CollectionConfig {
        CollectionConfig { range_size: 10, strategy }
    }

    #[test]
    fn construction_fails_fast_on_missing_adapter_method() {
        let adapter = FailingAdapter { fail_times: RefCell::new(0) };
        let err = Collection::new(adapter, config(PaginationStrategy::Page), EventBus::new()).unwrap_err();
        assert!(matches!(err, ConfigError::MissingAdapterMethod { .. }));
    }

    #[test]
    fn s2_range_load_with_page_strategy() {
        futures::executor::block_on(async {
            let adapter = PageAdapter { total: 1000, log: RefCell::new(Vec::new()) };
            let mut collection = Collection::new(adapter, config(PaginationStrategy::Page), EventBus::new()).unwrap();
            assert_eq!(collection.total_items(), 0);

            collection.load_range(0, 20, 0.0).await;

            assert_eq!(collection.total_items(), 1000);
            assert!(collection.loaded_ranges().contains(&0));
            for i in 0..10 {
                assert!(collection.slot(i).is_loaded());
            }
            assert!(matches!(collection.slot(10), Slot::Empty));
        });
    }

    #[test]
    fn s3_backoff_emits_increasing_attempts() {
        futures::executor::block_on(async {
            let adapter = FailingAdapter { fail_times: RefCell::new(2) };
            let mut collection = Collection::new(adapter, config(PaginationStrategy::Offset), EventBus::new()).unwrap();

            collection.load_range(0, 10, 0.0).await;
            assert_eq!(collection.failure(0).unwrap().attempts, 1);

            collection.load_range(0, 10, 100.0).await;
            assert_eq!(collection.failure(0).unwrap().attempts, 2);

            // Retry within 1500ms: loadMissingRanges would skip it.
            let visible = ItemRange::new(0, 9);
            collection.load_missing_ranges(visible, 100.0 + 1500.0).await;
            assert_eq!(collection.failure(0).unwrap().attempts, 2);

            // After full backoff window, it retries and now succeeds.
            collection.load_missing_ranges(visible, 100.0 + 2500.0).await;
            assert!(collection.loaded_ranges().contains(&0));
        });
    }

    #[test]
    fn pending_range_is_never_reissued() {
        futures::executor::block_on(async {
            struct CountingAdapter { calls: RefCell<u32> }
            #[async_trait::async_trait(?Send)]
            impl DataAdapter<Row> for CountingAdapter {
                async fn load_range(&self, _: OffsetParams) -> Result<LoadOutcome<Row>, AdapterError> {
                    *self.calls.borrow_mut() += 1;
                    Ok(LoadOutcome { items: vec![], meta: ResponseMeta::default() })
                }
                fn supports_range(&self) -> bool { true }
            }
            let adapter = CountingAdapter { calls: RefCell::new(0) };
            let mut collection = Collection::new(adapter, config(PaginationStrategy::Offset), EventBus::new()).unwrap();
            collection.load_range(0, 10, 0.0).await;
            assert_eq!(*collection.adapter.calls.borrow(), 1);
        });
    }

    #[test]
    fn showing_placeholders_fills_empty_slots_only() {
        let adapter = PageAdapter { total: 0, log: RefCell::new(Vec::new()) };
        let mut collection = Collection::new(adapter, config(PaginationStrategy::Page), EventBus::new()).unwrap();
        collection.total_items = 20;
        collection.show_placeholders(ItemRange::new(0, 4), 0.0, |min, max| (min + max) / 2);
        for i in 0..=4 {
            assert!(collection.slot(i).is_placeholder());
        }
    }
}
