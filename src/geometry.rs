//! Geometry Calculator (spec §4.1): pure, side-effect-free functions over the
//! orientation-abstracted main axis. Nothing here touches the DOM; horizontal
//! vs. vertical is resolved by [`crate::orientation::Orientation`] at the
//! boundary.

use std::collections::BTreeMap;

/// A closed `[start, end]` interval of item indices. Empty ranges are
/// represented as `start > end` (spec §4.1 "Edge cases": `{start:0,end:-1}`
/// becomes `{start:0,end:0}` with `is_empty() == true` here, since indices
/// are unsigned).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRange {
    /// First index in the range.
    pub start: usize,
    /// Last index in the range (inclusive).
    pub end: usize,
}

impl ItemRange {
    /// Construct a range, without checking for emptiness.
    pub const fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// The canonical empty range (spec §4.1 edge case: `totalItems=0` =>
    /// `{start:0,end:-1}`). `start > end` is the sole emptiness marker; the
    /// specific values carry no meaning beyond that.
    pub const EMPTY: Self = Self { start: 1, end: 0 };

    /// Whether this range contains no indices.
    pub fn is_empty_range(&self) -> bool {
        // start==end==0 is ambiguous with "single item 0"; callers that can
        // produce a genuinely empty range track it with `empty` explicitly.
        self.start > self.end
    }

    /// Number of indices covered, saturating at 0 for empty ranges.
    pub fn len(&self) -> usize {
        if self.is_empty_range() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    /// Whether `index` falls within `[start, end]`.
    pub fn contains(&self, index: usize) -> bool {
        !self.is_empty_range() && index >= self.start && index <= self.end
    }
}

/// `rangeId = floor(start / rangeSize)` (spec: Data Model, "Range").
pub fn range_id_for_index(index: usize, range_size: usize) -> usize {
    index / range_size.max(1)
}

/// Mean of the measured sizes, falling back to `estimated` when empty.
fn mean_or(measured: &BTreeMap<usize, f64>, estimated: f64) -> f64 {
    if measured.is_empty() {
        estimated
    } else {
        measured.values().sum::<f64>() / measured.len() as f64
    }
}

/// Pixel size of `index`: its measured size if known, else `estimated`.
fn size_at(index: usize, measured: &BTreeMap<usize, f64>, estimated: f64) -> f64 {
    measured.get(&index).copied().unwrap_or(estimated)
}

/// `totalVirtualSize(totalItems, estimatedItemSize, measuredSizes?)` (spec
/// §4.1): exact sum using measured sizes where known, estimated elsewhere.
pub fn total_virtual_size(total_items: usize, estimated_item_size: f64, measured_sizes: &BTreeMap<usize, f64>) -> f64 {
    if total_items == 0 {
        return 0.0;
    }
    let mut total = 0.0;
    for i in 0..total_items {
        total += size_at(i, measured_sizes, estimated_item_size);
    }
    total
}

/// `containerPosition(visibleRange.start, measuredSizes, estimatedItemSize)`
/// (spec §4.1): pixel offset of `start_index`, used to translate the items
/// container.
pub fn container_position(start_index: usize, measured_sizes: &BTreeMap<usize, f64>, estimated_item_size: f64) -> f64 {
    let mut offset = 0.0;
    for i in 0..start_index {
        offset += size_at(i, measured_sizes, estimated_item_size);
    }
    offset
}

/// `visibleRange(...)` (spec §4.1). See the "Edge cases" paragraph for the
/// boundary behaviors this function must reproduce.
pub fn visible_range(
    scroll_position: f64,
    container_size: f64,
    estimated_item_size: f64,
    total_items: usize,
    overscan: usize,
    measured_sizes: &BTreeMap<usize, f64>,
) -> ItemRange {
    if total_items == 0 {
        return ItemRange::EMPTY;
    }

    let unbuffered_start = find_index_at_offset(scroll_position, total_items, estimated_item_size, measured_sizes);

    let unbuffered_count = if container_size <= 0.0 {
        1
    } else {
        (container_size / estimated_item_size.max(1.0)).ceil() as usize
    }
    .max(1);

    let last_index = total_items - 1;
    let unbuffered_end = (unbuffered_start + unbuffered_count.saturating_sub(1)).min(last_index);

    let start = unbuffered_start.saturating_sub(overscan);
    let end = (unbuffered_end + overscan).min(last_index);
    ItemRange::new(start, end)
}

/// Walk measured sizes accumulating until the scroll position falls inside
/// an item's span; beyond the last measured index, estimate by
/// `floor(scrollPosition / estimatedItemSize)`.
fn find_index_at_offset(scroll_position: f64, total_items: usize, estimated_item_size: f64, measured_sizes: &BTreeMap<usize, f64>) -> usize {
    if measured_sizes.is_empty() {
        let estimate = (scroll_position / estimated_item_size.max(1.0)).floor();
        return (estimate.max(0.0) as usize).min(total_items.saturating_sub(1));
    }

    let mut position = 0.0;
    let last_measured = *measured_sizes.keys().last().unwrap();
    for i in 0..=last_measured.min(total_items.saturating_sub(1)) {
        let size = size_at(i, measured_sizes, estimated_item_size);
        if position <= scroll_position && scroll_position < position + size {
            return i;
        }
        position += size;
    }

    // Beyond the last measured index: estimate the remaining distance.
    let remaining = (scroll_position - position).max(0.0);
    let extra = (remaining / estimated_item_size.max(1.0)).floor() as usize;
    (last_measured + 1 + extra).min(total_items.saturating_sub(1))
}

/// `scrollPositionForIndex(index, alignment, ...)` (spec §4.1), clamped to
/// `[0, maxScroll]`.
///
/// `Start` alignment is clamped against `total - itemSize`, not
/// `total - containerSize`: its purpose is to put `index`'s start edge at the
/// viewport's start edge even for a trailing item whose offset alone exceeds
/// what a container-filling scroll position would allow (spec §8 S1:
/// `scrollToIndex(lastIndex, "start")` must land exactly on that item's
/// offset, overhanging the end of content instead of being pulled back).
pub fn scroll_position_for_index(
    index: usize,
    alignment: ScrollAlignment,
    container_size: f64,
    estimated_item_size: f64,
    measured_sizes: &BTreeMap<usize, f64>,
    total_items: usize,
) -> f64 {
    let item_offset = container_position(index, measured_sizes, estimated_item_size);
    let item_size = size_at(index, measured_sizes, estimated_item_size);

    let raw = match alignment {
        ScrollAlignment::Start => item_offset,
        ScrollAlignment::Center => item_offset - (container_size - item_size) / 2.0,
        ScrollAlignment::End => item_offset - container_size + item_size,
    };

    let total = total_virtual_size(total_items, estimated_item_size, measured_sizes);
    let max_scroll = match alignment {
        ScrollAlignment::Start => (total - item_size).max(0.0),
        ScrollAlignment::Center | ScrollAlignment::End => (total - container_size).max(0.0),
    };
    raw.clamp(0.0, max_scroll)
}

/// Requested scroll alignment for [`scroll_position_for_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollAlignment {
    /// Align the item's start edge with the viewport's start edge.
    Start,
    /// Center the item within the viewport.
    Center,
    /// Align the item's end edge with the viewport's end edge.
    End,
}

/// The minimum thumb size, in pixels, regardless of how small the ratio of
/// container to content would otherwise make it (spec §4.1: `THUMB_MIN`).
pub const THUMB_MIN: f64 = 20.0;

/// Computed custom-scrollbar geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScrollbarMetrics {
    /// Thumb length along the track, in pixels.
    pub thumb_size: f64,
    /// Thumb offset from the track's start, in pixels.
    pub thumb_position: f64,
}

/// `scrollbarMetrics(...)` (spec §4.1). When content fits entirely within
/// the container, the thumb fills the track and sits at position 0.
pub fn scrollbar_metrics(scroll_position: f64, total_virtual_size: f64, container_size: f64, track_size: f64) -> ScrollbarMetrics {
    if total_virtual_size <= container_size || total_virtual_size <= 0.0 {
        return ScrollbarMetrics {
            thumb_size: track_size,
            thumb_position: 0.0,
        };
    }

    let thumb_size = (container_size / total_virtual_size * track_size).max(THUMB_MIN);
    let max_scroll = total_virtual_size - container_size;
    let max_thumb_position = (track_size - thumb_size).max(0.0);
    let progress = if max_scroll > 0.0 { (scroll_position / max_scroll).clamp(0.0, 1.0) } else { 0.0 };
    ScrollbarMetrics {
        thumb_size,
        thumb_position: progress * max_thumb_position,
    }
}

/// `missingRanges(visibleRange, loadedRanges, rangeSize)` (spec §4.1):
/// contiguous runs of rangeIds covering `visibleRange` that are absent from
/// `loaded_ranges`, merged into `ItemRange`s over item indices (not rangeIds).
pub fn missing_ranges(visible_range: ItemRange, loaded_ranges: &std::collections::HashSet<usize>, range_size: usize) -> Vec<ItemRange> {
    if visible_range.is_empty_range() {
        return Vec::new();
    }
    let range_size = range_size.max(1);
    let first_range_id = range_id_for_index(visible_range.start, range_size);
    let last_range_id = range_id_for_index(visible_range.end, range_size);

    let mut missing = Vec::new();
    let mut run_start: Option<usize> = None;

    for range_id in first_range_id..=last_range_id {
        let is_missing = !loaded_ranges.contains(&range_id);
        match (is_missing, run_start) {
            (true, None) => run_start = Some(range_id),
            (false, Some(s)) => {
                missing.push(ItemRange::new(s * range_size, range_id * range_size - 1));
                run_start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = run_start {
        missing.push(ItemRange::new(s * range_size, (last_range_id + 1) * range_size - 1));
    }
    missing
}

/// Directional bias for [`buffer_ranges`]: neutral is symmetric, otherwise
/// biased toward the scroll direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScrollDirection {
    /// No recent directional signal; buffer symmetrically.
    Neutral,
    /// Scrolling toward increasing indices; bias the buffer forward.
    Forward,
    /// Scrolling toward decreasing indices; bias the buffer backward.
    Backward,
}

/// `bufferRanges(visibleRange, loadedRanges, rangeSize, prefetchCount,
/// direction)` (spec §4.1): symmetric around the visible range when
/// direction is neutral, biased in the scroll direction otherwise.
pub fn buffer_ranges(
    visible_range: ItemRange,
    loaded_ranges: &std::collections::HashSet<usize>,
    range_size: usize,
    prefetch_count: usize,
    direction: ScrollDirection,
    total_items: usize,
) -> Vec<ItemRange> {
    if total_items == 0 || visible_range.is_empty_range() {
        return Vec::new();
    }
    let last_index = total_items - 1;

    let (before, after) = match direction {
        ScrollDirection::Neutral => (prefetch_count / 2, prefetch_count - prefetch_count / 2),
        ScrollDirection::Forward => (0, prefetch_count),
        ScrollDirection::Backward => (prefetch_count, 0),
    };

    let buffered_start = visible_range.start.saturating_sub(before);
    let buffered_end = (visible_range.end + after).min(last_index);
    let buffered = ItemRange::new(buffered_start, buffered_end);

    missing_ranges(buffered, loaded_ranges, range_size)
}

/// `applyBoundaryResistance(requested, max, resistance)` (spec §4.1):
/// outside `[0, max]`, the excess is multiplied by `resistance`; at
/// `resistance == 1.0` the boundary is hard.
pub fn apply_boundary_resistance(requested: f64, max: f64, resistance: f64) -> f64 {
    let resistance = resistance.clamp(0.0, 1.0);
    if requested < 0.0 {
        requested * (1.0 - resistance)
    } else if requested > max {
        max + (requested - max) * (1.0 - resistance)
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn s1_pure_virtualization_initial_range() {
        let measured = BTreeMap::new();
        let r = visible_range(0.0, 500.0, 50.0, 1_000_000, 2, &measured);
        assert_eq!(r, ItemRange::new(0, 11));
    }

    #[test]
    fn s1_pure_virtualization_after_scroll_to_end() {
        let measured = BTreeMap::new();
        let total_items = 1_000_000;
        let pos = scroll_position_for_index(999_999, ScrollAlignment::Start, 500.0, 50.0, &measured, total_items);
        assert_eq!(pos, 49_999_950.0);
        let r = visible_range(pos, 500.0, 50.0, total_items, 2, &measured);
        assert_eq!(r, ItemRange::new(999_997, 999_999));
    }

    #[test]
    fn empty_list_yields_empty_range() {
        let measured = BTreeMap::new();
        let r = visible_range(0.0, 500.0, 50.0, 0, 2, &measured);
        assert!(r.is_empty_range() || r.len() == 0);
    }

    #[test]
    fn zero_container_size_yields_single_item() {
        let measured = BTreeMap::new();
        let r = visible_range(0.0, 0.0, 50.0, 100, 0, &measured);
        assert_eq!(r.len(), 1);
    }

    #[test]
    fn thumb_fills_track_when_content_fits() {
        let m = scrollbar_metrics(0.0, 100.0, 500.0, 200.0);
        assert_eq!(m.thumb_size, 200.0);
        assert_eq!(m.thumb_position, 0.0);
    }

    #[test]
    fn thumb_never_shrinks_below_minimum() {
        let m = scrollbar_metrics(0.0, 1_000_000.0, 10.0, 200.0);
        assert_eq!(m.thumb_size, THUMB_MIN);
    }

    #[test]
    fn missing_ranges_merges_contiguous_gaps() {
        let mut loaded = HashSet::new();
        loaded.insert(1usize);
        let vr = ItemRange::new(0, 39); // rangeSize 10 -> rangeIds 0..=3
        let missing = missing_ranges(vr, &loaded, 10);
        assert_eq!(missing, vec![ItemRange::new(0, 9), ItemRange::new(20, 39)]);
    }

    #[test]
    fn boundary_resistance_is_hard_at_one() {
        assert_eq!(apply_boundary_resistance(-10.0, 100.0, 1.0), 0.0);
        assert_eq!(apply_boundary_resistance(110.0, 100.0, 1.0), 100.0);
    }

    #[test]
    fn boundary_resistance_dampens_excess() {
        let v = apply_boundary_resistance(-10.0, 100.0, 0.5);
        assert_eq!(v, -5.0);
    }

    #[test]
    fn buffer_ranges_biases_toward_scroll_direction() {
        let loaded = HashSet::new();
        let vr = ItemRange::new(40, 49);
        let forward = buffer_ranges(vr, &loaded, 10, 20, ScrollDirection::Forward, 1000);
        let backward = buffer_ranges(vr, &loaded, 10, 20, ScrollDirection::Backward, 1000);
        assert_eq!(forward[0].end, 69);
        assert_eq!(backward[0].start, 20);
    }
}
