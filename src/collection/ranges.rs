//! Loaded/pending/failed range bookkeeping (spec: Data Model; §4.4; §9
//! design note on backing `failedRanges` with a priority queue).
//!
//! `FailedRanges` is kept as a small `BinaryHeap` keyed by next-eligible-time
//! rather than a plain map scan, per the §9 suggestion ("a simple aging set;
//! implementers may back it with a priority queue keyed by next-eligible-time
//! for O(log n) scheduling").

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet};

/// Bookkeeping for a single range that has failed at least once.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FailureInfo {
    /// Consecutive failed attempts for this range.
    pub attempts: u32,
    /// When the most recent attempt failed, in milliseconds.
    pub last_attempt_at: f64,
}

impl FailureInfo {
    /// Capped exponential backoff (spec §4.4, §8 property 9):
    /// `min(1000 * 2^(attempts-1), 30000)` milliseconds.
    pub fn backoff_ms(&self) -> f64 {
        let exp = 1000.0 * 2f64.powi(self.attempts.saturating_sub(1) as i32);
        exp.min(30_000.0)
    }

    /// Whether a retry is eligible at time `now`.
    pub fn eligible_at(&self, now: f64) -> bool {
        now - self.last_attempt_at >= self.backoff_ms()
    }

    /// The earliest time at which a retry becomes eligible.
    pub fn next_eligible_at(&self) -> f64 {
        self.last_attempt_at + self.backoff_ms()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct ScheduledRetry {
    range_id: usize,
    next_eligible_at: f64,
}

impl Eq for ScheduledRetry {}
impl PartialOrd for ScheduledRetry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
}
impl Ord for ScheduledRetry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest-eligible range
        // surfaces first.
        other
            .next_eligible_at
            .partial_cmp(&self.next_eligible_at)
            .unwrap_or(Ordering::Equal)
    }
}

/// Range-load bookkeeping owned exclusively by the collection coordinator
/// (spec: Data Model ownership table; invariant 5: "A rangeId is never
/// simultaneously in loadedRanges and pendingRanges").
#[derive(Debug, Default)]
pub struct RangeTracker {
    loaded: HashSet<usize>,
    pending: HashSet<usize>,
    failures: std::collections::HashMap<usize, FailureInfo>,
    retry_schedule: BinaryHeap<ScheduledRetry>,
}

impl RangeTracker {
    /// Construct an empty tracker.
    pub fn new() -> Self { Self::default() }

    /// Whether `range_id` has completed successfully.
    pub fn is_loaded(&self, range_id: usize) -> bool { self.loaded.contains(&range_id) }

    /// Whether `range_id` currently has a request in flight.
    pub fn is_pending(&self, range_id: usize) -> bool { self.pending.contains(&range_id) }

    /// Number of ranges currently in flight.
    pub fn pending_count(&self) -> usize { self.pending.len() }

    /// The set of loaded range ids, for geometry queries
    /// ([`crate::geometry::missing_ranges`], [`crate::geometry::buffer_ranges`]).
    pub fn loaded_set(&self) -> &HashSet<usize> { &self.loaded }

    /// Mark `range_id` as in flight. Invariant 5 forbids a range being both
    /// pending and loaded; callers must check `is_pending`/`is_loaded`
    /// first (the collection coordinator does, in `loadRange` step 1).
    pub fn mark_pending(&mut self, range_id: usize) {
        debug_assert!(!self.loaded.contains(&range_id));
        self.pending.insert(range_id);
    }

    /// Mark `range_id` as loaded, removing it from `pending` and clearing
    /// any recorded failure.
    pub fn mark_loaded(&mut self, range_id: usize) {
        self.pending.remove(&range_id);
        self.loaded.insert(range_id);
        self.failures.remove(&range_id);
    }

    /// Remove `range_id` from `pending` without marking it loaded (used in
    /// the `finally` path of `loadRange`, spec §4.4 step 5).
    pub fn clear_pending(&mut self, range_id: usize) {
        self.pending.remove(&range_id);
    }

    /// Record a failed attempt, incrementing `attempts` and scheduling the
    /// next retry.
    pub fn record_failure(&mut self, range_id: usize, now: f64) -> FailureInfo {
        let attempts = self.failures.get(&range_id).map(|f| f.attempts + 1).unwrap_or(1);
        let info = FailureInfo {
            attempts,
            last_attempt_at: now,
        };
        self.failures.insert(range_id, info);
        self.retry_schedule.push(ScheduledRetry {
            range_id,
            next_eligible_at: info.next_eligible_at(),
        });
        info
    }

    /// Failure info for `range_id`, if any.
    pub fn failure(&self, range_id: usize) -> Option<FailureInfo> {
        self.failures.get(&range_id).copied()
    }

    /// Whether `range_id` is eligible for retry at time `now`: either it has
    /// never failed, or its backoff window has elapsed.
    pub fn retry_eligible(&self, range_id: usize, now: f64) -> bool {
        match self.failures.get(&range_id) {
            None => true,
            Some(info) => info.eligible_at(now),
        }
    }

    /// Ranges whose backoff window has elapsed as of `now`, most-overdue
    /// first, without mutating the schedule (a range may still be pending or
    /// loaded by the time a caller gets around to it, so this is advisory).
    pub fn due_retries(&self, now: f64) -> Vec<usize> {
        self.retry_schedule
            .iter()
            .filter(|r| r.next_eligible_at <= now)
            .map(|r| r.range_id)
            .collect()
    }

    /// Clear all bookkeeping (spec §4.4: "cleared on strategy change or
    /// destroy").
    pub fn clear(&mut self) {
        self.loaded.clear();
        self.pending.clear();
        self.failures.clear();
        self.retry_schedule.clear();
    }

    /// Clear only the failure ledger, leaving loaded/pending state intact
    /// (spec §7: "consumers may read, clear, or retry via the public API").
    pub fn clear_failures(&mut self) {
        self.failures.clear();
        self.retry_schedule.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps_at_30s() {
        let info = FailureInfo { attempts: 1, last_attempt_at: 0.0 };
        assert_eq!(info.backoff_ms(), 1000.0);
        let info = FailureInfo { attempts: 2, last_attempt_at: 0.0 };
        assert_eq!(info.backoff_ms(), 2000.0);
        let info = FailureInfo { attempts: 10, last_attempt_at: 0.0 };
        assert_eq!(info.backoff_ms(), 30_000.0);
    }

    #[test]
    fn s3_backoff_scenario() {
        let mut tracker = RangeTracker::new();
        tracker.record_failure(0, 0.0);
        assert_eq!(tracker.failure(0).unwrap().attempts, 1);
        tracker.record_failure(0, 100.0);
        assert_eq!(tracker.failure(0).unwrap().attempts, 2);

        // A third attempt within 1500ms of the last failure is a no-op.
        assert!(!tracker.retry_eligible(0, 100.0 + 1500.0));
        // After 2500ms (>= 2000ms backoff for attempts=2), it retries.
        assert!(tracker.retry_eligible(0, 100.0 + 2500.0));
    }

    #[test]
    fn loaded_and_pending_are_mutually_exclusive() {
        let mut tracker = RangeTracker::new();
        tracker.mark_pending(5);
        assert!(tracker.is_pending(5));
        assert!(!tracker.is_loaded(5));
        tracker.mark_loaded(5);
        assert!(!tracker.is_pending(5));
        assert!(tracker.is_loaded(5));
    }

    #[test]
    fn clear_resets_all_state() {
        let mut tracker = RangeTracker::new();
        tracker.mark_pending(1);
        tracker.record_failure(2, 0.0);
        tracker.clear();
        assert_eq!(tracker.pending_count(), 0);
        assert!(tracker.failure(2).is_none());
    }
}
