//! Speed Tracker (spec §4.2): smoothed scroll velocity classification that
//! drives the collection's loading strategy. Pure state machine, no DOM
//! access — the viewport feeds it raw `(delta_position, delta_time)` pairs
//! from wheel events.

use std::collections::VecDeque;

/// Maximum number of raw samples retained in the ring (spec: "bounded sample
/// ring (<= 20 samples)").
const SAMPLE_RING_CAPACITY: usize = 20;

/// EMA smoothing factor (spec: "α ≈ 0.85").
const SMOOTHING_ALPHA: f64 = 0.85;

/// A loading strategy derived from the current scroll speed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Fast scroll: avoid racing ahead of the user; defer loads briefly and
    /// bound how many ranges are requested.
    Defer,
    /// Idle/slow browsing: load aggressively, predicting how far momentum
    /// will carry the user.
    Immediate,
    /// Moderate speed: split the difference.
    Maintain,
}

/// Tunable thresholds and constants for [`SpeedTracker`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedConfig {
    /// Velocity (px/ms) above which scrolling is classified `Defer`.
    pub fast_threshold: f64,
    /// Velocity (px/ms) below which scrolling is classified `Immediate`.
    pub slow_threshold: f64,
    /// Exponential deceleration factor used to integrate momentum.
    pub deceleration_factor: f64,
    /// Prefetch count used while viewport capacity alone bounds fast-scroll
    /// loading.
    pub viewport_capacity: usize,
    /// Debounce applied before issuing loads while scrolling fast.
    pub defer_timeout_ms: u32,
}

impl Default for SpeedConfig {
    fn default() -> Self {
        Self {
            fast_threshold: 1.5,
            slow_threshold: 0.2,
            deceleration_factor: 0.02,
            viewport_capacity: 20,
            defer_timeout_ms: 150,
        }
    }
}

/// The loading guidance callers act on after every scroll update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadingGuidance {
    /// Which strategy the current speed maps to.
    pub strategy: Strategy,
    /// How many ranges should be requested on the next loading pass.
    pub prefetch_count: usize,
    /// Debounce to apply before issuing the load, in milliseconds.
    pub defer_timeout_ms: u32,
}

/// Smoothed scroll velocity and directional state (spec: "Data Model / Speed
/// Tracker State").
#[derive(Debug, Clone)]
pub struct SpeedTracker {
    config: SpeedConfig,
    samples: VecDeque<f64>,
    smoothed_velocity: f64,
    previous_velocity: f64,
    direction: i8,
    previous_direction: i8,
    is_accelerating: bool,
}

impl SpeedTracker {
    /// Construct a tracker at rest.
    pub fn new(config: SpeedConfig) -> Self {
        Self {
            config,
            samples: VecDeque::with_capacity(SAMPLE_RING_CAPACITY),
            smoothed_velocity: 0.0,
            previous_velocity: 0.0,
            direction: 0,
            previous_direction: 0,
            is_accelerating: false,
        }
    }

    /// Feed a scroll update: `delta_position` (px, signed) over `delta_time`
    /// (ms, expected positive).
    pub fn record(&mut self, delta_position: f64, delta_time: f64) {
        let instantaneous = delta_position.abs() / delta_time.max(1.0);

        self.samples.push_back(instantaneous);
        if self.samples.len() > SAMPLE_RING_CAPACITY {
            self.samples.pop_front();
        }

        self.previous_velocity = self.smoothed_velocity;
        self.smoothed_velocity = SMOOTHING_ALPHA * self.previous_velocity + (1.0 - SMOOTHING_ALPHA) * instantaneous;

        self.previous_direction = self.direction;
        self.direction = delta_position.signum() as i8;
        self.is_accelerating = self.smoothed_velocity > self.previous_velocity;
    }

    /// Reset to rest, clearing the sample ring and direction history.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.smoothed_velocity = 0.0;
        self.previous_velocity = 0.0;
        self.direction = 0;
        self.previous_direction = 0;
        self.is_accelerating = false;
    }

    /// The current smoothed velocity, in px/ms.
    pub fn velocity(&self) -> f64 { self.smoothed_velocity }

    /// The current scroll direction: -1, 0, or 1.
    pub fn direction(&self) -> i8 { self.direction }

    /// Whether the smoothed velocity increased on the last sample.
    pub fn is_accelerating(&self) -> bool { self.is_accelerating }

    /// A direction change is "significant" only if both the direction
    /// flipped and the velocity exceeds `slow_threshold` (spec §4.2); this
    /// gates prefetch-direction inversion so a single jittery wheel tick
    /// doesn't flip the buffer bias.
    pub fn significant_direction_change(&self) -> bool {
        self.previous_direction != 0
            && self.direction != 0
            && self.previous_direction != self.direction
            && self.smoothed_velocity > self.config.slow_threshold
    }

    /// Classify the current velocity into a [`Strategy`].
    pub fn strategy(&self) -> Strategy {
        if self.smoothed_velocity > self.config.fast_threshold {
            Strategy::Defer
        } else if self.smoothed_velocity < self.config.slow_threshold {
            Strategy::Immediate
        } else {
            Strategy::Maintain
        }
    }

    /// Momentum-predicted number of items the user will traverse before
    /// decelerating to `slow_threshold`, assuming exponential decay with
    /// factor `alpha` (spec §4.2 "Momentum prediction"):
    /// `time_to_slow = ln(SLOW/v) / ln(alpha)`, integrated against
    /// `deceleration_factor` to turn a time into a distance.
    fn predicted_items(&self, estimated_item_size: f64) -> usize {
        let v = self.smoothed_velocity;
        if v <= self.config.slow_threshold || estimated_item_size <= 0.0 {
            return 0;
        }
        let ratio = self.config.slow_threshold / v;
        let time_to_slow = ratio.ln() / SMOOTHING_ALPHA.ln();
        let distance = (v / self.config.deceleration_factor.max(1e-6)) * (1.0 - (-time_to_slow).exp()).max(0.0);
        (distance / estimated_item_size).round().max(0.0) as usize
    }

    /// Produce the loading guidance for the current speed state (spec §4.2
    /// "Output for callers").
    pub fn guidance(&self, estimated_item_size: f64) -> LoadingGuidance {
        match self.strategy() {
            Strategy::Defer => LoadingGuidance {
                strategy: Strategy::Defer,
                prefetch_count: self.config.viewport_capacity,
                defer_timeout_ms: self.config.defer_timeout_ms,
            },
            Strategy::Immediate => LoadingGuidance {
                strategy: Strategy::Immediate,
                prefetch_count: self.predicted_items(estimated_item_size),
                defer_timeout_ms: 0,
            },
            Strategy::Maintain => {
                let predicted = self.predicted_items(estimated_item_size);
                LoadingGuidance {
                    strategy: Strategy::Maintain,
                    prefetch_count: (self.config.viewport_capacity + predicted) / 2,
                    defer_timeout_ms: self.config.defer_timeout_ms / 2,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_tracker_classifies_immediate() {
        let tracker = SpeedTracker::new(SpeedConfig::default());
        assert_eq!(tracker.strategy(), Strategy::Immediate);
    }

    #[test]
    fn fast_flick_classifies_defer() {
        let mut tracker = SpeedTracker::new(SpeedConfig::default());
        for _ in 0..5 {
            tracker.record(500.0, 8.0);
        }
        assert_eq!(tracker.strategy(), Strategy::Defer);
        let guidance = tracker.guidance(50.0);
        assert_eq!(guidance.prefetch_count, tracker.config.viewport_capacity);
    }

    #[test]
    fn direction_change_requires_speed_above_slow_threshold() {
        let mut tracker = SpeedTracker::new(SpeedConfig::default());
        tracker.record(100.0, 8.0);
        tracker.record(-100.0, 8.0);
        assert!(tracker.significant_direction_change());

        let mut slow_tracker = SpeedTracker::new(SpeedConfig::default());
        slow_tracker.record(1.0, 50.0);
        slow_tracker.record(-1.0, 50.0);
        assert!(!slow_tracker.significant_direction_change());
    }

    #[test]
    fn sample_ring_is_bounded() {
        let mut tracker = SpeedTracker::new(SpeedConfig::default());
        for _ in 0..50 {
            tracker.record(10.0, 16.0);
        }
        assert!(tracker.samples.len() <= SAMPLE_RING_CAPACITY);
    }

    #[test]
    fn reset_clears_state() {
        let mut tracker = SpeedTracker::new(SpeedConfig::default());
        tracker.record(500.0, 8.0);
        tracker.reset();
        assert_eq!(tracker.velocity(), 0.0);
        assert_eq!(tracker.direction(), 0);
    }
}
