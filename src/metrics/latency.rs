use hdrhistogram::Histogram;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::trigger::CycleKind;

/// Highest trackable cycle duration: ten minutes in nanoseconds
const MAX_TRACKABLE_NS: u64 = 600_000_000_000;

/// Cycle execution latency tracker using HDR Histogram
///
/// Full and delta cycles are tracked in separate histograms.
pub struct CycleLatencyTracker {
    full_cycle_ns: Histogram<u64>,
    delta_cycle_ns: Histogram<u64>,
}

impl CycleLatencyTracker {
    pub fn new() -> Self {
        // 1ns to ten minutes, 3 significant figures
        Self {
            full_cycle_ns: Histogram::new_with_bounds(1, MAX_TRACKABLE_NS, 3).expect("static histogram bounds"),
            delta_cycle_ns: Histogram::new_with_bounds(1, MAX_TRACKABLE_NS, 3).expect("static histogram bounds"),
        }
    }

    /// Record one executed cycle
    #[inline]
    pub fn record(&mut self, kind: CycleKind, elapsed: Duration) {
        let nanos = (elapsed.as_nanos() as u64).clamp(1, MAX_TRACKABLE_NS);
        let histogram = match kind {
            CycleKind::Full => &mut self.full_cycle_ns,
            CycleKind::Delta | CycleKind::Unspecified => &mut self.delta_cycle_ns,
        };
        let _ = histogram.record(nanos);
    }

    pub fn full_stats(&self) -> LatencyStats {
        LatencyStats::from_histogram("full_cycle", &self.full_cycle_ns)
    }

    pub fn delta_stats(&self) -> LatencyStats {
        LatencyStats::from_histogram("delta_cycle", &self.delta_cycle_ns)
    }

    pub fn all_stats(&self) -> Vec<LatencyStats> {
        vec![self.full_stats(), self.delta_stats()]
    }

    /// Reset all histograms
    pub fn reset(&mut self) {
        self.full_cycle_ns.clear();
        self.delta_cycle_ns.clear();
    }
}

impl Default for CycleLatencyTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LatencyStats {
    pub metric_name: String,
    pub p50_ns: u64,
    pub p95_ns: u64,
    pub p99_ns: u64,
    pub max_ns: u64,
    pub min_ns: u64,
    pub mean_ns: f64,
    pub sample_count: u64,
}

impl LatencyStats {
    fn from_histogram(metric_name: &str, histogram: &Histogram<u64>) -> Self {
        Self {
            metric_name: metric_name.to_string(),
            p50_ns: histogram.value_at_percentile(50.0),
            p95_ns: histogram.value_at_percentile(95.0),
            p99_ns: histogram.value_at_percentile(99.0),
            max_ns: histogram.max(),
            min_ns: histogram.min(),
            mean_ns: histogram.mean(),
            sample_count: histogram.len(),
        }
    }

    /// Convert nanoseconds to milliseconds for display
    pub fn p50_ms(&self) -> f64 {
        self.p50_ns as f64 / 1_000_000.0
    }

    pub fn p99_ms(&self) -> f64 {
        self.p99_ns as f64 / 1_000_000.0
    }

    pub fn max_ms(&self) -> f64 {
        self.max_ns as f64 / 1_000_000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_tracked_separately() {
        let mut tracker = CycleLatencyTracker::new();
        tracker.record(CycleKind::Full, Duration::from_millis(40));
        tracker.record(CycleKind::Delta, Duration::from_millis(2));
        tracker.record(CycleKind::Delta, Duration::from_millis(3));

        assert_eq!(tracker.full_stats().sample_count, 1);
        assert_eq!(tracker.delta_stats().sample_count, 2);
        assert!(tracker.full_stats().p50_ms() > 39.0);
        assert!(tracker.delta_stats().max_ms() < 4.0);
    }

    #[test]
    fn test_out_of_range_durations_are_clamped() {
        let mut tracker = CycleLatencyTracker::new();
        tracker.record(CycleKind::Full, Duration::from_secs(3600));
        tracker.record(CycleKind::Full, Duration::ZERO);

        assert_eq!(tracker.full_stats().sample_count, 2);
    }

    #[test]
    fn test_reset() {
        let mut tracker = CycleLatencyTracker::new();
        tracker.record(CycleKind::Full, Duration::from_millis(1));
        tracker.reset();

        assert_eq!(tracker.all_stats().iter().map(|s| s.sample_count).sum::<u64>(), 0);
    }
}
