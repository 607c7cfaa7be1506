use serde::{Deserialize, Serialize};

use super::decision::{saturating_offset, CycleDecision, CycleKind, Nanos, MAX_NANOS};
use super::policy::CyclePolicy;

/// Source of the minimum/maximum recomputation periods of a view
///
/// A missing minimum means "eligible immediately"; a missing maximum means
/// "never required".
pub trait RecomputationPeriodSource: Send + Sync {
    fn min_delta_period_ms(&self) -> Option<u64>;
    fn max_delta_period_ms(&self) -> Option<u64>;
    fn min_full_period_ms(&self) -> Option<u64>;
    fn max_full_period_ms(&self) -> Option<u64>;
}

/// Plain recomputation periods, as loaded from configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecomputationPeriods {
    #[serde(default)]
    pub min_delta_period_ms: Option<u64>,
    #[serde(default)]
    pub max_delta_period_ms: Option<u64>,
    #[serde(default)]
    pub min_full_period_ms: Option<u64>,
    #[serde(default)]
    pub max_full_period_ms: Option<u64>,
}

impl RecomputationPeriodSource for RecomputationPeriods {
    fn min_delta_period_ms(&self) -> Option<u64> {
        self.min_delta_period_ms
    }

    fn max_delta_period_ms(&self) -> Option<u64> {
        self.max_delta_period_ms
    }

    fn min_full_period_ms(&self) -> Option<u64> {
        self.min_full_period_ms
    }

    fn max_full_period_ms(&self) -> Option<u64> {
        self.max_full_period_ms
    }
}

/// Enforces minimum and maximum full/delta recomputation periods
///
/// Before the first cycle every kind is eligible and nothing is required.
/// After a cycle at `t`:
/// - delta thresholds become `t + min_delta` / `t + max_delta`
/// - full thresholds move only if the executed cycle was full
pub struct RecomputationPeriodPolicy {
    periods: Box<dyn RecomputationPeriodSource>,
    eligible_for_delta_from: Nanos,
    delta_required_by: Nanos,
    eligible_for_full_from: Nanos,
    full_required_by: Nanos,
}

impl RecomputationPeriodPolicy {
    pub fn new(periods: impl RecomputationPeriodSource + 'static) -> Self {
        Self {
            periods: Box::new(periods),
            eligible_for_delta_from: Nanos::MIN,
            delta_required_by: MAX_NANOS,
            eligible_for_full_from: Nanos::MIN,
            full_required_by: MAX_NANOS,
        }
    }

    pub fn eligible_for_delta_from(&self) -> Nanos {
        self.eligible_for_delta_from
    }

    pub fn delta_required_by(&self) -> Nanos {
        self.delta_required_by
    }

    pub fn eligible_for_full_from(&self) -> Nanos {
        self.eligible_for_full_from
    }

    pub fn full_required_by(&self) -> Nanos {
        self.full_required_by
    }

    fn min_threshold(now: Nanos, period_ms: Option<u64>) -> Nanos {
        saturating_offset(now, period_ms.unwrap_or(0))
    }

    fn max_threshold(now: Nanos, period_ms: Option<u64>) -> Nanos {
        period_ms.map_or(MAX_NANOS, |ms| saturating_offset(now, ms))
    }

    /// `MAX_NANOS` means never, even at the very end of the clock's range
    fn is_required(now: Nanos, required_by: Nanos) -> bool {
        required_by != MAX_NANOS && now >= required_by
    }
}

impl CyclePolicy for RecomputationPeriodPolicy {
    fn name(&self) -> &str {
        "recomputation-period"
    }

    fn query(&self, now_nanos: Nanos) -> CycleDecision {
        if Self::is_required(now_nanos, self.full_required_by) {
            return CycleDecision::forced(CycleKind::Full);
        }
        if Self::is_required(now_nanos, self.delta_required_by) {
            return CycleDecision::forced(CycleKind::Delta);
        }
        let required_by = self.full_required_by.min(self.delta_required_by);
        if now_nanos >= self.eligible_for_full_from {
            return CycleDecision::eligible(CycleKind::Full, Some(required_by));
        }
        if now_nanos >= self.eligible_for_delta_from {
            // Upgrades to full once the full minimum elapses
            let next = required_by.min(self.eligible_for_full_from);
            return CycleDecision::eligible(CycleKind::Delta, Some(next));
        }
        CycleDecision::prevented(Some(self.eligible_for_full_from.min(self.eligible_for_delta_from)))
    }

    fn cycle_triggered(&mut self, now_nanos: Nanos, executed: CycleKind) {
        self.eligible_for_delta_from = Self::min_threshold(now_nanos, self.periods.min_delta_period_ms());
        self.delta_required_by = Self::max_threshold(now_nanos, self.periods.max_delta_period_ms());

        if executed.is_full() {
            self.eligible_for_full_from = Self::min_threshold(now_nanos, self.periods.min_full_period_ms());
            self.full_required_by = Self::max_threshold(now_nanos, self.periods.max_full_period_ms());
        }

        tracing::trace!(
            "recomputation thresholds after {:?} cycle: delta [{}, {}], full [{}, {}]",
            executed,
            self.eligible_for_delta_from,
            self.delta_required_by,
            self.eligible_for_full_from,
            self.full_required_by
        );
    }
}
