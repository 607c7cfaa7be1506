//! Cycle decision types and their merge rules
//!
//! A `CycleDecision` is what a single policy answers when asked "may a cycle
//! run now?". Decisions from several policies are folded together with the
//! `merge` functions below, which are commutative and associative so the
//! order in which policies were registered never changes the outcome.

use serde::{Deserialize, Serialize};

/// Nanosecond timestamp used throughout the trigger module
pub type Nanos = i64;

/// The largest representable instant. Thresholds clamp here instead of wrapping.
pub const MAX_NANOS: Nanos = i64::MAX;

/// Whether a cycle may, must, or must not run
///
/// Variants are declared in ascending dominance: `Forced` beats `Prevented`,
/// which beats `Eligible`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleEligibility {
    /// A cycle is allowed but not required
    Eligible,
    /// A cycle must not run yet
    Prevented,
    /// A cycle must run now
    Forced,
}

impl CycleEligibility {
    /// Merge two eligibilities: any `Forced` wins, then any `Prevented`
    pub fn merge(self, other: CycleEligibility) -> CycleEligibility {
        self.max(other)
    }
}

/// The kind of cycle a policy asks for, or the kind that actually ran
///
/// Variants are declared in ascending dominance: `Full` beats `Delta`, which
/// beats `Unspecified`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CycleKind {
    /// No opinion on the kind
    Unspecified,
    /// Recompute only what changed
    Delta,
    /// Recompute everything
    Full,
}

impl CycleKind {
    /// Merge two kinds: `Full` dominates `Delta` dominates `Unspecified`
    pub fn merge(self, other: CycleKind) -> CycleKind {
        self.max(other)
    }

    pub fn is_full(self) -> bool {
        self == CycleKind::Full
    }
}

/// Outcome of a trigger query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CycleDecision {
    pub eligibility: CycleEligibility,
    pub kind: CycleKind,
    /// Earliest instant at which this decision might change; `None` means no opinion
    pub next_change_nanos: Option<Nanos>,
}

impl CycleDecision {
    pub fn new(eligibility: CycleEligibility, kind: CycleKind, next_change_nanos: Option<Nanos>) -> Self {
        Self {
            eligibility,
            kind,
            next_change_nanos,
        }
    }

    /// Neutral starting point for folding several decisions together
    pub fn neutral() -> Self {
        Self::new(CycleEligibility::Eligible, CycleKind::Delta, None)
    }

    pub fn forced(kind: CycleKind) -> Self {
        Self::new(CycleEligibility::Forced, kind, None)
    }

    pub fn eligible(kind: CycleKind, next_change_nanos: Option<Nanos>) -> Self {
        Self::new(CycleEligibility::Eligible, kind, next_change_nanos)
    }

    pub fn prevented(next_change_nanos: Option<Nanos>) -> Self {
        Self::new(CycleEligibility::Prevented, CycleKind::Unspecified, next_change_nanos)
    }

    /// Whether a scheduler should run a cycle on this decision
    pub fn should_run(&self) -> bool {
        self.eligibility != CycleEligibility::Prevented
    }

    /// Fold another decision into this one
    ///
    /// Eligibility and kind are merged independently, so a `Prevented` result
    /// may still carry a `Full` kind from some other policy. Callers must
    /// ignore the kind of a prevented decision.
    pub fn merge(self, other: CycleDecision) -> CycleDecision {
        CycleDecision {
            eligibility: self.eligibility.merge(other.eligibility),
            kind: self.kind.merge(other.kind),
            next_change_nanos: earliest(self.next_change_nanos, other.next_change_nanos),
        }
    }
}

/// Minimum of two optional instants, treating `None` as +infinity
pub fn earliest(a: Option<Nanos>, b: Option<Nanos>) -> Option<Nanos> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (Some(a), None) => Some(a),
        (None, b) => b,
    }
}

/// `now + period_ms` in nanoseconds, clamped to `MAX_NANOS` on overflow
pub fn saturating_offset(now: Nanos, period_ms: u64) -> Nanos {
    let period_nanos = i64::try_from(period_ms)
        .ok()
        .and_then(|ms| ms.checked_mul(1_000_000))
        .unwrap_or(MAX_NANOS);
    now.saturating_add(period_nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eligibility_dominance() {
        use CycleEligibility::*;
        assert_eq!(Eligible.merge(Prevented), Prevented);
        assert_eq!(Prevented.merge(Eligible), Prevented);
        assert_eq!(Prevented.merge(Forced), Forced);
        assert_eq!(Eligible.merge(Forced), Forced);
        assert_eq!(Eligible.merge(Eligible), Eligible);
    }

    #[test]
    fn test_kind_dominance() {
        use CycleKind::*;
        assert_eq!(Unspecified.merge(Delta), Delta);
        assert_eq!(Delta.merge(Full), Full);
        assert_eq!(Full.merge(Unspecified), Full);
    }

    #[test]
    fn test_earliest_treats_none_as_infinity() {
        assert_eq!(earliest(Some(1000), Some(5000)), Some(1000));
        assert_eq!(earliest(None, Some(5000)), Some(5000));
        assert_eq!(earliest(Some(7), None), Some(7));
        assert_eq!(earliest(None, None), None);
    }

    #[test]
    fn test_saturating_offset_clamps() {
        assert_eq!(saturating_offset(0, 1000), 1_000_000_000);
        assert_eq!(saturating_offset(MAX_NANOS - 10, 1), MAX_NANOS);
        assert_eq!(saturating_offset(5, u64::MAX), MAX_NANOS);
    }

    #[test]
    fn test_prevented_decision_keeps_foreign_kind() {
        let merged = CycleDecision::prevented(Some(10)).merge(CycleDecision::eligible(CycleKind::Full, None));
        assert_eq!(merged.eligibility, CycleEligibility::Prevented);
        assert_eq!(merged.kind, CycleKind::Full);
        assert!(!merged.should_run());
    }
}
