use std::collections::BTreeSet;

use super::decision::{CycleDecision, CycleEligibility, CycleKind, Nanos};
use super::policy::CyclePolicy;

/// Forces a cycle at each of a set of instants
///
/// Instants can be added at any time between cycles. Once a cycle has run at
/// or after an instant, that instant is consumed.
#[derive(Debug, Clone, Default)]
pub struct FixedTimePolicy {
    instants: BTreeSet<Nanos>,
}

impl FixedTimePolicy {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_instants(instants: impl IntoIterator<Item = Nanos>) -> Self {
        Self {
            instants: instants.into_iter().collect(),
        }
    }

    pub fn add_instant(&mut self, at_nanos: Nanos) {
        self.instants.insert(at_nanos);
    }

    pub fn pending(&self) -> usize {
        self.instants.len()
    }
}

impl CyclePolicy for FixedTimePolicy {
    fn name(&self) -> &str {
        "fixed-time"
    }

    fn query(&self, now_nanos: Nanos) -> CycleDecision {
        let Some(&first) = self.instants.iter().next() else {
            return CycleDecision::eligible(CycleKind::Unspecified, None);
        };

        if first <= now_nanos {
            let following = self.instants.range(now_nanos.saturating_add(1)..).next().copied();
            CycleDecision::new(CycleEligibility::Forced, CycleKind::Unspecified, following)
        } else {
            CycleDecision::eligible(CycleKind::Unspecified, Some(first))
        }
    }

    fn cycle_triggered(&mut self, now_nanos: Nanos, _executed: CycleKind) {
        self.instants = self.instants.split_off(&now_nanos.saturating_add(1));
    }
}

/// Always eligible, never an opinion on kind or timing
#[derive(Debug, Clone, Copy, Default)]
pub struct RunAsFastAsPossiblePolicy;

impl CyclePolicy for RunAsFastAsPossiblePolicy {
    fn name(&self) -> &str {
        "run-as-fast-as-possible"
    }

    fn query(&self, _now_nanos: Nanos) -> CycleDecision {
        CycleDecision::eligible(CycleKind::Unspecified, None)
    }

    fn cycle_triggered(&mut self, _now_nanos: Nanos, _executed: CycleKind) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_policy_has_no_opinion() {
        let policy = FixedTimePolicy::new();
        assert_eq!(policy.query(100), CycleDecision::eligible(CycleKind::Unspecified, None));
    }

    #[test]
    fn test_forces_once_instant_reached() {
        let mut policy = FixedTimePolicy::with_instants([100, 300]);

        assert_eq!(policy.query(50), CycleDecision::eligible(CycleKind::Unspecified, Some(100)));

        let decision = policy.query(150);
        assert_eq!(decision.eligibility, CycleEligibility::Forced);
        assert_eq!(decision.next_change_nanos, Some(300));

        policy.cycle_triggered(150, CycleKind::Delta);
        assert_eq!(policy.pending(), 1);
        assert_eq!(policy.query(200), CycleDecision::eligible(CycleKind::Unspecified, Some(300)));
    }

    #[test]
    fn test_late_cycle_consumes_all_passed_instants() {
        let mut policy = FixedTimePolicy::with_instants([10, 20, 30, 400]);
        policy.cycle_triggered(35, CycleKind::Full);

        assert_eq!(policy.pending(), 1);
        assert_eq!(policy.query(35).next_change_nanos, Some(400));
    }

    #[test]
    fn test_ad_hoc_instant_forces_next_query() {
        let mut policy = FixedTimePolicy::new();
        policy.add_instant(0);
        assert_eq!(policy.query(0).eligibility, CycleEligibility::Forced);
    }

    #[test]
    fn test_fast_policy_always_eligible() {
        let policy = RunAsFastAsPossiblePolicy;
        assert!(policy.query(i64::MIN).should_run());
        assert!(policy.query(i64::MAX).should_run());
    }
}
