use super::decision::{CycleDecision, CycleKind, Nanos};
use super::policy::CyclePolicy;

/// Forces the kind to `Full` after a run of consecutive delta cycles
///
/// Never forces or prevents a cycle; it only opines on the kind.
#[derive(Debug, Clone)]
pub struct SuccessiveDeltaCapPolicy {
    max_successive_deltas: u32,
    consecutive_deltas: u32,
}

impl SuccessiveDeltaCapPolicy {
    pub fn new(max_successive_deltas: u32) -> Self {
        Self {
            max_successive_deltas,
            consecutive_deltas: 0,
        }
    }

    pub fn max_successive_deltas(&self) -> u32 {
        self.max_successive_deltas
    }

    pub fn consecutive_deltas(&self) -> u32 {
        self.consecutive_deltas
    }
}

impl CyclePolicy for SuccessiveDeltaCapPolicy {
    fn name(&self) -> &str {
        "successive-delta-cap"
    }

    fn query(&self, _now_nanos: Nanos) -> CycleDecision {
        let kind = if self.consecutive_deltas >= self.max_successive_deltas {
            CycleKind::Full
        } else {
            CycleKind::Delta
        };
        CycleDecision::eligible(kind, None)
    }

    fn cycle_triggered(&mut self, _now_nanos: Nanos, executed: CycleKind) {
        match executed {
            CycleKind::Full => self.consecutive_deltas = 0,
            CycleKind::Delta => {
                // Stays at the cap until a full cycle resets it
                self.consecutive_deltas = (self.consecutive_deltas + 1).min(self.max_successive_deltas);
            }
            CycleKind::Unspecified => {
                tracing::debug!("successive-delta-cap ignoring cycle of unspecified kind");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trigger::decision::CycleEligibility;

    #[test]
    fn test_full_after_cap_reached() {
        let mut policy = SuccessiveDeltaCapPolicy::new(3);

        for t in 0..3 {
            assert_eq!(policy.query(t).kind, CycleKind::Delta);
            policy.cycle_triggered(t, CycleKind::Delta);
        }

        let decision = policy.query(3);
        assert_eq!(decision.kind, CycleKind::Full);
        assert_eq!(decision.eligibility, CycleEligibility::Eligible);
        assert_eq!(decision.next_change_nanos, None);
    }

    #[test]
    fn test_full_cycle_resets_counter() {
        let mut policy = SuccessiveDeltaCapPolicy::new(3);
        policy.cycle_triggered(0, CycleKind::Delta);
        policy.cycle_triggered(1, CycleKind::Delta);
        assert_eq!(policy.consecutive_deltas(), 2);

        policy.cycle_triggered(2, CycleKind::Full);
        assert_eq!(policy.consecutive_deltas(), 0);
        assert_eq!(policy.query(3).kind, CycleKind::Delta);
    }

    #[test]
    fn test_counter_never_exceeds_cap() {
        let mut policy = SuccessiveDeltaCapPolicy::new(2);
        for t in 0..10 {
            policy.cycle_triggered(t, CycleKind::Delta);
        }
        assert_eq!(policy.consecutive_deltas(), 2);
    }

    #[test]
    fn test_zero_cap_always_full() {
        let policy = SuccessiveDeltaCapPolicy::new(0);
        assert_eq!(policy.query(0).kind, CycleKind::Full);
    }
}
