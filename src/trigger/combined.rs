use super::decision::{CycleDecision, CycleKind, Nanos};
use super::policy::CyclePolicy;

/// Merges any number of policies into a single decision
///
/// The merge starts from `CycleDecision::neutral()` and folds every
/// sub-policy's decision in. No policy can silently starve another: a forcing
/// policy always wins, a preventing policy wins over eligible ones, and the
/// combined next-change time is the earliest any sub-policy reported.
#[derive(Default)]
pub struct CombinedPolicy {
    policies: Vec<Box<dyn CyclePolicy>>,
}

impl CombinedPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a sub-policy. Registration order only affects the order of
    /// `cycle_triggered` notifications.
    pub fn add_policy(&mut self, policy: impl CyclePolicy + 'static) {
        tracing::debug!("cycle policy registered: {}", policy.name());
        self.policies.push(Box::new(policy));
    }

    pub fn with_policy(mut self, policy: impl CyclePolicy + 'static) -> Self {
        self.add_policy(policy);
        self
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn policy_names(&self) -> Vec<String> {
        self.policies.iter().map(|p| p.name().to_string()).collect()
    }
}

impl CyclePolicy for CombinedPolicy {
    fn name(&self) -> &str {
        "combined"
    }

    fn query(&self, now_nanos: Nanos) -> CycleDecision {
        self.policies
            .iter()
            .fold(CycleDecision::neutral(), |acc, policy| acc.merge(policy.query(now_nanos)))
    }

    fn cycle_triggered(&mut self, now_nanos: Nanos, executed: CycleKind) {
        for policy in self.policies.iter_mut() {
            policy.cycle_triggered(now_nanos, executed);
        }
    }
}
