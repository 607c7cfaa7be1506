use super::decision::{CycleDecision, CycleKind, Nanos};

/// Something the scheduler can ask whether a computation cycle should run
///
/// `query` takes `&self` and must not change any state, so it can be called
/// as often as the scheduler likes. `cycle_triggered` is the only mutating
/// call: it happens exactly once per executed cycle, after execution, with
/// the kind that actually ran.
pub trait CyclePolicy: Send + Sync {
    /// Short name used in logs
    fn name(&self) -> &str;

    fn query(&self, now_nanos: Nanos) -> CycleDecision;

    fn cycle_triggered(&mut self, now_nanos: Nanos, executed: CycleKind);
}

impl<P: CyclePolicy + ?Sized> CyclePolicy for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn query(&self, now_nanos: Nanos) -> CycleDecision {
        (**self).query(now_nanos)
    }

    fn cycle_triggered(&mut self, now_nanos: Nanos, executed: CycleKind) {
        (**self).cycle_triggered(now_nanos, executed)
    }
}
