use crate::errors::SchedulerError;
use crate::trigger::CycleKind;

/// Runs one computation cycle
///
/// The executor is asked for `Full` or `Delta` and reports the kind it
/// actually ran; an executor may run a full cycle when only a delta was
/// asked for, e.g. because its dependency graph changed.
pub trait CycleExecutor: Send {
    fn execute(&mut self, requested: CycleKind) -> Result<CycleKind, SchedulerError>;
}

impl<F> CycleExecutor for F
where
    F: FnMut(CycleKind) -> Result<CycleKind, SchedulerError> + Send,
{
    fn execute(&mut self, requested: CycleKind) -> Result<CycleKind, SchedulerError> {
        self(requested)
    }
}
