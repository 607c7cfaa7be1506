//! Cycle Scheduler Module
//!
//! Runs computation cycles when the trigger policies say so:
//! - `clock` - Time source seam, wall clock and manual clock for tests
//! - `config` - Poll interval and profiling switches
//! - `executor` - The `CycleExecutor` trait
//! - `cycle_scheduler` - Deterministic `step` and the async run loop

pub mod clock;
pub mod config;
pub mod cycle_scheduler;
pub mod executor;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::SchedulerConfig;
pub use cycle_scheduler::{CycleScheduler, SchedulerStats, StepOutcome};
pub use executor::CycleExecutor;
