//! Cycle Trigger Module
//!
//! Decides when a computation cycle must run and whether it is full or delta:
//! - `decision` - Eligibility/kind enums, `CycleDecision` and merge rules
//! - `policy` - The `CyclePolicy` trait
//! - `periodic` - Minimum/maximum recomputation periods
//! - `successive_delta` - Caps the number of consecutive delta cycles
//! - `combined` - Folds many policies into one decision
//! - `fixed_time` - Ad-hoc forcing at given instants, and the always-eligible policy

pub mod combined;
pub mod decision;
pub mod fixed_time;
pub mod periodic;
pub mod policy;
pub mod successive_delta;

pub use combined::CombinedPolicy;
pub use decision::{earliest, saturating_offset, CycleDecision, CycleEligibility, CycleKind, Nanos, MAX_NANOS};
pub use fixed_time::{FixedTimePolicy, RunAsFastAsPossiblePolicy};
pub use periodic::{RecomputationPeriodPolicy, RecomputationPeriodSource, RecomputationPeriods};
pub use policy::CyclePolicy;
pub use successive_delta::SuccessiveDeltaCapPolicy;
