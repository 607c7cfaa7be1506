// Library Crate Root
// lib.rs

// trigger decides when a cycle runs, scheduler runs it,
// market_data keeps the inputs of the next cycle current
pub mod config;
pub mod errors;
pub mod market_data;
pub mod metrics;
pub mod scheduler;
pub mod trigger;

// pub use = re-export at crate root
pub use config::EngineConfig;
pub use errors::{
    ConfigError, DistributorError, LkvStoreError, NormalizationError, SchedulerError, SinkError, SubscriptionError,
};
pub use market_data::{
    DistributionOutcome, FieldContainer, FieldValue, LiveDataSpecification, MarketDataDistributor, NormalizedUpdate,
    SubscriptionManager,
};
pub use scheduler::{Clock, CycleExecutor, CycleScheduler, SchedulerConfig, StepOutcome, SystemClock};
pub use trigger::{CombinedPolicy, CycleDecision, CycleEligibility, CycleKind, CyclePolicy};
