use serde::{Deserialize, Serialize};

/// Cycle scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Longest the scheduler sleeps before re-querying its policies
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    /// Record cycle execution times in a latency histogram
    #[serde(default)]
    pub profile_cycles: bool,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            profile_cycles: false,
        }
    }
}

fn default_poll_interval() -> u64 {
    1000
}
