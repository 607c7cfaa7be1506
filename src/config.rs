//! Engine configuration loaded from the environment
//!
//! | variable | field |
//! |---|---|
//! | `RISK_POLL_INTERVAL_MS` | `scheduler.poll_interval_ms` |
//! | `RISK_PROFILE_CYCLES` | `scheduler.profile_cycles` |
//! | `RISK_MIN_DELTA_PERIOD_MS` | `periods.min_delta_period_ms` |
//! | `RISK_MAX_DELTA_PERIOD_MS` | `periods.max_delta_period_ms` |
//! | `RISK_MIN_FULL_PERIOD_MS` | `periods.min_full_period_ms` |
//! | `RISK_MAX_FULL_PERIOD_MS` | `periods.max_full_period_ms` |
//! | `RISK_MAX_SUCCESSIVE_DELTAS` | `max_successive_deltas` |
//! | `RISK_LKV_DIR` | `lkv_directory` |
//! | `RISK_DEFAULT_EXPIRY_MS` | `default_expiry_ms` |

use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;
use crate::scheduler::SchedulerConfig;
use crate::trigger::{CombinedPolicy, RecomputationPeriodPolicy, RecomputationPeriods, SuccessiveDeltaCapPolicy};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub periods: RecomputationPeriods,

    /// Force a full cycle after this many consecutive deltas
    #[serde(default)]
    pub max_successive_deltas: Option<u32>,

    /// Root of the persistent last-known-value store; transient only when absent
    #[serde(default)]
    pub lkv_directory: Option<PathBuf>,

    /// How long a transient subscription lives without a heartbeat
    #[serde(default = "default_expiry_ms")]
    pub default_expiry_ms: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            periods: RecomputationPeriods::default(),
            max_successive_deltas: None,
            lkv_directory: None,
            default_expiry_ms: default_expiry_ms(),
        }
    }
}

fn default_expiry_ms() -> i64 {
    60_000
}

impl EngineConfig {
    /// Load from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Load from an arbitrary variable lookup; unset variables keep their defaults
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse(&lookup, "RISK_POLL_INTERVAL_MS")? {
            config.scheduler.poll_interval_ms = v;
        }
        if let Some(v) = parse(&lookup, "RISK_PROFILE_CYCLES")? {
            config.scheduler.profile_cycles = v;
        }

        config.periods = RecomputationPeriods {
            min_delta_period_ms: parse(&lookup, "RISK_MIN_DELTA_PERIOD_MS")?,
            max_delta_period_ms: parse(&lookup, "RISK_MAX_DELTA_PERIOD_MS")?,
            min_full_period_ms: parse(&lookup, "RISK_MIN_FULL_PERIOD_MS")?,
            max_full_period_ms: parse(&lookup, "RISK_MAX_FULL_PERIOD_MS")?,
        };
        config.max_successive_deltas = parse(&lookup, "RISK_MAX_SUCCESSIVE_DELTAS")?;
        config.lkv_directory = lookup("RISK_LKV_DIR").filter(|v| !v.trim().is_empty()).map(PathBuf::from);

        if let Some(v) = parse(&lookup, "RISK_DEFAULT_EXPIRY_MS")? {
            config.default_expiry_ms = v;
        }

        Ok(config)
    }

    /// Trigger policies described by this configuration
    pub fn build_policy(&self) -> CombinedPolicy {
        let mut policy = CombinedPolicy::new().with_policy(RecomputationPeriodPolicy::new(self.periods));
        if let Some(max) = self.max_successive_deltas {
            policy.add_policy(SuccessiveDeltaCapPolicy::new(max));
        }
        policy
    }
}

fn parse<T, F>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) if raw.trim().is_empty() => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                var: var.to_string(),
                value: raw,
            }),
    }
}
