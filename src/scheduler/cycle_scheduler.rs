use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info};

use super::clock::Clock;
use super::config::SchedulerConfig;
use super::executor::CycleExecutor;
use crate::errors::SchedulerError;
use crate::metrics::{CycleLatencyTracker, LatencyStats};
use crate::trigger::{CombinedPolicy, CycleDecision, CycleEligibility, CycleKind, CyclePolicy, FixedTimePolicy, Nanos};

/// Result of a single scheduler step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// The policies prevented a cycle; re-query no later than `next_change_nanos`
    Waiting { next_change_nanos: Option<Nanos> },
    /// A cycle ran
    Ran {
        requested: CycleKind,
        executed: CycleKind,
        forced: bool,
    },
}

impl StepOutcome {
    pub fn ran(&self) -> bool {
        matches!(self, StepOutcome::Ran { .. })
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct SchedulerStats {
    pub cycles_run: u64,
    pub full_cycles: u64,
    pub delta_cycles: u64,
    pub forced_cycles: u64,
    pub failed_cycles: u64,
    pub last_cycle_nanos: Option<Nanos>,
    /// Empty unless cycle profiling is enabled
    pub latency: Vec<LatencyStats>,
}

/// Drives a cycle executor from the combined decision of its policies
///
/// `step` is deterministic given the clock, which is how tests drive it;
/// `run` is the same step wrapped in a tokio loop. Besides the configured
/// policies the scheduler owns an ad-hoc forcing policy fed through
/// [`CycleScheduler::force_requests`].
pub struct CycleScheduler<E: CycleExecutor, C: Clock> {
    policy: CombinedPolicy,
    adhoc: FixedTimePolicy,
    force_rx: Option<mpsc::UnboundedReceiver<Nanos>>,
    executor: E,
    clock: C,
    config: SchedulerConfig,
    latency: Option<CycleLatencyTracker>,
    stats: SchedulerStats,
}

impl<E: CycleExecutor, C: Clock> CycleScheduler<E, C> {
    pub fn new(policy: CombinedPolicy, executor: E, clock: C, config: SchedulerConfig) -> Result<Self, SchedulerError> {
        if policy.is_empty() {
            return Err(SchedulerError::NoPolicies);
        }

        let latency = config.profile_cycles.then(CycleLatencyTracker::new);

        Ok(Self {
            policy,
            adhoc: FixedTimePolicy::new(),
            force_rx: None,
            executor,
            clock,
            config,
            latency,
            stats: SchedulerStats::default(),
        })
    }

    /// Channel for forcing a cycle at given instants
    ///
    /// Calling this again replaces the previous channel.
    pub fn force_requests(&mut self) -> mpsc::UnboundedSender<Nanos> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.force_rx = Some(rx);
        tx
    }

    /// Force a cycle at the given instant
    pub fn force_cycle_at(&mut self, at_nanos: Nanos) {
        self.adhoc.add_instant(at_nanos);
    }

    /// Current combined decision, without running anything
    pub fn decision(&self) -> CycleDecision {
        let now = self.clock.now_nanos();
        self.policy.query(now).merge(self.adhoc.query(now))
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn stats(&self) -> SchedulerStats {
        let mut stats = self.stats.clone();
        if let Some(latency) = &self.latency {
            stats.latency = latency.all_stats();
        }
        stats
    }

    /// Query the policies once and run a cycle if they allow it
    ///
    /// On executor failure no policy is notified, so the same decision is
    /// reached again on the next step.
    pub fn step(&mut self) -> Result<StepOutcome, SchedulerError> {
        self.drain_force_requests();

        let now = self.clock.now_nanos();
        let decision = self.policy.query(now).merge(self.adhoc.query(now));
        debug!("Cycle decision at {}: {:?}", now, decision);

        if !decision.should_run() {
            return Ok(StepOutcome::Waiting {
                next_change_nanos: decision.next_change_nanos,
            });
        }

        let requested = if decision.kind.is_full() { CycleKind::Full } else { CycleKind::Delta };
        let forced = decision.eligibility == CycleEligibility::Forced;

        let started = Instant::now();
        let executed = match self.executor.execute(requested) {
            Ok(executed) => executed,
            Err(e) => {
                self.stats.failed_cycles += 1;
                error!("❌ {:?} cycle failed: {}", requested, e);
                return Err(e);
            }
        };
        if let Some(latency) = self.latency.as_mut() {
            latency.record(executed, started.elapsed());
        }

        self.policy.cycle_triggered(now, executed);
        self.adhoc.cycle_triggered(now, executed);

        self.stats.cycles_run += 1;
        self.stats.last_cycle_nanos = Some(now);
        if executed.is_full() {
            self.stats.full_cycles += 1;
        } else {
            self.stats.delta_cycles += 1;
        }
        if forced {
            self.stats.forced_cycles += 1;
        }

        debug!(
            "🔄 {:?} cycle executed at {} (requested {:?}, forced: {})",
            executed, now, requested, forced
        );

        Ok(StepOutcome::Ran {
            requested,
            executed,
            forced,
        })
    }

    /// Run cycles until the shutdown flag is set or its sender is dropped
    ///
    /// After a cycle the loop only yields before querying again. Otherwise it
    /// sleeps until the decision may change, capped at the poll interval.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> SchedulerStats {
        info!(
            "▶️ Cycle scheduler started with policies {:?} (poll interval {}ms)",
            self.policy.policy_names(),
            self.config.poll_interval_ms
        );

        let poll = Duration::from_millis(self.config.poll_interval_ms);

        loop {
            let stop_requested = *shutdown.borrow();
            if stop_requested || shutdown.has_changed().is_err() {
                break;
            }

            let wait = match self.step() {
                Ok(StepOutcome::Ran { .. }) => None,
                Ok(StepOutcome::Waiting { next_change_nanos }) => Some(self.wait_until(next_change_nanos, poll)),
                // Already logged in step
                Err(_) => Some(poll),
            };

            match wait {
                None => tokio::task::yield_now().await,
                Some(wait) => {
                    tokio::select! {
                        _ = tokio::time::sleep(wait) => {}
                        changed = shutdown.changed() => {
                            if changed.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        }

        let stats = self.stats();
        info!("⏹️ Cycle scheduler stopped after {} cycles", stats.cycles_run);
        stats
    }

    fn wait_until(&self, next_change_nanos: Option<Nanos>, poll: Duration) -> Duration {
        match next_change_nanos {
            Some(next) => {
                let remaining = next.saturating_sub(self.clock.now_nanos()).max(0);
                Duration::from_nanos(remaining as u64).min(poll)
            }
            None => poll,
        }
    }

    fn drain_force_requests(&mut self) {
        if let Some(rx) = self.force_rx.as_mut() {
            while let Ok(at_nanos) = rx.try_recv() {
                self.adhoc.add_instant(at_nanos);
            }
        }
    }
}
