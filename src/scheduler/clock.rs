use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use chrono::Utc;

use crate::trigger::{Nanos, MAX_NANOS};

/// Source of the current time for the scheduler
pub trait Clock: Send + Sync {
    /// Nanoseconds since the Unix epoch
    fn now_nanos(&self) -> Nanos;
}

/// Wall clock backed by `chrono::Utc`
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for SystemClock {
    fn now_nanos(&self) -> Nanos {
        // Out of range only past the year 2262
        Utc::now().timestamp_nanos_opt().unwrap_or(MAX_NANOS)
    }
}

/// Manually driven clock, shared between clones
///
/// Lets tests step through time deterministically.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Arc<AtomicI64>,
}

impl ManualClock {
    pub fn new(start_nanos: Nanos) -> Self {
        Self {
            now: Arc::new(AtomicI64::new(start_nanos)),
        }
    }

    pub fn set(&self, now_nanos: Nanos) {
        self.now.store(now_nanos, Ordering::SeqCst);
    }

    /// Move the clock forward, saturating at the end of time
    pub fn advance_millis(&self, millis: u64) {
        let delta = Nanos::try_from(millis)
            .unwrap_or(Nanos::MAX)
            .saturating_mul(1_000_000);
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |now| Some(now.saturating_add(delta)));
    }
}

impl Clock for ManualClock {
    fn now_nanos(&self) -> Nanos {
        self.now.load(Ordering::SeqCst)
    }
}
