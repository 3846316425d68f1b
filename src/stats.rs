//! Shared, lock-protected accumulator of request outcomes.

use crate::model::{AggregateStats, RequestOutcome, WorkKind};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Counters without the result log, cheap enough to poll for progress.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct StatsSnapshot {
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
    pub total_latency_ms: f64,
}

impl StatsSnapshot {
    fn of(stats: &AggregateStats) -> Self {
        Self {
            total: stats.total,
            successful: stats.successful(),
            failed: stats.failed(),
            total_latency_ms: stats.total_latency_ms,
        }
    }
}

/// Read-only handle that goes dead once the run's stats are finished.
#[derive(Clone, Debug)]
pub struct StatsObserver(Weak<Mutex<AggregateStats>>);

impl StatsObserver {
    /// `None` after the last [`Recorder`] is gone.
    pub fn snapshot(&self) -> Option<StatsSnapshot> {
        let stats = self.0.upgrade()?;
        let guard = stats.lock().unwrap_or_else(PoisonError::into_inner);
        Some(StatsSnapshot::of(&guard))
    }
}

/// Clone-friendly handle on the run's [`AggregateStats`].
///
/// Every mutation goes through [`Recorder::record`], which appends the
/// outcome and bumps its counter under one lock acquisition.
#[derive(Clone, Debug, Default)]
pub struct Recorder(Arc<Mutex<AggregateStats>>);

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, outcome: RequestOutcome) {
        let mut stats = self.lock();
        stats.total += 1;
        stats.total_latency_ms += outcome.latency_ms;
        match (outcome.kind(), outcome.success) {
            (WorkKind::Post, true) => stats.successful_posts += 1,
            (WorkKind::Post, false) => stats.failed_posts += 1,
            (WorkKind::Get, true) => stats.successful_gets += 1,
            (WorkKind::Get, false) => stats.failed_gets += 1,
        }
        stats.results.push(outcome);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot::of(&self.lock())
    }

    /// Weak view for pollers; holding it does not stop [`Recorder::finish`]
    /// from taking the stats by move.
    pub fn observer(&self) -> StatsObserver {
        StatsObserver(Arc::downgrade(&self.0))
    }

    /// Consume the handle and return the final stats, or a copy of the
    /// current state if other clones are still alive.
    pub fn finish(self) -> AggregateStats {
        match Arc::try_unwrap(self.0) {
            Ok(mutex) => mutex.into_inner().unwrap_or_else(PoisonError::into_inner),
            Err(shared) => shared
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, AggregateStats> {
        // counters and log stay in step even if a holder panicked
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
