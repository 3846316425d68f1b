//! Dispatch engine: decides when requests fire and how many are in flight.
//!
//! Two policies share one entry point, [`Engine::run`]:
//!
//! - [`DispatchMode::Interval`] issues one new request per tick until the
//!   duration elapses, then drains everything still in flight.
//!   `RUNNING -> DRAINING -> DONE`.
//! - [`DispatchMode::Quota`] fills a bounded queue of `total` jobs in shuffled
//!   batches and lets `workers` persistent workers drain it, each paced to one
//!   request per `pace`.
//!
//! Both observe the [`Shutdown`] signal only between requests. Every job that
//! is dispatched is either executed or explicitly skipped, so `run` always
//! returns.

use crate::client::MessageClient;
use crate::config::{Config, RunMode};
use crate::endpoint::EndpointState;
use crate::executor::Executor;
use crate::model::{AggregateStats, WorkItem};
use crate::shutdown::{Shutdown, StopReason};
use crate::stats::{Recorder, StatsObserver};
use crate::worker::{worker, JobQueue, WorkerTally};
use crate::workload::WorkloadGenerator;
use futures::future::join_all;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;
use tokio_util::task::TaskTracker;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DispatchMode {
    Interval {
        duration: Duration,
        tick: Duration,
    },
    Quota {
        total: usize,
        workers: usize,
        batch_size: usize,
        pace: Duration,
    },
}

impl DispatchMode {
    pub fn from_config(config: &Config) -> Self {
        match config.mode {
            RunMode::Interval => DispatchMode::Interval {
                duration: config.duration(),
                tick: config.interval(),
            },
            RunMode::Quota => DispatchMode::Quota {
                total: config.total_requests,
                workers: config.worker_number,
                batch_size: config.batch_size,
                pace: config.interval(),
            },
        }
    }

    /// Lift zero knobs to their smallest usable value: a zero period would
    /// panic the timers and an empty batch would never make progress.
    pub fn normalized(self) -> Self {
        const MIN_PERIOD: Duration = Duration::from_millis(1);
        match self {
            DispatchMode::Interval { duration, tick } => DispatchMode::Interval {
                duration,
                tick: tick.max(MIN_PERIOD),
            },
            DispatchMode::Quota {
                total,
                workers,
                batch_size,
                pace,
            } => DispatchMode::Quota {
                total,
                workers: workers.max(1),
                batch_size: batch_size.max(1),
                pace: pace.max(MIN_PERIOD),
            },
        }
    }
}

/// Final state of a run, handed to reporting after every task has joined.
#[derive(Debug)]
pub struct RunReport {
    pub stats: AggregateStats,
    /// `None` when the run completed on its own.
    pub stop_reason: Option<StopReason>,
    pub elapsed: Duration,
    /// Jobs handed to executors or enqueued for workers.
    pub dispatched: usize,
    /// Enqueued jobs dropped by workers after shutdown.
    pub skipped: usize,
}

pub struct Engine<C> {
    executor: Executor<C>,
    generator: WorkloadGenerator,
    shutdown: Shutdown,
}

impl<C: MessageClient> Engine<C> {
    pub fn new(
        client: Arc<C>,
        endpoint: impl Into<String>,
        generator: WorkloadGenerator,
        shutdown: Shutdown,
    ) -> Self {
        let executor = Executor::new(client, EndpointState::new(endpoint), Recorder::new());
        Self {
            executor,
            generator,
            shutdown,
        }
    }

    /// Live view of the stats, for progress display.
    pub fn recorder(&self) -> Recorder {
        self.executor.recorder().clone()
    }

    /// Progress view that does not keep the stats alive past the run.
    pub fn observer(&self) -> StatsObserver {
        self.executor.recorder().observer()
    }

    pub fn endpoint(&self) -> EndpointState {
        self.executor.endpoint().clone()
    }

    pub fn shutdown(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub async fn run(self, mode: DispatchMode) -> RunReport {
        let Engine {
            executor,
            mut generator,
            shutdown,
        } = self;
        let mode = mode.normalized();
        tracing::info!(?mode, seed = generator.seed(), "run started");
        let start = Instant::now();

        let (dispatched, skipped) = match mode {
            DispatchMode::Interval { duration, tick } => {
                let dispatched =
                    run_interval(&executor, &mut generator, &shutdown, duration, tick).await;
                (dispatched, 0)
            }
            DispatchMode::Quota {
                total,
                workers,
                batch_size,
                pace,
            } => {
                let (dispatched, tally) = run_quota(
                    &executor,
                    &mut generator,
                    &shutdown,
                    total,
                    workers,
                    batch_size,
                    pace,
                )
                .await;
                (dispatched, tally.skipped)
            }
        };

        let elapsed = start.elapsed();
        let recorder = executor.recorder().clone();
        drop(executor);
        let stats = recorder.finish();
        tracing::info!(
            total = stats.total,
            dispatched,
            skipped,
            elapsed_ms = elapsed.as_millis() as u64,
            "run done"
        );
        RunReport {
            stats,
            stop_reason: shutdown.reason(),
            elapsed,
            dispatched,
            skipped,
        }
    }
}

/// Returns the number of requests launched.
async fn run_interval<C: MessageClient>(
    executor: &Executor<C>,
    generator: &mut WorkloadGenerator,
    shutdown: &Shutdown,
    duration: Duration,
    tick: Duration,
) -> usize {
    let tracker = TaskTracker::new();
    let mut ticker = tokio::time::interval(tick);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // first fire is one interval in
    ticker.tick().await;
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    let mut launched = 0;
    loop {
        tokio::select! {
            biased;
            _ = &mut deadline => {
                shutdown.fire(StopReason::DurationElapsed);
                break;
            }
            _ = shutdown.fired() => break,
            _ = ticker.tick() => {
                let item = generator.sample();
                let executor = executor.clone();
                tracker.spawn(async move {
                    executor.run(item).await;
                });
                launched += 1;
            }
        }
    }

    tracker.close();
    tracing::info!(in_flight = tracker.len(), "draining");
    tracker.wait().await;
    launched
}

/// Returns the number of jobs enqueued and the merged worker tallies.
async fn run_quota<C: MessageClient>(
    executor: &Executor<C>,
    generator: &mut WorkloadGenerator,
    shutdown: &Shutdown,
    total: usize,
    workers: usize,
    batch_size: usize,
    pace: Duration,
) -> (usize, WorkerTally) {
    let (tx, rx) = mpsc::channel(total.max(1));
    let queue: JobQueue = Arc::new(Mutex::new(rx));

    let handles: Vec<_> = (0..workers)
        .map(|rank| {
            tokio::spawn(worker(
                rank,
                queue.clone(),
                executor.clone(),
                shutdown.clone(),
                pace,
            ))
        })
        .collect();

    let enqueued = produce(&tx, generator, shutdown, total, batch_size).await;
    // closing the queue lets workers exit once it is drained
    drop(tx);
    tracing::info!(enqueued, "producer done");

    let mut tally = WorkerTally::default();
    for result in join_all(handles).await {
        match result {
            Ok(t) => tally.merge(t),
            Err(e) => tracing::error!("worker task failed: {e}"),
        }
    }
    (enqueued, tally)
}

/// Enqueue up to `total` jobs in shuffled batches, stopping early if the
/// signal fires. A batch interrupted by shutdown is abandoned.
async fn produce(
    tx: &mpsc::Sender<WorkItem>,
    generator: &mut WorkloadGenerator,
    shutdown: &Shutdown,
    total: usize,
    batch_size: usize,
) -> usize {
    let mut enqueued = 0;
    'batches: while enqueued < total {
        if shutdown.is_fired() {
            break;
        }
        let batch = generator.batch(batch_size.min(total - enqueued));
        for item in batch {
            if shutdown.is_fired() {
                break 'batches;
            }
            if tx.send(item).await.is_err() {
                break 'batches;
            }
            enqueued += 1;
        }
        tokio::task::yield_now().await;
    }
    enqueued
}
