use crate::client::MessageClient;
use crate::executor::Executor;
use crate::model::WorkItem;
use crate::shutdown::Shutdown;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::time::MissedTickBehavior;

/// Lifecycle of a pool worker, logged at trace level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WorkerState {
    WaitingForJob,
    Executing,
    RateLimitWait,
    Exited,
}

/// Receiving end of the job queue, shared by every worker of the pool.
pub type JobQueue = Arc<Mutex<mpsc::Receiver<WorkItem>>>;

/// What one worker did with the jobs it dequeued.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WorkerTally {
    pub executed: usize,
    pub skipped: usize,
}

impl WorkerTally {
    pub fn merge(&mut self, other: WorkerTally) {
        self.executed += other.executed;
        self.skipped += other.skipped;
    }
}

/// Persistent pool worker: takes one job at a time and issues at most one
/// request per `pace`. Once `shutdown` fires, remaining jobs are dequeued and
/// dropped without a request. Exits when the queue is closed and empty.
pub async fn worker<C: MessageClient>(
    rank: usize,
    queue: JobQueue,
    executor: Executor<C>,
    shutdown: Shutdown,
    pace: Duration,
) -> WorkerTally {
    let mut tally = WorkerTally::default();
    let mut pacer = tokio::time::interval(pace);
    pacer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // the first tick completes immediately
    pacer.tick().await;

    let mut state = WorkerState::WaitingForJob;
    loop {
        debug_assert_eq!(state, WorkerState::WaitingForJob);
        let job = queue.lock().await.recv().await;
        let Some(job) = job else {
            state = WorkerState::Exited;
            break;
        };

        if shutdown.is_fired() {
            tracing::debug!(rank, "skipping {} #{}", job.kind, job.sequence_index);
            tally.skipped += 1;
            continue;
        }

        state = transition(rank, state, WorkerState::Executing);
        executor.run(job).await;
        tally.executed += 1;

        state = transition(rank, state, WorkerState::RateLimitWait);
        tokio::select! {
            _ = pacer.tick() => {}
            _ = shutdown.fired() => {}
        }
        state = transition(rank, state, WorkerState::WaitingForJob);
    }

    tracing::trace!(rank, ?state, executed = tally.executed, skipped = tally.skipped, "worker done");
    tally
}

fn transition(rank: usize, from: WorkerState, to: WorkerState) -> WorkerState {
    tracing::trace!(rank, ?from, ?to, "worker");
    to
}
