//! In-process work queue: detection/correction units of work are
//! dispatched to a small worker pool, retried with a short backoff
//! when they fail transiently (rate limiting), and reported as failed
//! otherwise. A synchronous inline path covers callers running without
//! workers.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;
use tokio::sync::{Mutex, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::errors::CorrectionError;

pub type JobFuture = Pin<Box<dyn Future<Output = Result<(), CorrectionError>> + Send>>;

/// A unit of work as a re-invokable factory, so retries run a fresh
/// future.
pub type JobFactory = Arc<dyn Fn() -> JobFuture + Send + Sync>;

const WORKER_POLL_INTERVAL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone)]
pub struct QueueItem {
    pub id: Uuid,
    pub priority: i32,
    pub attempts: i32,
    pub max_attempts: i32,
    pub created_at: DateTime<Utc>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub pending_count: usize,
    pub completed_count: usize,
    pub failed_count: usize,
}

struct PendingJob {
    item: QueueItem,
    job: JobFactory,
}

impl PartialEq for PendingJob {
    fn eq(&self, other: &Self) -> bool {
        self.item.id == other.item.id
    }
}

impl Eq for PendingJob {}

impl PartialOrd for PendingJob {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PendingJob {
    fn cmp(&self, other: &Self) -> Ordering {
        // higher priority first, then oldest first
        self.item
            .priority
            .cmp(&other.item.priority)
            .then_with(|| other.item.created_at.cmp(&self.item.created_at))
    }
}

struct QueueState {
    pending: Mutex<BinaryHeap<PendingJob>>,
    stats: Mutex<QueueStats>,
    shutdown: AtomicBool,
    semaphore: Arc<Semaphore>,
    max_attempts: i32,
    backoff: Duration,
}

/// Priority job queue with transient-only retry. A single dispatcher
/// pulls jobs in priority order and runs each on its own task, with a
/// semaphore capping how many run at once.
#[derive(Clone)]
pub struct JobQueue {
    state: Arc<QueueState>,
}

impl JobQueue {
    pub fn new(max_attempts: i32, backoff: Duration, concurrent_limit: usize) -> Self {
        Self {
            state: Arc::new(QueueState {
                pending: Mutex::new(BinaryHeap::new()),
                stats: Mutex::new(QueueStats::default()),
                shutdown: AtomicBool::new(false),
                semaphore: Arc::new(Semaphore::new(concurrent_limit.max(1))),
                max_attempts: max_attempts.max(1),
                backoff,
            }),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.max_job_attempts,
            Duration::from_secs(config.retry_backoff_secs),
            config.worker_count,
        )
    }

    /// Queue a unit of work; returns its id.
    pub async fn enqueue(&self, priority: i32, job: JobFactory) -> Uuid {
        let item = QueueItem {
            id: Uuid::new_v4(),
            priority,
            attempts: 0,
            max_attempts: self.state.max_attempts,
            created_at: Utc::now(),
            error_message: None,
        };
        let id = item.id;

        self.state.pending.lock().await.push(PendingJob { item, job });
        id
    }

    /// Spawn the dispatcher loop. It drains the queue in priority
    /// order until `shutdown`, running each job on its own task behind
    /// the concurrency semaphore.
    pub fn start_dispatcher(&self) -> JoinHandle<()> {
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            info!("Correction dispatcher started");
            loop {
                if state.shutdown.load(AtomicOrdering::SeqCst) {
                    break;
                }

                let next = state.pending.lock().await.pop();
                match next {
                    Some(pending) => {
                        let permit = match Arc::clone(&state.semaphore).acquire_owned().await {
                            Ok(permit) => permit,
                            Err(_) => break,
                        };
                        let state = Arc::clone(&state);
                        tokio::spawn(async move {
                            Self::process(&state, pending).await;
                            drop(permit);
                        });
                    }
                    None => sleep(WORKER_POLL_INTERVAL).await,
                }
            }
            info!("Correction dispatcher stopped");
        })
    }

    pub fn shutdown(&self) {
        self.state.shutdown.store(true, AtomicOrdering::SeqCst);
    }

    pub async fn stats(&self) -> QueueStats {
        let mut stats = self.state.stats.lock().await.clone();
        stats.pending_count = self.state.pending.lock().await.len();
        stats
    }

    /// Fallback path when no workers are running: execute the job on
    /// the caller's task with the same retry policy and return the
    /// terminal result.
    pub async fn run_inline(&self, job: JobFactory) -> Result<(), CorrectionError> {
        let mut attempts = 0;
        loop {
            attempts += 1;
            match job().await {
                Ok(()) => return Ok(()),
                Err(err) if err.is_transient() && attempts < self.state.max_attempts => {
                    warn!(
                        "Transient failure (attempt {}/{}), backing off: {}",
                        attempts, self.state.max_attempts, err
                    );
                    sleep(self.state.backoff).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    async fn process(state: &Arc<QueueState>, mut pending: PendingJob) {
        pending.item.attempts += 1;

        match (pending.job)().await {
            Ok(()) => {
                state.stats.lock().await.completed_count += 1;
            }
            Err(err) if err.is_transient() && pending.item.attempts < pending.item.max_attempts => {
                warn!(
                    "Job {} failed transiently (attempt {}/{}), requeueing: {}",
                    pending.item.id, pending.item.attempts, pending.item.max_attempts, err
                );
                sleep(state.backoff).await;
                pending.item.error_message = Some(err.to_string());
                state.pending.lock().await.push(pending);
            }
            Err(err) => {
                error!(
                    "Job {} failed after {} attempt(s): {}",
                    pending.item.id, pending.item.attempts, err
                );
                state.stats.lock().await.failed_count += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    fn counting_job(
        calls: Arc<AtomicU32>,
        result_for_call: impl Fn(u32) -> Result<(), CorrectionError> + Send + Sync + 'static,
    ) -> JobFactory {
        let result_for_call = Arc::new(result_for_call);
        Arc::new(move || {
            let calls = Arc::clone(&calls);
            let result_for_call = Arc::clone(&result_for_call);
            Box::pin(async move {
                let call = calls.fetch_add(1, AtomicOrdering::SeqCst);
                result_for_call(call)
            })
        })
    }

    async fn wait_for<F, Fut>(mut condition: F)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = bool>,
    {
        tokio::time::timeout(Duration::from_secs(5), async {
            while !condition().await {
                sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("condition not reached in time");
    }

    #[tokio::test]
    async fn inline_success_runs_once() {
        let queue = JobQueue::new(3, Duration::from_millis(5), 1);
        let calls = Arc::new(AtomicU32::new(0));

        queue
            .run_inline(counting_job(Arc::clone(&calls), |_| Ok(())))
            .await
            .unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn inline_retries_transient_failures_then_succeeds() {
        let queue = JobQueue::new(3, Duration::from_millis(5), 1);
        let calls = Arc::new(AtomicU32::new(0));

        queue
            .run_inline(counting_job(Arc::clone(&calls), |call| {
                if call == 0 {
                    Err(CorrectionError::RateLimited { details: "quota".into() })
                } else {
                    Ok(())
                }
            }))
            .await
            .unwrap();
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    }

    #[tokio::test]
    async fn inline_does_not_retry_terminal_failures() {
        let queue = JobQueue::new(3, Duration::from_millis(5), 1);
        let calls = Arc::new(AtomicU32::new(0));

        let err = queue
            .run_inline(counting_job(Arc::clone(&calls), |_| {
                Err(CorrectionError::EditorFailed { details: "boom".into() })
            }))
            .await
            .unwrap_err();

        assert!(!err.is_transient());
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 1);
    }

    #[tokio::test]
    async fn inline_transient_failures_exhaust_the_attempt_budget() {
        let queue = JobQueue::new(3, Duration::from_millis(5), 1);
        let calls = Arc::new(AtomicU32::new(0));

        let err = queue
            .run_inline(counting_job(Arc::clone(&calls), |_| {
                Err(CorrectionError::RateLimited { details: "quota".into() })
            }))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert_eq!(calls.load(AtomicOrdering::SeqCst), 3);
    }

    #[tokio::test]
    async fn workers_drain_jobs_in_priority_order() {
        let queue = JobQueue::new(3, Duration::from_millis(5), 1);
        let order: Arc<Mutex<Vec<i32>>> = Arc::new(Mutex::new(Vec::new()));

        for priority in [1, 10, 5] {
            let order = Arc::clone(&order);
            queue
                .enqueue(
                    priority,
                    Arc::new(move || {
                        let order = Arc::clone(&order);
                        Box::pin(async move {
                            order.lock().await.push(priority);
                            Ok(())
                        })
                    }),
                )
                .await;
        }

        let dispatcher = queue.start_dispatcher();
        wait_for(|| async { queue.stats().await.completed_count == 3 }).await;
        queue.shutdown();
        dispatcher.await.unwrap();

        assert_eq!(*order.lock().await, vec![10, 5, 1]);
    }

    #[tokio::test]
    async fn queued_transient_job_fails_after_attempt_budget() {
        let queue = JobQueue::new(2, Duration::from_millis(5), 1);
        let calls = Arc::new(AtomicU32::new(0));

        queue
            .enqueue(
                0,
                counting_job(Arc::clone(&calls), |_| {
                    Err(CorrectionError::RateLimited { details: "quota".into() })
                }),
            )
            .await;

        let dispatcher = queue.start_dispatcher();
        wait_for(|| async { queue.stats().await.failed_count == 1 }).await;
        queue.shutdown();
        dispatcher.await.unwrap();

        assert_eq!(calls.load(AtomicOrdering::SeqCst), 2);
    }
}
