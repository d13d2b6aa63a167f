use crate::registry::HandlerRegistry;
use curator_store::jobs::JobsRepo;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::interval;
use tracing::{error, info, warn};

/// Claim/dispatch loop. Generalized from the teacher's
/// `HealthChecker::start_active_check` (`tokio::time::interval` +
/// `tokio::spawn`, one long-lived task per concern) into a poll loop
/// that claims one job at a time and hands it to the handler registered
/// for its `type`.
pub struct Dispatcher {
    pool: SqlitePool,
    registry: Arc<HandlerRegistry>,
    worker_id: String,
    lock_ttl_s: i64,
}

impl Dispatcher {
    pub fn new(pool: SqlitePool, registry: Arc<HandlerRegistry>, worker_id: String, lock_ttl_s: i64) -> Self {
        Self { pool, registry, worker_id, lock_ttl_s }
    }

    /// Run the claim/dispatch loop forever. `poll_interval` governs how
    /// often an empty queue is re-checked; a successful claim loops back
    /// immediately rather than waiting out the tick.
    pub fn spawn(self: Arc<Self>, poll_interval: Duration) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut tick = interval(poll_interval);
            loop {
                tick.tick().await;
                while self.dispatch_one().await {}
            }
        })
    }

    /// Claim and run a single job. Returns `true` if a job was claimed
    /// (whether or not it succeeded), so the caller can keep draining the
    /// queue without waiting for the next tick.
    async fn dispatch_one(&self) -> bool {
        let jobs = JobsRepo::new(&self.pool);
        let job = match jobs.claim_next(&self.worker_id, self.lock_ttl_s).await {
            Ok(Some(job)) => job,
            Ok(None) => return false,
            Err(err) => {
                error!(error = %err, "failed to claim next job");
                return false;
            }
        };

        let Some(handler) = self.registry.get(&job.job_type) else {
            warn!(job_type = %job.job_type, job_id = job.id, "no handler registered for job type");
            let _ = jobs.fail_permanently(job.id, "no handler registered").await;
            return true;
        };

        info!(job_id = job.id, job_type = %job.job_type, attempt = job.attempt, "dispatching job");
        match handler.handle(&self.pool, &job).await {
            Ok(crate::handler::HandleOutcome::Completed) => {
                if let Err(err) = jobs.complete(job.id).await {
                    error!(job_id = job.id, error = %err, "failed to mark job complete");
                }
            }
            Ok(crate::handler::HandleOutcome::Failed) => {
                let backoff_s = curator_upstream::failover::job_backoff_seconds(job.attempt);
                let next_run_after = curator_core::time::to_iso_millis(
                    chrono::Utc::now() + chrono::Duration::seconds(backoff_s),
                );
                if let Err(err) = jobs
                    .fail_and_reschedule(job.id, "handler reported failure", Some(&next_run_after))
                    .await
                {
                    error!(job_id = job.id, error = %err, "failed to reschedule job");
                }
            }
            Err(err) => {
                error!(job_id = job.id, error = %err, "handler panicked or returned an error");
                let backoff_s = curator_upstream::failover::job_backoff_seconds(job.attempt);
                let next_run_after = curator_core::time::to_iso_millis(
                    chrono::Utc::now() + chrono::Duration::seconds(backoff_s),
                );
                let _ = jobs
                    .fail_and_reschedule(job.id, &err.to_string(), Some(&next_run_after))
                    .await;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::{HandleOutcome, JobHandler};
    use curator_core::domain::Job;
    use curator_store::pool::connect;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingHandler {
        calls: Arc<AtomicUsize>,
        outcome: HandleOutcome,
    }

    #[async_trait::async_trait]
    impl JobHandler for CountingHandler {
        fn job_type(&self) -> &'static str {
            "counting_job"
        }
        async fn handle(&self, _pool: &SqlitePool, _job: &Job) -> anyhow::Result<HandleOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.outcome)
        }
    }

    #[tokio::test]
    async fn dispatch_one_completes_a_claimed_job() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let jobs = JobsRepo::new(&pool);
        let id = jobs.enqueue("counting_job", "{}", 0, 3, None, None, None).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(CountingHandler { calls: calls.clone(), outcome: HandleOutcome::Completed }));

        let dispatcher = Dispatcher::new(pool.clone(), Arc::new(registry), "worker-a".into(), 300);
        assert!(dispatcher.dispatch_one().await);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        let job = jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, "completed");
    }

    #[tokio::test]
    async fn dispatch_one_reschedules_on_failure() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let jobs = JobsRepo::new(&pool);
        let id = jobs.enqueue("counting_job", "{}", 0, 3, None, None, None).await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let mut registry = HandlerRegistry::new();
        registry.register(Arc::new(CountingHandler { calls, outcome: HandleOutcome::Failed }));

        let dispatcher = Dispatcher::new(pool.clone(), Arc::new(registry), "worker-a".into(), 300);
        assert!(dispatcher.dispatch_one().await);

        let job = jobs.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, "pending");
        assert!(job.run_after.is_some());
    }

    #[tokio::test]
    async fn dispatch_one_on_empty_queue_returns_false() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let dispatcher = Dispatcher::new(pool, Arc::new(HandlerRegistry::new()), "worker-a".into(), 300);
        assert!(!dispatcher.dispatch_one().await);
    }
}
