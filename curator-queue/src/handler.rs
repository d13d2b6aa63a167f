//! The job-handler trait. Generalized from the teacher's
//! `Plugin`/`PluginInstance` shape (`name() -> &str`, `async fn execute`)
//! and from `estuary-flow::agent::handlers::Handler`'s `HandleResult`
//! idiom (the two-value "did work / no work" signal a poll loop needs to
//! decide its own backoff).

use async_trait::async_trait;
use curator_core::domain::Job;
use sqlx::SqlitePool;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleOutcome {
    Completed,
    /// Retryable failure; the dispatcher reschedules with backoff.
    Failed,
}

#[async_trait]
pub trait JobHandler: Send + Sync {
    /// The `jobs.type` value this handler is registered under.
    fn job_type(&self) -> &'static str;

    async fn handle(&self, pool: &SqlitePool, job: &Job) -> anyhow::Result<HandleOutcome>;
}
