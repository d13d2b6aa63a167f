//! `request_log_cleanup` job handler: deletes `request_logs` rows older
//! than a configured retention window. Port of
//! `original_source/backend/app/db/request_logs_cleanup.py`.

use async_trait::async_trait;
use curator_core::domain::Job;
use curator_queue::handler::{HandleOutcome, JobHandler};
use curator_store::request_logs::RequestLogsRepo;
use sqlx::SqlitePool;

pub struct RequestLogCleanupHandler {
    pub retention_days: i64,
}

#[async_trait]
impl JobHandler for RequestLogCleanupHandler {
    fn job_type(&self) -> &'static str {
        "request_log_cleanup"
    }

    async fn handle(&self, pool: &SqlitePool, _job: &Job) -> anyhow::Result<HandleOutcome> {
        let cutoff = curator_core::time::to_iso_millis(
            chrono::Utc::now() - chrono::Duration::days(self.retention_days),
        );
        let repo = RequestLogsRepo::new(pool);
        let deleted = repo.delete_older_than(&cutoff).await?;
        tracing::info!(deleted, retention_days = self.retention_days, "request_log_cleanup completed");
        Ok(HandleOutcome::Completed)
    }
}
