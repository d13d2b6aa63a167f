use curator_core::domain::Job;
use curator_core::time::now_iso_millis;
use sqlx::SqlitePool;

pub struct JobsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn enqueue(
        &self,
        job_type: &str,
        payload_json: &str,
        priority: i64,
        max_attempts: i64,
        run_after: Option<&str>,
        ref_type: Option<&str>,
        ref_id: Option<&str>,
    ) -> Result<i64, sqlx::Error> {
        let now = now_iso_millis();
        let rec = sqlx::query(
            "INSERT INTO jobs (type, status, priority, run_after, attempt, max_attempts, payload_json, ref_type, ref_id, created_at, updated_at)
             VALUES (?, 'pending', ?, ?, 0, ?, ?, ?, ?, ?, ?)",
        )
        .bind(job_type)
        .bind(priority)
        .bind(run_after)
        .bind(max_attempts)
        .bind(payload_json)
        .bind(ref_type)
        .bind(ref_id)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;
        Ok(rec.last_insert_rowid())
    }

    /// `enqueue`, but a no-op when a row with the same `(type, ref_type,
    /// ref_id)` already sits in `{pending, running}` — the de-dup rule
    /// §4.F and §4.J both lean on (opportunistic hydrate, heal_url,
    /// proxy-probe/easy-proxies/cleanup sub-loops). Returns `None` on the
    /// no-op path, `Some(id)` for a fresh insert.
    pub async fn enqueue_deduped(
        &self,
        job_type: &str,
        payload_json: &str,
        priority: i64,
        max_attempts: i64,
        ref_type: &str,
        ref_id: &str,
    ) -> Result<Option<i64>, sqlx::Error> {
        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM jobs WHERE type = ? AND ref_type = ? AND ref_id = ? AND status IN ('pending', 'running') LIMIT 1",
        )
        .bind(job_type)
        .bind(ref_type)
        .bind(ref_id)
        .fetch_optional(self.pool)
        .await?;
        if existing.is_some() {
            return Ok(None);
        }
        let id = self
            .enqueue(job_type, payload_json, priority, max_attempts, None, Some(ref_type), Some(ref_id))
            .await?;
        Ok(Some(id))
    }

    /// Single-row claim via `UPDATE ... WHERE id IN (candidate)` inside a
    /// transaction, the same shape as `jobs/claim.py`'s `WITH candidate AS
    /// (...) UPDATE ... RETURNING *` (SQLite's transaction is the
    /// mutual-exclusion boundary standing in for Postgres's `FOR UPDATE
    /// SKIP LOCKED`). Eligible rows are `pending`, `failed`, or `running`
    /// with a lock older than `lock_ttl_s`, whose `run_after` has elapsed;
    /// ordered by priority then id for FIFO-within-priority fairness.
    /// Both timestamp bounds are computed in application code as ISO-8601
    /// strings and compared lexically — matching `locked_at`'s own
    /// string format, unlike SQLite's `datetime()` output.
    pub async fn claim_next(&self, worker_id: &str, lock_ttl_s: i64) -> Result<Option<Job>, sqlx::Error> {
        let now = now_iso_millis();
        let lock_expired_before = curator_core::time::to_iso_millis(
            chrono::Utc::now() - chrono::Duration::seconds(lock_ttl_s),
        );
        let mut tx = self.pool.begin().await?;

        let candidate: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM jobs
             WHERE status IN ('pending', 'failed', 'running')
               AND (run_after IS NULL OR run_after <= ?)
               AND (locked_at IS NULL OR locked_at <= ?)
             ORDER BY priority DESC, id ASC
             LIMIT 1",
        )
        .bind(&now)
        .bind(&lock_expired_before)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(id) = candidate else {
            tx.commit().await?;
            return Ok(None);
        };

        // Re-checks the same claim predicate the SELECT used, so a
        // concurrent claimant that raced us between the SELECT and this
        // UPDATE (and won) leaves `rows_affected() == 0` here rather than
        // silently double-claiming the row.
        let result = sqlx::query(
            "UPDATE jobs SET status = 'running', locked_by = ?, locked_at = ?, attempt = attempt + 1, updated_at = ?
             WHERE id = ?
               AND status IN ('pending', 'failed', 'running')
               AND (run_after IS NULL OR run_after <= ?)
               AND (locked_at IS NULL OR locked_at <= ?)",
        )
        .bind(worker_id)
        .bind(&now)
        .bind(&now)
        .bind(id)
        .bind(&now)
        .bind(&lock_expired_before)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.commit().await?;
            return Ok(None);
        }

        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Some(job))
    }

    /// Extend a long-running job's lock without releasing it, used by the
    /// worker heartbeat loop.
    pub async fn renew_lock(&self, id: i64, worker_id: &str) -> Result<bool, sqlx::Error> {
        let now = now_iso_millis();
        let result = sqlx::query(
            "UPDATE jobs SET locked_at = ?, updated_at = ? WHERE id = ? AND locked_by = ? AND status = 'running'",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .bind(worker_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn complete(&self, id: i64) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        sqlx::query(
            "UPDATE jobs SET status = 'completed', locked_by = NULL, locked_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Reschedule after a retryable failure: back to `pending` with the
    /// backoff-computed `run_after`, or `dlq` once `attempt >= max_attempts`.
    pub async fn fail_and_reschedule(&self, id: i64, error: &str, next_run_after: Option<&str>) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        let job = sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_one(self.pool)
            .await?;
        let next_status = if job.attempt >= job.max_attempts { "dlq" } else { "pending" };
        sqlx::query(
            "UPDATE jobs SET status = ?, run_after = ?, last_error = ?, locked_by = NULL, locked_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(next_status)
        .bind(next_run_after)
        .bind(error)
        .bind(&now)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Short-circuits straight to `dlq`, bypassing the retry budget
    /// entirely. For failures that no amount of re-attempting would fix,
    /// such as a job `type` with no registered handler.
    pub async fn fail_permanently(&self, id: i64, error: &str) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        sqlx::query(
            "UPDATE jobs SET status = 'dlq', last_error = ?, locked_by = NULL, locked_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(error)
        .bind(&now)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn pause(&self, id: i64) -> Result<(), sqlx::Error> {
        self.set_status(id, "paused").await
    }

    pub async fn resume(&self, id: i64) -> Result<(), sqlx::Error> {
        self.set_status(id, "pending").await
    }

    pub async fn cancel(&self, id: i64) -> Result<(), sqlx::Error> {
        self.set_status(id, "canceled").await
    }

    async fn set_status(&self, id: i64, status: &str) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        sqlx::query("UPDATE jobs SET status = ?, updated_at = ? WHERE id = ?")
            .bind(status)
            .bind(&now)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await
    }

    pub async fn list_by_status(&self, status: &str, limit: i64) -> Result<Vec<Job>, sqlx::Error> {
        sqlx::query_as::<_, Job>("SELECT * FROM jobs WHERE status = ? ORDER BY id DESC LIMIT ?")
            .bind(status)
            .bind(limit)
            .fetch_all(self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connect;

    async fn test_pool() -> SqlitePool {
        connect("sqlite::memory:", 30_000, 1).await.unwrap()
    }

    #[tokio::test]
    async fn claim_takes_single_pending_job_and_hides_it_from_other_workers() {
        let pool = test_pool().await;
        let repo = JobsRepo::new(&pool);
        repo.enqueue("hydrate_metadata", "{}", 0, 3, None, None, None).await.unwrap();
        let claimed = repo.claim_next("worker-a", 300).await.unwrap().unwrap();
        assert_eq!(claimed.status, "running");
        let nothing_left = repo.claim_next("worker-b", 300).await.unwrap();
        assert!(nothing_left.is_none());
    }

    #[tokio::test]
    async fn claim_respects_priority_order() {
        let pool = test_pool().await;
        let repo = JobsRepo::new(&pool);
        repo.enqueue("low", "{}", 0, 3, None, None, None).await.unwrap();
        repo.enqueue("high", "{}", 10, 3, None, None, None).await.unwrap();
        let claimed = repo.claim_next("worker-a", 300).await.unwrap().unwrap();
        assert_eq!(claimed.job_type, "high");
    }

    #[tokio::test]
    async fn fail_and_reschedule_moves_to_dlq_once_exhausted() {
        let pool = test_pool().await;
        let repo = JobsRepo::new(&pool);
        let id = repo.enqueue("hydrate_metadata", "{}", 0, 1, None, None, None).await.unwrap();
        repo.claim_next("w", 300).await.unwrap();
        repo.fail_and_reschedule(id, "boom", None).await.unwrap();
        let job = repo.get(id).await.unwrap().unwrap();
        assert_eq!(job.status, "dlq");
    }

    #[tokio::test]
    async fn run_after_in_the_future_is_not_claimable() {
        let pool = test_pool().await;
        let repo = JobsRepo::new(&pool);
        repo.enqueue("easy_proxies_refresh", "{}", 0, 3, Some("2999-01-01T00:00:00.000Z"), None, None)
            .await
            .unwrap();
        let claimed = repo.claim_next("w", 300).await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn enqueue_deduped_skips_while_a_pending_row_exists() {
        let pool = test_pool().await;
        let repo = JobsRepo::new(&pool);
        let first = repo
            .enqueue_deduped("hydrate_metadata", "{}", -10, 3, "opportunistic_hydrate", "123")
            .await
            .unwrap();
        assert!(first.is_some());
        let second = repo
            .enqueue_deduped("hydrate_metadata", "{}", -10, 3, "opportunistic_hydrate", "123")
            .await
            .unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn enqueue_deduped_allows_a_fresh_row_once_prior_completed() {
        let pool = test_pool().await;
        let repo = JobsRepo::new(&pool);
        let first = repo
            .enqueue_deduped("heal_url", "{}", 0, 3, "broken_image", "9")
            .await
            .unwrap()
            .unwrap();
        repo.claim_next("w", 300).await.unwrap();
        repo.complete(first).await.unwrap();
        let second = repo.enqueue_deduped("heal_url", "{}", 0, 3, "broken_image", "9").await.unwrap();
        assert!(second.is_some());
    }
}
