use curator_core::domain::RequestLog;
use curator_core::time::now_iso_millis;
use sqlx::SqlitePool;

pub struct RequestLogsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> RequestLogsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, request_id: &str, path: &str, method: &str, status: i64, duration_ms: i64) -> Result<i64, sqlx::Error> {
        let now = now_iso_millis();
        let rec = sqlx::query(
            "INSERT INTO request_logs (request_id, path, method, status, duration_ms, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(request_id)
        .bind(path)
        .bind(method)
        .bind(status)
        .bind(duration_ms)
        .bind(&now)
        .execute(self.pool)
        .await?;
        Ok(rec.last_insert_rowid())
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<RequestLog>, sqlx::Error> {
        sqlx::query_as::<_, RequestLog>("SELECT * FROM request_logs ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(self.pool)
            .await
    }

    /// Delete rows older than `older_than`, an ISO-8601 timestamp. Returns
    /// the number of rows removed, used by the `request_log_cleanup` job.
    pub async fn delete_older_than(&self, older_than: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM request_logs WHERE created_at < ?")
            .bind(older_than)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
