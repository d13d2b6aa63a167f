use curator_core::domain::Import;
use sqlx::SqlitePool;

pub struct ImportsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ImportsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(
        &self,
        source: &str,
        total: i64,
        created_count: i64,
        skipped_count: i64,
        error_count: i64,
    ) -> Result<i64, sqlx::Error> {
        let rec = sqlx::query(
            "INSERT INTO imports (source, total, created_count, skipped_count, error_count) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(source)
        .bind(total)
        .bind(created_count)
        .bind(skipped_count)
        .bind(error_count)
        .execute(self.pool)
        .await?;
        Ok(rec.last_insert_rowid())
    }

    pub async fn get(&self, id: i64) -> Result<Option<Import>, sqlx::Error> {
        sqlx::query_as::<_, Import>("SELECT * FROM imports WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await
    }

    pub async fn list(&self, limit: i64) -> Result<Vec<Import>, sqlx::Error> {
        sqlx::query_as::<_, Import>("SELECT * FROM imports ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(self.pool)
            .await
    }
}
