use curator_core::domain::AdminAudit;
use curator_core::time::now_iso_millis;
use sqlx::SqlitePool;

pub struct AuditRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuditRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn record(&self, actor: &str, action: &str, details_json: &str) -> Result<i64, sqlx::Error> {
        let now = now_iso_millis();
        let rec = sqlx::query(
            "INSERT INTO admin_audit (actor, action, details_json, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(actor)
        .bind(action)
        .bind(details_json)
        .bind(&now)
        .execute(self.pool)
        .await?;
        Ok(rec.last_insert_rowid())
    }

    pub async fn recent(&self, limit: i64) -> Result<Vec<AdminAudit>, sqlx::Error> {
        sqlx::query_as::<_, AdminAudit>("SELECT * FROM admin_audit ORDER BY id DESC LIMIT ?")
            .bind(limit)
            .fetch_all(self.pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connect;

    #[tokio::test]
    async fn record_and_list_most_recent_first() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let repo = AuditRepo::new(&pool);
        repo.record("admin", "proxy.import", "{\"created\":2}").await.unwrap();
        repo.record("admin", "token.create", "{}").await.unwrap();
        let entries = repo.recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "token.create");
    }
}
