use curator_core::domain::ApiKey;
use curator_core::time::now_iso_millis;
use sqlx::SqlitePool;

pub struct ApiKeysRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApiKeysRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Stores only `HMAC-SHA-256(secret_key, api_key)` plus an 8-char hint;
    /// the plaintext key is returned to the caller once and never again.
    pub async fn insert(
        &self,
        id: &str,
        key_hash: &str,
        id_hint: &str,
        rpm: Option<i64>,
        burst: Option<i64>,
    ) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        sqlx::query(
            "INSERT INTO api_keys (id, key_hash, id_hint, enabled, rpm, burst, created_at) VALUES (?, ?, ?, 1, ?, ?, ?)",
        )
        .bind(id)
        .bind(key_hash)
        .bind(id_hint)
        .bind(rpm)
        .bind(burst)
        .bind(&now)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn find_by_hash(&self, key_hash: &str) -> Result<Option<ApiKey>, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys WHERE key_hash = ? AND enabled = 1")
            .bind(key_hash)
            .fetch_optional(self.pool)
            .await
    }

    pub async fn list(&self) -> Result<Vec<ApiKey>, sqlx::Error> {
        sqlx::query_as::<_, ApiKey>("SELECT * FROM api_keys ORDER BY created_at DESC")
            .fetch_all(self.pool)
            .await
    }

    pub async fn disable(&self, id: &str) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE api_keys SET enabled = 0 WHERE id = ?")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::connect;

    #[tokio::test]
    async fn insert_then_find_by_hash() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let repo = ApiKeysRepo::new(&pool);
        repo.insert("ak_abc123", "deadbeef", "deadbeef", Some(60), Some(10))
            .await
            .unwrap();
        let found = repo.find_by_hash("deadbeef").await.unwrap().unwrap();
        assert_eq!(found.id, "ak_abc123");
    }

    #[tokio::test]
    async fn disabled_key_is_not_returned() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let repo = ApiKeysRepo::new(&pool);
        repo.insert("ak_1", "hash1", "hash1", None, None).await.unwrap();
        repo.disable("ak_1").await.unwrap();
        let found = repo.find_by_hash("hash1").await.unwrap();
        assert!(found.is_none());
    }
}
