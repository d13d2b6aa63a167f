use curator_core::domain::PixivToken;
use curator_core::time::now_iso_millis;
use sqlx::SqlitePool;

pub struct TokensRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TokensRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, label: Option<&str>, refresh_token_enc: &str, weight: f64) -> Result<i64, sqlx::Error> {
        let now = now_iso_millis();
        let rec = sqlx::query(
            "INSERT INTO pixiv_tokens (label, refresh_token_enc, enabled, weight, created_at, updated_at) VALUES (?, ?, 1, ?, ?, ?)",
        )
        .bind(label)
        .bind(refresh_token_enc)
        .bind(weight)
        .bind(&now)
        .bind(&now)
        .execute(self.pool)
        .await?;
        Ok(rec.last_insert_rowid())
    }

    pub async fn list_enabled(&self) -> Result<Vec<PixivToken>, sqlx::Error> {
        sqlx::query_as::<_, PixivToken>("SELECT * FROM pixiv_tokens ORDER BY id")
            .fetch_all(self.pool)
            .await
    }

    pub async fn get(&self, id: i64) -> Result<Option<PixivToken>, sqlx::Error> {
        sqlx::query_as::<_, PixivToken>("SELECT * FROM pixiv_tokens WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await
    }

    pub async fn record_ok(&self, id: i64) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        sqlx::query(
            "UPDATE pixiv_tokens SET error_count = 0, backoff_until = NULL, last_ok_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&now)
        .bind(&now)
        .bind(id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn record_fail(&self, id: i64, backoff_until: Option<&str>) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        sqlx::query(
            "UPDATE pixiv_tokens SET error_count = error_count + 1, backoff_until = ?, last_fail_at = ?, updated_at = ? WHERE id = ?",
        )
        .bind(backoff_until)
        .bind(&now)
        .bind(&now)
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
    async fn insert_and_list_roundtrip() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let repo = TokensRepo::new(&pool);
        let id = repo.insert(Some("primary"), "ciphertext", 1.0).await.unwrap();
        let tokens = repo.list_enabled().await.unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].id, id);
        assert_eq!(tokens[0].refresh_token_enc, "ciphertext");
    }

    #[tokio::test]
    async fn record_fail_then_ok_resets_backoff() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let repo = TokensRepo::new(&pool);
        let id = repo.insert(None, "x", 1.0).await.unwrap();
        repo.record_fail(id, Some("2026-01-01T00:00:00.000Z")).await.unwrap();
        let t = repo.get(id).await.unwrap().unwrap();
        assert_eq!(t.error_count, 1);
        assert!(t.backoff_until.is_some());
        repo.record_ok(id).await.unwrap();
        let t = repo.get(id).await.unwrap().unwrap();
        assert_eq!(t.error_count, 0);
        assert!(t.backoff_until.is_none());
    }
}
