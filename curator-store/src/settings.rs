use curator_core::domain::RuntimeSetting;
use curator_core::time::now_iso_millis;
use sqlx::SqlitePool;

/// Key-value overlay on top of `AppConfig` for values an operator needs to
/// change without a restart: worker heartbeat cadence, selection strategy,
/// imgproxy defaults. Values are stored as JSON text and decoded by callers.
pub struct SettingsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> SettingsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, key: &str) -> Result<Option<RuntimeSetting>, sqlx::Error> {
        sqlx::query_as::<_, RuntimeSetting>("SELECT * FROM runtime_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(self.pool)
            .await
    }

    pub async fn set(&self, key: &str, value_json: &str) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        sqlx::query(
            "INSERT INTO runtime_settings (key, value_json, updated_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json, updated_at = excluded.updated_at",
        )
        .bind(key)
        .bind(value_json)
        .bind(&now)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    pub async fn list(&self) -> Result<Vec<RuntimeSetting>, sqlx::Error> {
        sqlx::query_as::<_, RuntimeSetting>("SELECT * FROM runtime_settings ORDER BY key")
            .fetch_all(self.pool)
            .await
    }

    pub async fn delete(&self, key: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM runtime_settings WHERE key = ?")
            .bind(key)
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
    async fn set_then_get_roundtrips() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let repo = SettingsRepo::new(&pool);
        repo.set("worker.poll_interval_ms", "250").await.unwrap();
        let setting = repo.get("worker.poll_interval_ms").await.unwrap().unwrap();
        assert_eq!(setting.value_json, "250");
    }

    #[tokio::test]
    async fn set_twice_overwrites_in_place() {
        let pool = connect("sqlite::memory:", 30_000, 1).await.unwrap();
        let repo = SettingsRepo::new(&pool);
        repo.set("random.strategy", "\"ascending\"").await.unwrap();
        repo.set("random.strategy", "\"weighted\"").await.unwrap();
        let all = repo.list().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].value_json, "\"weighted\"");
    }
}
