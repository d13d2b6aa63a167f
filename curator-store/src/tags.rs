use curator_core::domain::Tag;
use curator_core::time::now_iso_millis;
use sqlx::SqlitePool;

pub struct TagsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> TagsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn upsert(&self, name: &str) -> Result<i64, sqlx::Error> {
        let now = now_iso_millis();
        sqlx::query("INSERT INTO tags (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
            .bind(name)
            .bind(&now)
            .execute(self.pool)
            .await?;
        sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE name = ?")
            .bind(name)
            .fetch_one(self.pool)
            .await
    }

    pub async fn list(&self) -> Result<Vec<Tag>, sqlx::Error> {
        sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY id")
            .fetch_all(self.pool)
            .await
    }

    /// Cursor-paginated listing for the public `/tags` endpoint, the same
    /// `id DESC` + `limit+1` idiom as `ImagesRepo::list`.
    pub async fn list_page(&self, cursor: Option<i64>, limit: i64) -> Result<(Vec<Tag>, Option<i64>), sqlx::Error> {
        let fetch_limit = limit + 1;
        let mut rows = match cursor {
            Some(c) => {
                sqlx::query_as::<_, Tag>("SELECT * FROM tags WHERE id < ? ORDER BY id DESC LIMIT ?")
                    .bind(c)
                    .bind(fetch_limit)
                    .fetch_all(self.pool)
                    .await?
            }
            None => {
                sqlx::query_as::<_, Tag>("SELECT * FROM tags ORDER BY id DESC LIMIT ?")
                    .bind(fetch_limit)
                    .fetch_all(self.pool)
                    .await?
            }
        };
        let next_cursor = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            rows.last().map(|r| r.id)
        } else {
            None
        };
        Ok((rows, next_cursor))
    }

    pub async fn for_image(&self, image_id: i64) -> Result<Vec<Tag>, sqlx::Error> {
        sqlx::query_as::<_, Tag>(
            "SELECT t.* FROM tags t JOIN image_tags it ON it.tag_id = t.id WHERE it.image_id = ? ORDER BY t.name",
        )
        .bind(image_id)
        .fetch_all(self.pool)
        .await
    }

    /// Atomically rewrite the tag set for an image: delete all existing
    /// links, upsert each tag, insert fresh links. Callers run this inside
    /// a single hydrate-handler transaction.
    pub async fn replace_image_tags(&self, image_id: i64, names: &[String]) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM image_tags WHERE image_id = ?")
            .bind(image_id)
            .execute(&mut *tx)
            .await?;
        for name in names {
            let now = now_iso_millis();
            sqlx::query("INSERT INTO tags (name, created_at) VALUES (?, ?) ON CONFLICT(name) DO NOTHING")
                .bind(name)
                .bind(&now)
                .execute(&mut *tx)
                .await?;
            let tag_id: i64 = sqlx::query_scalar("SELECT id FROM tags WHERE name = ?")
                .bind(name)
                .fetch_one(&mut *tx)
                .await?;
            sqlx::query("INSERT INTO image_tags (image_id, tag_id) VALUES (?, ?) ON CONFLICT DO NOTHING")
                .bind(image_id)
                .bind(tag_id)
                .execute(&mut *tx)
                .await?;
        }
        tx.commit().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::images::ImagesRepo;
    use crate::pool::connect;

    async fn test_pool() -> SqlitePool {
        connect("sqlite::memory:", 30_000, 1).await.unwrap()
    }

    #[tokio::test]
    async fn upsert_is_idempotent() {
        let pool = test_pool().await;
        let repo = TagsRepo::new(&pool);
        let a = repo.upsert("landscape").await.unwrap();
        let b = repo.upsert("landscape").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn replace_image_tags_is_atomic_rewrite() {
        let pool = test_pool().await;
        let images = ImagesRepo::new(&pool);
        let image_id = images.insert(1, 0, "jpg", "https://x", 0.1).await.unwrap();
        let tags = TagsRepo::new(&pool);
        tags.replace_image_tags(image_id, &["a".into(), "b".into()])
            .await
            .unwrap();
        let linked = tags.for_image(image_id).await.unwrap();
        assert_eq!(linked.len(), 2);
        tags.replace_image_tags(image_id, &["c".into()]).await.unwrap();
        let linked = tags.for_image(image_id).await.unwrap();
        assert_eq!(linked.len(), 1);
        assert_eq!(linked[0].name, "c");
    }
}
