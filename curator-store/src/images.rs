use crate::pool::with_busy_retry;
use curator_core::domain::Image;
use curator_core::time::{now_iso_millis, truncate};
use sqlx::SqlitePool;

pub struct ImagesRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ImagesRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn insert(
        &self,
        illust_id: i64,
        page_index: i32,
        extension: &str,
        original_url: &str,
        random_key: f64,
    ) -> Result<i64, sqlx::Error> {
        with_busy_retry(|| async {
            let now = now_iso_millis();
            let rec = sqlx::query(
                "INSERT INTO images (illust_id, page_index, extension, original_url, proxy_path, random_key, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, '', ?, 1, ?, ?)
                 ON CONFLICT(illust_id, page_index) DO NOTHING",
            )
            .bind(illust_id)
            .bind(page_index)
            .bind(extension)
            .bind(original_url)
            .bind(random_key)
            .bind(&now)
            .bind(&now)
            .execute(self.pool)
            .await?;
            let id = if rec.rows_affected() == 1 {
                let id = rec.last_insert_rowid();
                let proxy_path = format!("/i/{id}.{extension}");
                sqlx::query("UPDATE images SET proxy_path = ? WHERE id = ?")
                    .bind(&proxy_path)
                    .bind(id)
                    .execute(self.pool)
                    .await?;
                id
            } else {
                sqlx::query_scalar::<_, i64>(
                    "SELECT id FROM images WHERE illust_id = ? AND page_index = ?",
                )
                .bind(illust_id)
                .bind(page_index)
                .fetch_one(self.pool)
                .await?
            };
            Ok(id)
        })
        .await
    }

    /// Like `insert`, but distinguishes a fresh row from a pre-existing
    /// one instead of masking the conflict: `Ok(None)` on a duplicate
    /// `(illust_id, page_index)`, `Ok(Some(id))` on a fresh insert. The
    /// import handler uses this to report accurate created/skipped counts.
    pub async fn insert_new(
        &self,
        illust_id: i64,
        page_index: i32,
        extension: &str,
        original_url: &str,
        random_key: f64,
    ) -> Result<Option<i64>, sqlx::Error> {
        with_busy_retry(|| async {
            let now = now_iso_millis();
            let rec = sqlx::query(
                "INSERT INTO images (illust_id, page_index, extension, original_url, proxy_path, random_key, status, created_at, updated_at)
                 VALUES (?, ?, ?, ?, '', ?, 1, ?, ?)
                 ON CONFLICT(illust_id, page_index) DO NOTHING",
            )
            .bind(illust_id)
            .bind(page_index)
            .bind(extension)
            .bind(original_url)
            .bind(random_key)
            .bind(&now)
            .bind(&now)
            .execute(self.pool)
            .await?;
            if rec.rows_affected() != 1 {
                return Ok(None);
            }
            let id = rec.last_insert_rowid();
            let proxy_path = format!("/i/{id}.{extension}");
            sqlx::query("UPDATE images SET proxy_path = ? WHERE id = ?")
                .bind(&proxy_path)
                .bind(id)
                .execute(self.pool)
                .await?;
            Ok(Some(id))
        })
        .await
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Option<Image>, sqlx::Error> {
        sqlx::query_as::<_, Image>("SELECT * FROM images WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await
    }

    pub async fn get_by_illust_page(&self, illust_id: i64, page_index: i32) -> Result<Option<Image>, sqlx::Error> {
        sqlx::query_as::<_, Image>("SELECT * FROM images WHERE illust_id = ? AND page_index = ?")
            .bind(illust_id)
            .bind(page_index)
            .fetch_optional(self.pool)
            .await
    }

    /// Cursor-paginated listing: `id DESC`, `limit+1` over-fetch, matching
    /// `original_source/backend/app/db/images_list.py::list_images`.
    pub async fn list(&self, cursor: Option<i64>, limit: i64) -> Result<(Vec<Image>, Option<i64>), sqlx::Error> {
        let fetch_limit = limit + 1;
        let rows = match cursor {
            Some(c) => {
                sqlx::query_as::<_, Image>(
                    "SELECT * FROM images WHERE id < ? ORDER BY id DESC LIMIT ?",
                )
                .bind(c)
                .bind(fetch_limit)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, Image>("SELECT * FROM images ORDER BY id DESC LIMIT ?")
                    .bind(fetch_limit)
                    .fetch_all(self.pool)
                    .await?
            }
        };
        let mut rows = rows;
        let next_cursor = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            rows.last().map(|r| r.id)
        } else {
            None
        };
        Ok((rows, next_cursor))
    }

    /// Serve-path failure stamp: `status=1` retained, `fail_count++`.
    pub async fn mark_fail(&self, id: i64, error_code: &str, error_msg: &str) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        let redacted = truncate(error_msg, 500);
        with_busy_retry(|| async {
            sqlx::query(
                "UPDATE images SET fail_count = fail_count + 1, last_fail_at = ?, last_error_code = ?, last_error_msg = ?, updated_at = ? WHERE id = ?",
            )
            .bind(&now)
            .bind(error_code)
            .bind(&redacted)
            .bind(&now)
            .bind(id)
            .execute(self.pool)
            .await
        })
        .await?;
        Ok(())
    }

    /// Transition to `status=3` on UPSTREAM_404/403 detection.
    pub async fn mark_broken(&self, illust_id: i64, error_code: &str, error_msg: &str) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        let redacted = truncate(error_msg, 500);
        sqlx::query(
            "UPDATE images SET status = 3, fail_count = fail_count + 1, last_fail_at = ?, last_error_code = ?, last_error_msg = ?, updated_at = ? WHERE illust_id = ?",
        )
        .bind(&now)
        .bind(error_code)
        .bind(&redacted)
        .bind(&now)
        .bind(illust_id)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// `heal_url` unconditionally force-transitions `status=3 -> 1` once the
    /// metadata rehydrate succeeds, regardless of whether the refreshed
    /// original_url is identical to the prior one (Open Question #1 —
    /// resolved against `original_source/backend/app/jobs/handlers/heal_url.py`,
    /// which conditions only on `status=3`).
    pub async fn heal(&self, illust_id: i64, fresh_original_url: &str) -> Result<u64, sqlx::Error> {
        let now = now_iso_millis();
        let result = sqlx::query(
            "UPDATE images SET status = 1, original_url = ?, last_ok_at = ?, last_error_code = NULL, last_error_msg = NULL, updated_at = ? WHERE illust_id = ? AND status = 3",
        )
        .bind(fresh_original_url)
        .bind(&now)
        .bind(&now)
        .bind(illust_id)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    pub async fn mark_ok(&self, id: i64) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        sqlx::query("UPDATE images SET last_ok_at = ?, updated_at = ? WHERE id = ?")
            .bind(&now)
            .bind(&now)
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(())
    }

    pub async fn apply_hydrate(
        &self,
        id: i64,
        width: i64,
        height: i64,
        x_restrict: i64,
        ai_type: i64,
        illust_type: i64,
        user_id: i64,
        user_name: &str,
        title: &str,
        created_at_pixiv: &str,
        bookmark_count: i64,
        view_count: i64,
    ) -> Result<(), sqlx::Error> {
        let now = now_iso_millis();
        let orientation = if width == height {
            3
        } else if width > height {
            2
        } else {
            1
        };
        let aspect_ratio = width as f64 / height.max(1) as f64;
        sqlx::query(
            "UPDATE images SET width=?, height=?, aspect_ratio=?, orientation=?, x_restrict=?, ai_type=?, illust_type=?, user_id=?, user_name=?, title=?, created_at_pixiv=?, bookmark_count=?, view_count=?, updated_at=? WHERE id = ?",
        )
        .bind(width)
        .bind(height)
        .bind(aspect_ratio)
        .bind(orientation)
        .bind(x_restrict)
        .bind(ai_type)
        .bind(illust_type)
        .bind(user_id)
        .bind(user_name)
        .bind(title)
        .bind(created_at_pixiv)
        .bind(bookmark_count)
        .bind(view_count)
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

    async fn test_pool() -> SqlitePool {
        connect("sqlite::memory:", 30_000, 1).await.unwrap()
    }

    #[tokio::test]
    async fn insert_new_reports_duplicate_as_none() {
        let pool = test_pool().await;
        let repo = ImagesRepo::new(&pool);
        let first = repo.insert_new(1, 0, "jpg", "https://x", 0.1).await.unwrap();
        assert!(first.is_some());
        let second = repo.insert_new(1, 0, "jpg", "https://x", 0.1).await.unwrap();
        assert!(second.is_none());
    }

    #[tokio::test]
    async fn insert_and_get_roundtrip() {
        let pool = test_pool().await;
        let repo = ImagesRepo::new(&pool);
        let id = repo
            .insert(123, 0, "jpg", "https://example.test/origin.jpg", 0.5)
            .await
            .unwrap();
        let img = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(img.illust_id, 123);
        assert!(img.random_key >= 0.0 && img.random_key < 1.0);
        assert_eq!(img.status, 1);
    }

    #[tokio::test]
    async fn duplicate_illust_page_is_noop() {
        let pool = test_pool().await;
        let repo = ImagesRepo::new(&pool);
        repo.insert(123, 0, "jpg", "https://example.test/a.jpg", 0.1).await.unwrap();
        repo.insert(123, 0, "jpg", "https://example.test/b.jpg", 0.2).await.unwrap();
        let img = repo.get_by_illust_page(123, 0).await.unwrap().unwrap();
        assert_eq!(img.original_url, "https://example.test/a.jpg");
    }

    #[tokio::test]
    async fn heal_only_transitions_from_broken() {
        let pool = test_pool().await;
        let repo = ImagesRepo::new(&pool);
        let id = repo.insert(1, 0, "jpg", "https://old", 0.1).await.unwrap();
        // status is 1 (active), heal should be a no-op.
        let affected = repo.heal(1, "https://new").await.unwrap();
        assert_eq!(affected, 0);
        repo.mark_broken(1, "UPSTREAM_404", "not found").await.unwrap();
        let affected = repo.heal(1, "https://new").await.unwrap();
        assert_eq!(affected, 1);
        let img = repo.get_by_id(id).await.unwrap().unwrap();
        assert_eq!(img.status, 1);
        assert_eq!(img.original_url, "https://new");
    }

    #[tokio::test]
    async fn cursor_pagination_respects_limit_and_order() {
        let pool = test_pool().await;
        let repo = ImagesRepo::new(&pool);
        for i in 0..5 {
            repo.insert(i, 0, "jpg", "https://x", 0.1).await.unwrap();
        }
        let (page1, cursor1) = repo.list(None, 2).await.unwrap();
        assert_eq!(page1.len(), 2);
        assert!(cursor1.is_some());
        let (page2, cursor2) = repo.list(cursor1, 2).await.unwrap();
        assert_eq!(page2.len(), 2);
        assert!(page2[0].id < page1[1].id);
        let (page3, cursor3) = repo.list(cursor2, 2).await.unwrap();
        assert_eq!(page3.len(), 1);
        assert!(cursor3.is_none());
    }
}
