use sqlx::SqlitePool;

/// Distinct `(user_id, user_name)` pair backing the public `/authors`
/// listing. Not a table of its own — derived from `images`, the same way
/// `original_source/backend/app/db/authors_list.py` rolls it up.
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct AuthorSummary {
    pub user_id: i64,
    pub user_name: String,
    pub image_count: i64,
}

pub struct AuthorsRepo<'a> {
    pool: &'a SqlitePool,
}

impl<'a> AuthorsRepo<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Cursor-paginated distinct-author listing, `user_id DESC` with the
    /// same `limit+1` idiom as `ImagesRepo::list`. Hydrate fills `user_id`
    /// in lazily, so unhydrated images (`user_id IS NULL`) are excluded.
    pub async fn list(&self, cursor: Option<i64>, limit: i64) -> Result<(Vec<AuthorSummary>, Option<i64>), sqlx::Error> {
        let fetch_limit = limit + 1;
        let mut rows = match cursor {
            Some(c) => {
                sqlx::query_as::<_, AuthorSummary>(
                    "SELECT user_id, MAX(user_name) AS user_name, COUNT(*) AS image_count
                     FROM images
                     WHERE user_id IS NOT NULL AND user_id < ?
                     GROUP BY user_id
                     ORDER BY user_id DESC
                     LIMIT ?",
                )
                .bind(c)
                .bind(fetch_limit)
                .fetch_all(self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, AuthorSummary>(
                    "SELECT user_id, MAX(user_name) AS user_name, COUNT(*) AS image_count
                     FROM images
                     WHERE user_id IS NOT NULL
                     GROUP BY user_id
                     ORDER BY user_id DESC
                     LIMIT ?",
                )
                .bind(fetch_limit)
                .fetch_all(self.pool)
                .await?
            }
        };
        let next_cursor = if rows.len() as i64 > limit {
            rows.truncate(limit as usize);
            rows.last().map(|r| r.user_id)
        } else {
            None
        };
        Ok((rows, next_cursor))
    }
}
