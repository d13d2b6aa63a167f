//! Filter composition. A direct port of `random_pick.py`'s where-clause
//! builders (`_r18_where_clause`, `_orientation_where_clause`,
//! `_included_tags_where_clause`, `_excluded_tags_where_clause`), built
//! with `sqlx::QueryBuilder` instead of string concatenation.

use sqlx::sqlite::Sqlite;
use sqlx::QueryBuilder;

#[derive(Debug, Clone, Default)]
pub struct RandomFilter {
    pub r18: Option<u8>,
    pub r18_strict: bool,
    pub orientation: Option<i64>,
    pub ai_type: Option<i64>,
    pub illust_type: Option<i64>,
    pub min_width: Option<i64>,
    pub min_height: Option<i64>,
    pub min_pixels: Option<i64>,
    pub min_bookmarks: Option<i64>,
    pub min_views: Option<i64>,
    pub min_comments: Option<i64>,
    pub included_tags: Vec<String>,
    pub excluded_tags: Vec<String>,
    pub user_id: Option<i64>,
    pub illust_id: Option<i64>,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
    pub fail_cooldown_ms: Option<i64>,
}

impl RandomFilter {
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.included_tags.len() > 8 {
            return Err(FilterError::TooManyIncludedTags(self.included_tags.len()));
        }
        if self.excluded_tags.len() > 32 {
            return Err(FilterError::TooManyExcludedTags(self.excluded_tags.len()));
        }
        Ok(())
    }

    /// Push every predicate after the caller's own `WHERE status = 1`
    /// clause. `now` is the pre-computed ISO-8601 timestamp used for the
    /// fail-cooldown predicate (kept out of SQL so it compares against
    /// `last_fail_at`'s own string format, the same discipline as the
    /// job queue's lock-expiry comparison).
    pub fn push_predicates<'a>(&'a self, qb: &mut QueryBuilder<'a, Sqlite>, now: &'a str) {
        qb.push(" AND status = 1");

        match self.r18 {
            Some(0) => {
                if self.r18_strict {
                    qb.push(" AND x_restrict = 0");
                } else {
                    qb.push(" AND (x_restrict = 0 OR x_restrict IS NULL)");
                }
            }
            Some(1) => {
                qb.push(" AND x_restrict = 1");
            }
            _ => {}
        }

        if let Some(orientation) = self.orientation {
            qb.push(" AND orientation = ").push_bind(orientation);
        }
        if let Some(ai_type) = self.ai_type {
            qb.push(" AND ai_type = ").push_bind(ai_type);
        }
        if let Some(illust_type) = self.illust_type {
            qb.push(" AND illust_type = ").push_bind(illust_type);
        }
        if let Some(w) = self.min_width {
            qb.push(" AND width >= ").push_bind(w);
        }
        if let Some(h) = self.min_height {
            qb.push(" AND height >= ").push_bind(h);
        }
        if let Some(px) = self.min_pixels {
            qb.push(" AND width * height >= ").push_bind(px);
        }
        if let Some(b) = self.min_bookmarks {
            qb.push(" AND bookmark_count >= ").push_bind(b);
        }
        if let Some(v) = self.min_views {
            qb.push(" AND view_count >= ").push_bind(v);
        }
        if let Some(c) = self.min_comments {
            qb.push(" AND comment_count >= ").push_bind(c);
        }
        if let Some(uid) = self.user_id {
            qb.push(" AND user_id = ").push_bind(uid);
        }
        if let Some(iid) = self.illust_id {
            qb.push(" AND illust_id = ").push_bind(iid);
        }
        if let Some(from) = &self.created_from {
            qb.push(" AND created_at_pixiv >= ").push_bind(from);
        }
        if let Some(to) = &self.created_to {
            qb.push(" AND created_at_pixiv <= ").push_bind(to);
        }

        if let Some(cooldown_ms) = self.fail_cooldown_ms {
            let cutoff = curator_core::time::to_iso_millis(
                chrono::Utc::now() - chrono::Duration::milliseconds(cooldown_ms),
            );
            qb.push(" AND (last_fail_at IS NULL OR last_fail_at < ")
                .push_bind(cutoff)
                .push(")");
        } else {
            let _ = now;
        }

        for tag in &self.included_tags {
            qb.push(" AND id IN (SELECT image_id FROM image_tags it JOIN tags t ON t.id = it.tag_id WHERE t.name = ")
                .push_bind(tag.clone())
                .push(")");
        }
        if !self.excluded_tags.is_empty() {
            qb.push(" AND id NOT IN (SELECT image_id FROM image_tags it JOIN tags t ON t.id = it.tag_id WHERE t.name IN (");
            let mut sep = qb.separated(", ");
            for tag in &self.excluded_tags {
                sep.push_bind(tag.clone());
            }
            qb.push("))");
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    #[error("at most 8 included tags are allowed, got {0}")]
    TooManyIncludedTags(usize),
    #[error("at most 32 excluded tags are allowed, got {0}")]
    TooManyExcludedTags(usize),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_too_many_included_tags() {
        let filter = RandomFilter {
            included_tags: (0..9).map(|i| i.to_string()).collect(),
            ..Default::default()
        };
        assert!(matches!(filter.validate(), Err(FilterError::TooManyIncludedTags(9))));
    }

    #[test]
    fn validate_rejects_too_many_excluded_tags() {
        let filter = RandomFilter {
            excluded_tags: (0..33).map(|i| i.to_string()).collect(),
            ..Default::default()
        };
        assert!(matches!(filter.validate(), Err(FilterError::TooManyExcludedTags(33))));
    }

    #[test]
    fn validate_accepts_boundary_counts() {
        let filter = RandomFilter {
            included_tags: (0..8).map(|i| i.to_string()).collect(),
            excluded_tags: (0..32).map(|i| i.to_string()).collect(),
            ..Default::default()
        };
        assert!(filter.validate().is_ok());
    }

    #[test]
    fn push_predicates_builds_sql_with_status_and_r18() {
        let filter = RandomFilter { r18: Some(0), r18_strict: true, ..Default::default() };
        let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM images WHERE 1=1");
        filter.push_predicates(&mut qb, "2026-01-01T00:00:00.000Z");
        let sql = qb.sql();
        assert!(sql.contains("status = 1"));
        assert!(sql.contains("x_restrict = 0"));
    }
}
