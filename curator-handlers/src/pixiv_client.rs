//! The upstream app-API trait seam. Real hydrate jobs need illustration
//! metadata (geometry, taxonomy, popularity, tags) from Pixiv's app API;
//! this trait isolates that HTTP call so the handler can be tested
//! without a live upstream. Golden-byte parsing of every upstream field
//! is intentionally not reproduced here — only the shape the store
//! layer's `apply_hydrate`/`replace_image_tags` need.

use async_trait::async_trait;

#[derive(Debug, Clone)]
pub struct IllustMetadata {
    pub illust_id: i64,
    pub width: i64,
    pub height: i64,
    pub x_restrict: i64,
    pub ai_type: i64,
    pub illust_type: i64,
    pub user_id: i64,
    pub user_name: String,
    pub title: String,
    pub created_at_pixiv: String,
    pub bookmark_count: i64,
    pub view_count: i64,
    pub tags: Vec<String>,
    /// Present when the upstream host has rotated the image's CDN URL;
    /// used by `heal_url` to refresh `images.original_url`.
    pub fresh_original_url: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum PixivClientError {
    #[error("illustration {0} not found upstream")]
    NotFound(i64),
    #[error("upstream request failed: {0}")]
    RequestFailed(String),
}

#[async_trait]
pub trait PixivAppClient: Send + Sync {
    async fn fetch_illust(&self, illust_id: i64, access_token: &str) -> Result<IllustMetadata, PixivClientError>;
}
