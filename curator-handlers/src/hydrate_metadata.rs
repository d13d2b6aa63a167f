//! `hydrate_metadata` job handler: calls the upstream app API for an
//! illustration's metadata and writes geometry/taxonomy/popularity/tags.
//! Grounded on `original_source/backend/app/jobs/handlers/hydrate_metadata.py`
//! (not itself present in the retrieval pack; its shape is inferred from
//! `heal_url.py`, which wraps it) and on spec §3's Image lifecycle.

use crate::credentials::{acquire_credential, CredentialError};
use crate::pixiv_client::PixivAppClient;
use async_trait::async_trait;
use curator_core::domain::Job;
use curator_queue::handler::{HandleOutcome, JobHandler};
use curator_store::images::ImagesRepo;
use curator_store::tags::TagsRepo;
use curator_store::Vault;
use curator_upstream::select::SelectStrategy;
use curator_upstream::token_cache::{AccessTokenCache, TokenRefresher};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(serde::Deserialize)]
struct HydratePayload {
    illust_id: i64,
}

pub struct HydrateMetadataHandler {
    pub vault: Arc<Vault>,
    pub token_cache: Arc<AccessTokenCache>,
    pub refresher: Arc<dyn TokenRefresher>,
    pub pixiv_client: Arc<dyn PixivAppClient>,
    pub strategy: SelectStrategy,
}

impl HydrateMetadataHandler {
    /// Fetches and applies metadata for every known page of `illust_id`.
    /// Returns the upstream's refreshed CDN URL, if it reported one —
    /// used by `heal_url` to rewrite `images.original_url`.
    pub(crate) async fn hydrate_illust(&self, pool: &SqlitePool, illust_id: i64) -> Result<Option<String>, anyhow::Error> {
        let credential = acquire_credential(pool, &self.vault, &self.token_cache, self.refresher.as_ref(), self.strategy).await?;
        let metadata = self.pixiv_client.fetch_illust(illust_id, &credential.access_token).await?;

        let images = ImagesRepo::new(pool);
        let tags = TagsRepo::new(pool);

        // Every page of the illustration shares the same illust-level
        // metadata; pages are written individually since `page_index` is
        // part of the unique identity.
        let mut page_index = 0;
        while let Some(image) = images.get_by_illust_page(illust_id, page_index).await? {
            images
                .apply_hydrate(
                    image.id,
                    metadata.width,
                    metadata.height,
                    metadata.x_restrict,
                    metadata.ai_type,
                    metadata.illust_type,
                    metadata.user_id,
                    &metadata.user_name,
                    &metadata.title,
                    &metadata.created_at_pixiv,
                    metadata.bookmark_count,
                    metadata.view_count,
                )
                .await?;
            tags.replace_image_tags(image.id, &metadata.tags).await?;
            images.mark_ok(image.id).await?;
            page_index += 1;
        }
        Ok(metadata.fresh_original_url)
    }
}

#[async_trait]
impl JobHandler for HydrateMetadataHandler {
    fn job_type(&self) -> &'static str {
        "hydrate_metadata"
    }

    async fn handle(&self, pool: &SqlitePool, job: &Job) -> anyhow::Result<HandleOutcome> {
        let payload: HydratePayload = serde_json::from_str(&job.payload_json)
            .map_err(|e| anyhow::anyhow!("payload_json is not valid: {e}"))?;

        match self.hydrate_illust(pool, payload.illust_id).await {
            Ok(_) => Ok(HandleOutcome::Completed),
            Err(err) if err.downcast_ref::<CredentialError>().is_some() => {
                tracing::warn!(illust_id = payload.illust_id, error = %err, "hydrate_metadata deferred: no credential");
                Ok(HandleOutcome::Failed)
            }
            Err(err) => {
                tracing::warn!(illust_id = payload.illust_id, error = %err, "hydrate_metadata failed");
                Ok(HandleOutcome::Failed)
            }
        }
    }
}
