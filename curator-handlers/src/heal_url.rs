//! `heal_url` job handler. Runs a hydrate for the illustration, then
//! force-transitions `status=3 -> 1` on success — a literal port of
//! `original_source/backend/app/jobs/handlers/heal_url.py`, whose
//! SQL-level condition (`WHERE illust_id = ? AND status = 3`) is already
//! implemented in `curator_store::images::ImagesRepo::heal`.

use crate::hydrate_metadata::HydrateMetadataHandler;
use async_trait::async_trait;
use curator_core::domain::Job;
use curator_queue::handler::{HandleOutcome, JobHandler};
use curator_store::images::ImagesRepo;
use sqlx::SqlitePool;

#[derive(serde::Deserialize)]
struct HealUrlPayload {
    illust_id: i64,
}

pub struct HealUrlHandler {
    pub hydrate: HydrateMetadataHandler,
}

#[async_trait]
impl JobHandler for HealUrlHandler {
    fn job_type(&self) -> &'static str {
        "heal_url"
    }

    async fn handle(&self, pool: &SqlitePool, job: &Job) -> anyhow::Result<HandleOutcome> {
        let payload: HealUrlPayload = serde_json::from_str(&job.payload_json)
            .map_err(|e| anyhow::anyhow!("payload_json is not valid: {e}"))?;
        if payload.illust_id <= 0 {
            anyhow::bail!("payload.illust_id is required");
        }

        let fresh_original_url = match self.hydrate.hydrate_illust(pool, payload.illust_id).await {
            Ok(url) => url,
            Err(err) => {
                tracing::warn!(illust_id = payload.illust_id, error = %err, "heal_url deferred: hydrate failed");
                return Ok(HandleOutcome::Failed);
            }
        };

        let images = ImagesRepo::new(pool);
        let url_to_store = match fresh_original_url {
            Some(fresh_url) => fresh_url,
            None => match images.get_by_illust_page(payload.illust_id, 0).await? {
                Some(image) => image.original_url,
                None => return Ok(HandleOutcome::Completed),
            },
        };
        images.heal(payload.illust_id, &url_to_store).await?;
        Ok(HandleOutcome::Completed)
    }
}
