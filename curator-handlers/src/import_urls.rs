//! `import_urls` job handler: seeds `images` rows from a flat list of
//! pixiv original-image URLs. Grounded on
//! `original_source/backend/app/core/pixiv_urls.py`'s URL shape and
//! `original_source/backend/app/db/models/imports.py`'s summary counters
//! (created/skipped/error), which this handler persists via
//! `curator_store::imports::ImportsRepo` once the batch finishes.

use async_trait::async_trait;
use curator_core::domain::Job;
use curator_queue::handler::{HandleOutcome, JobHandler};
use curator_store::images::ImagesRepo;
use curator_store::imports::ImportsRepo;
use curator_upstream::pixiv_urls::parse_pixiv_original_url;
use rand::Rng;
use serde::Deserialize;
use sqlx::SqlitePool;

#[derive(Debug, Deserialize)]
struct ImportPayload {
    urls: Vec<String>,
    #[serde(default = "default_source")]
    source: String,
}

fn default_source() -> String {
    "url_list".to_string()
}

pub struct ImportUrlsHandler;

#[async_trait]
impl JobHandler for ImportUrlsHandler {
    fn job_type(&self) -> &'static str {
        "import_urls"
    }

    async fn handle(&self, pool: &SqlitePool, job: &Job) -> anyhow::Result<HandleOutcome> {
        let payload: ImportPayload = serde_json::from_str(&job.payload_json)?;
        let images = ImagesRepo::new(pool);
        let mut rng = rand::thread_rng();

        let mut created = 0i64;
        let mut skipped = 0i64;
        let mut errors = 0i64;

        for url in &payload.urls {
            let parsed = match parse_pixiv_original_url(url) {
                Ok(p) => p,
                Err(_) => {
                    errors += 1;
                    continue;
                }
            };
            let random_key: f64 = rng.gen_range(0.0..1.0);
            match images
                .insert_new(parsed.illust_id, parsed.page_index, &parsed.ext, url, random_key)
                .await
            {
                Ok(Some(_)) => created += 1,
                Ok(None) => skipped += 1,
                Err(_) => errors += 1,
            }
        }

        ImportsRepo::new(pool)
            .record(&payload.source, payload.urls.len() as i64, created, skipped, errors)
            .await?;

        tracing::info!(created, skipped, errors, "import_urls completed");
        Ok(HandleOutcome::Completed)
    }
}
