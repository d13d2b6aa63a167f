//! `easy_proxies_refresh` job handler. Periodically pulls a fresh proxy
//! list from an Easy-Proxies-compatible provider and imports it via the
//! same conflict-policy path the admin import endpoint uses. The actual
//! HTTP call is a trait seam (`EasyProxiesClient`) per
//! `original_source/backend/app/easy_proxies/client.py` — this corpus
//! does not reproduce that provider's wire format, only the refresh
//! control flow from `easy_proxies/auto_refresh.py`.

use async_trait::async_trait;
use curator_core::domain::Job;
use curator_queue::handler::{HandleOutcome, JobHandler};
use curator_store::proxies::{ConflictPolicy, ProxiesRepo};
use curator_store::Vault;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum EasyProxiesError {
    #[error("easy-proxies request failed: {0}")]
    RequestFailed(String),
}

#[async_trait]
pub trait EasyProxiesClient: Send + Sync {
    async fn fetch_proxy_uris(&self, base_url: &str) -> Result<Vec<String>, EasyProxiesError>;
}

#[derive(serde::Deserialize)]
struct EasyProxiesPayload {
    base_url: String,
    #[serde(default)]
    conflict_policy: Option<String>,
}

pub struct EasyProxiesRefreshHandler {
    pub client: Arc<dyn EasyProxiesClient>,
    pub vault: Arc<Vault>,
}

#[async_trait]
impl JobHandler for EasyProxiesRefreshHandler {
    fn job_type(&self) -> &'static str {
        "easy_proxies_import"
    }

    async fn handle(&self, pool: &SqlitePool, job: &Job) -> anyhow::Result<HandleOutcome> {
        let payload: EasyProxiesPayload = serde_json::from_str(&job.payload_json)
            .map_err(|e| anyhow::anyhow!("payload_json is not valid: {e}"))?;

        let policy = payload
            .conflict_policy
            .as_deref()
            .and_then(ConflictPolicy::parse)
            .unwrap_or(ConflictPolicy::Skip);

        let uris = self.client.fetch_proxy_uris(&payload.base_url).await?;
        let proxies = ProxiesRepo::new(pool);
        let summary = proxies.import_uris(&uris, policy, &self.vault).await?;
        tracing::info!(
            base_url = %payload.base_url,
            created = summary.created,
            updated = summary.updated,
            skipped = summary.skipped,
            errors = summary.errors,
            "easy_proxies_import completed"
        );
        Ok(HandleOutcome::Completed)
    }
}
