//! `proxy_probe` job handler: issues a lightweight HTTP request through
//! each proxy endpoint and records success/failure, feeding
//! `proxy_endpoints.success_count/failure_count/last_latency_ms` that
//! the admin health summary and failover logic both read.

use async_trait::async_trait;
use curator_core::domain::Job;
use curator_queue::handler::{HandleOutcome, JobHandler};
use curator_store::proxies::ProxiesRepo;
use curator_store::proxy_uri::format_proxy_uri;
use curator_store::Vault;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;

pub struct ProxyProbeHandler {
    pub vault: Arc<Vault>,
    pub probe_url: String,
    pub timeout_s: u64,
}

#[async_trait]
impl JobHandler for ProxyProbeHandler {
    fn job_type(&self) -> &'static str {
        "proxy_probe"
    }

    async fn handle(&self, pool: &SqlitePool, job: &Job) -> anyhow::Result<HandleOutcome> {
        let id = job
            .ref_id
            .as_deref()
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or_else(|| anyhow::anyhow!("proxy_probe requires ref_id = proxy endpoint id"))?;

        let proxies = ProxiesRepo::new(pool);
        let Some(endpoint) = proxies.get(id).await? else {
            return Ok(HandleOutcome::Completed);
        };

        let password = match &endpoint.password_enc {
            Some(enc) => Some(self.vault.decrypt(enc)?),
            None => None,
        };
        let uri = format_proxy_uri(&endpoint.scheme, &endpoint.host, endpoint.port, endpoint.username.as_deref(), password.as_deref());

        let client = curator_upstream::client::build_client(Some(&uri), self.timeout_s)?;
        let started = Instant::now();
        match client.get(&self.probe_url).send().await {
            Ok(response) if response.status().is_success() => {
                let latency_ms = started.elapsed().as_millis() as i64;
                proxies.record_endpoint_ok(id, latency_ms).await?;
            }
            Ok(response) => {
                proxies.record_endpoint_fail(id, &format!("probe returned status {}", response.status())).await?;
            }
            Err(err) => {
                proxies.record_endpoint_fail(id, &err.to_string()).await?;
            }
        }
        Ok(HandleOutcome::Completed)
    }
}
