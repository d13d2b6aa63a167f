//! Shared application state for the public HTTP surface, the same
//! "build once at startup, clone an `Arc`-backed handle per request"
//! shape `curator_admin::server::AppState` uses.

use curator_core::config::AppConfig;
use curator_select::SelectConfig;
use curator_store::Vault;
use curator_upstream::select::SelectStrategy;
use curator_upstream::token_cache::{AccessTokenCache, TokenRefresher};
use sqlx::SqlitePool;
use std::sync::Arc;

use crate::middleware::api_key::ApiKeyGate;
use crate::stats::RandomRequestStats;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub vault: Arc<Vault>,
    pub config: Arc<AppConfig>,
    pub http_client: reqwest::Client,
    pub token_cache: Arc<AccessTokenCache>,
    pub refresher: Arc<dyn TokenRefresher>,
    pub select_strategy: SelectStrategy,
    pub select_config: Arc<SelectConfig>,
    pub dedup: Option<Arc<curator_select::dedup::DedupWindow>>,
    pub metrics: Arc<curator_observability::metrics::MetricsCollector>,
    pub stats: Arc<RandomRequestStats>,
    pub api_key_gate: Arc<ApiKeyGate>,
}
