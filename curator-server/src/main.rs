//! Curator — process bootstrap: loads config, opens the shared SQLite
//! pool, wires the credential cache and job registry, and runs the
//! public HTTP surface, the admin API, and the worker loop side by side
//! on one tokio runtime (no monoio, no per-core sharding — the whole
//! service is I/O-bound against one SQLite file and a handful of
//! outbound HTTP calls).

use clap::Parser;
use curator_core::config::AppConfig;
use curator_handlers::credentials::OauthRefresher;
use curator_handlers::easy_proxies::EasyProxiesRefreshHandler;
use curator_handlers::heal_url::HealUrlHandler;
use curator_handlers::hydrate_metadata::HydrateMetadataHandler;
use curator_handlers::import_urls::ImportUrlsHandler;
use curator_handlers::proxy_probe::ProxyProbeHandler;
use curator_handlers::request_log_cleanup::RequestLogCleanupHandler;
use curator_queue::dispatch::Dispatcher;
use curator_queue::registry::HandlerRegistry;
use curator_select::dedup::DedupWindow;
use curator_select::engine::{SelectConfig, Strategy};
use curator_server::build_public_router;
use curator_server::easy_proxies_client::HttpEasyProxiesClient;
use curator_server::middleware::api_key;
use curator_server::pixiv_client::HttpPixivAppClient;
use curator_server::state::AppState;
use curator_store::settings::SettingsRepo;
use curator_store::Vault;
use curator_upstream::select::SelectStrategy;
use curator_upstream::token_cache::AccessTokenCache;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "curator-server", version, about = "Curator — curated remote-image random-pick service")]
struct Cli {
    /// Path to a YAML config file; falls back to `curator.yaml` and env vars.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(cli.log_level.clone())),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref().and_then(|p| p.to_str());
    let config = Arc::new(AppConfig::load(config_path)?);
    info!(env = ?config.app_env, "curator config loaded");

    let pool = curator_store::connect(
        &config.database.url,
        config.database.sqlite_busy_timeout_ms,
        config.database.pool_size,
    )
    .await?;

    let vault = Arc::new(Vault::load(
        config.security.field_encryption_key.as_deref(),
        config.security.field_encryption_key_file.as_deref(),
        config.is_dev(),
        std::path::Path::new("./data/field_encryption.key"),
    )?);

    let http_client = curator_upstream::client::build_client(None, (config.server.request_timeout_ms / 1000).max(1))?;

    let token_cache = Arc::new(AccessTokenCache::new(60.0));
    let refresher = Arc::new(OauthRefresher::new(
        pool.clone(),
        vault.clone(),
        config.pixiv_oauth.client_id.clone().unwrap_or_default(),
        config.pixiv_oauth.client_secret.clone().unwrap_or_default(),
        config.pixiv_oauth.hash_secret.clone(),
    ));
    // No config axis selects between round-robin/least-error/weighted
    // credential picking; default to round-robin until one is exposed.
    let select_strategy = SelectStrategy::RoundRobin;

    let select_config = Arc::new(SelectConfig {
        strategy: match config.random.strategy.as_str() {
            "quality" => Strategy::Quality,
            _ => Strategy::Default,
        },
        quality_samples: config.random.quality_samples.max(1) as usize,
        ..SelectConfig::default()
    });
    let dedup = Some(Arc::new(DedupWindow::new(60, 0.2, 0.5)));

    let metrics = Arc::new(curator_observability::metrics::MetricsCollector::new()?);
    let stats = Arc::new(curator_server::stats::RandomRequestStats::new(60));
    let api_key_gate = Arc::new(api_key::ApiKeyGate::new(config.security.secret_key.clone().unwrap_or_default()));

    let app_state = AppState {
        pool: pool.clone(),
        vault: vault.clone(),
        config: config.clone(),
        http_client: http_client.clone(),
        token_cache: token_cache.clone(),
        refresher: refresher.clone(),
        select_strategy,
        select_config,
        dedup,
        metrics: metrics.clone(),
        stats: stats.clone(),
        api_key_gate,
    };

    let mut registry = HandlerRegistry::new();
    registry.register(Arc::new(HealUrlHandler {
        hydrate: HydrateMetadataHandler {
            vault: vault.clone(),
            token_cache: token_cache.clone(),
            refresher: refresher.clone(),
            pixiv_client: Arc::new(HttpPixivAppClient::new(http_client.clone())),
            strategy: select_strategy,
        },
    }));
    registry.register(Arc::new(HydrateMetadataHandler {
        vault: vault.clone(),
        token_cache: token_cache.clone(),
        refresher: refresher.clone(),
        pixiv_client: Arc::new(HttpPixivAppClient::new(http_client.clone())),
        strategy: select_strategy,
    }));
    registry.register(Arc::new(ImportUrlsHandler));
    registry.register(Arc::new(ProxyProbeHandler {
        vault: vault.clone(),
        probe_url: "https://www.pixiv.net/".to_string(),
        timeout_s: 10,
    }));
    registry.register(Arc::new(RequestLogCleanupHandler { retention_days: 30 }));
    registry.register(Arc::new(EasyProxiesRefreshHandler {
        client: Arc::new(HttpEasyProxiesClient::new(
            http_client.clone(),
            std::env::var("CURATOR_EASY_PROXIES_PASSWORD").unwrap_or_default(),
        )),
        vault: vault.clone(),
    }));

    let dispatcher = Arc::new(Dispatcher::new(pool.clone(), Arc::new(registry), worker_id(), config.worker.lock_ttl_s));
    let _dispatch_handle = dispatcher.spawn(Duration::from_millis(config.worker.poll_interval_ms.max(1)));
    let _subloop_handle = spawn_periodic_subloops(pool.clone());

    let admin_server = curator_admin::AdminServer::new(
        config.server.admin_addr,
        pool.clone(),
        vault.clone(),
        config.admin.clone(),
        config.security.clone(),
        stats.clone() as Arc<dyn curator_admin::StatsSource>,
    );
    let admin_handle = tokio::spawn(async move {
        if let Err(err) = admin_server.start().await {
            tracing::error!(error = %err, "admin API server failed");
        }
    });

    let public_router = build_public_router(app_state);
    info!(addr = %config.server.public_addr, "starting public API server");
    let listener = tokio::net::TcpListener::bind(config.server.public_addr).await?;
    axum::serve(listener, public_router).with_graceful_shutdown(shutdown_signal()).await?;

    admin_handle.abort();
    Ok(())
}

fn worker_id() -> String {
    format!("curator-{}", std::process::id())
}

/// Heartbeat plus the periodic enqueue sub-loops (proxy-probe,
/// easy-proxies refresh, request-log cleanup), each de-duplicated so at
/// most one instance sits pending/running at a time.
fn spawn_periodic_subloops(pool: sqlx::SqlitePool) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut tick = tokio::time::interval(Duration::from_secs(30));
        loop {
            tick.tick().await;

            let settings = SettingsRepo::new(&pool);
            let heartbeat = serde_json::json!({
                "at": curator_core::time::now_iso_millis(),
                "worker_id": worker_id(),
                "pid": std::process::id(),
            })
            .to_string();
            if let Err(err) = settings.set("worker.last_seen_at", &heartbeat).await {
                tracing::warn!(error = %err, "failed to write worker heartbeat");
            }

            let jobs = curator_store::jobs::JobsRepo::new(&pool);
            let _ = jobs.enqueue_deduped("request_log_cleanup", "{}", 0, 3, "request_log_cleanup", "singleton").await;

            if let Ok(base_url) = std::env::var("CURATOR_EASY_PROXIES_BASE_URL") {
                let payload = serde_json::json!({ "base_url": base_url }).to_string();
                let _ = jobs.enqueue_deduped("easy_proxies_import", &payload, 0, 3, "easy_proxies_import", "singleton").await;
            }

            let proxies = curator_store::proxies::ProxiesRepo::new(&pool);
            match proxies.get_pool_by_name("default").await {
                Ok(Some(default_pool)) => match proxies.list_pool_members(default_pool.id).await {
                    Ok(members) => {
                        for endpoint in members {
                            let _ = jobs
                                .enqueue_deduped("proxy_probe", "{}", 0, 3, "proxy_probe", &endpoint.id.to_string())
                                .await;
                        }
                    }
                    Err(err) => tracing::warn!(error = %err, "failed to list proxy pool members"),
                },
                Ok(None) => {}
                Err(err) => tracing::warn!(error = %err, "failed to look up default proxy pool"),
            }
        }
    })
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received, draining connections");
}
