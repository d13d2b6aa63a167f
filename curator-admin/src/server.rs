use crate::handlers;
use crate::stats_source::StatsSource;
use curator_core::config::{AdminConfig, SecurityConfig};
use curator_store::vault::Vault;
use axum::routing::{get, post, put};
use axum::Router as AxumRouter;
use sqlx::SqlitePool;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub vault: Arc<Vault>,
    pub admin: AdminConfig,
    pub security: SecurityConfig,
    pub stats: Arc<dyn StatsSource>,
}

impl AppState {
    pub fn secret_key(&self) -> &str {
        self.security.secret_key.as_deref().unwrap_or_default()
    }
}

pub struct AdminServer {
    addr: SocketAddr,
    state: AppState,
}

impl AdminServer {
    pub fn new(
        addr: SocketAddr,
        pool: SqlitePool,
        vault: Arc<Vault>,
        admin: AdminConfig,
        security: SecurityConfig,
        stats: Arc<dyn StatsSource>,
    ) -> Self {
        Self {
            addr,
            state: AppState {
                pool,
                vault,
                admin,
                security,
                stats,
            },
        }
    }

    fn build_router(&self) -> AxumRouter {
        let protected = AxumRouter::new()
            .route("/logout", post(handlers::auth::logout))
            .route("/health", get(handlers::health::health))
            .route("/stats", get(handlers::stats::stats))
            .route("/settings", get(handlers::settings::list_settings))
            .route("/settings/{key}", put(handlers::settings::put_setting))
            .route("/proxies/import", post(handlers::proxies::import_proxies))
            .route_layer(axum::middleware::from_fn_with_state(
                self.state.clone(),
                crate::middleware::require_admin_auth,
            ));

        let api = AxumRouter::new()
            .route("/login", post(handlers::auth::login))
            .merge(protected);

        AxumRouter::new()
            .nest("/admin/api", api)
            .with_state(self.state.clone())
    }

    pub async fn start(self) -> anyhow::Result<()> {
        let app = self.build_router();
        info!(addr = %self.addr, "starting admin API server");
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        axum::serve(listener, app).await?;
        Ok(())
    }

    pub fn into_router(self) -> AxumRouter {
        self.build_router()
    }
}
