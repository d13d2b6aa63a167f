//! Library surface behind the `curator-server` binary: the public HTTP
//! handlers, middleware, and shared state, factored out of `main.rs` so
//! the end-to-end scenarios in `tests/` can build the same router the
//! binary serves without re-running process bootstrap.

pub mod easy_proxies_client;
pub mod error;
pub mod handlers;
pub mod imgproxy;
pub mod middleware;
pub mod pixiv_client;
pub mod state;
pub mod stats;

use crate::middleware::{access_log, admin_auth, api_key};
use crate::state::AppState;

/// Assembles the public axum router from every handler module, the same
/// wiring `main.rs` serves on `config.server.public_addr`.
pub fn build_public_router(state: AppState) -> axum::Router {
    use axum::routing::get;
    use axum::Router;

    let metrics_route = Router::new()
        .route("/metrics", get(handlers::metrics::metrics))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), admin_auth::require_admin_auth));

    let random_route = Router::new()
        .route("/random", get(handlers::random::random_handler))
        .route_layer(axum::middleware::from_fn_with_state(state.clone(), api_key::require_api_key));

    Router::new()
        .route("/healthz", get(handlers::healthz::healthz))
        .route("/version", get(handlers::version::version))
        .merge(metrics_route)
        .merge(random_route)
        .route("/images", get(handlers::images::list_images))
        .route("/images/{id}", get(handlers::images::get_image))
        .route("/tags", get(handlers::tags::list_tags))
        .route("/authors", get(handlers::authors::list_authors))
        .route("/i/{file}", get(handlers::serve::serve_by_id))
        .route("/{file}", get(handlers::serve::serve_legacy))
        .route_layer(axum::middleware::from_fn(access_log::request_context))
        .with_state(state)
}
