//! `GET /metrics`: Prometheus text exposition, gated behind the same
//! admin bearer check as the `/admin/api` surface (mounted here, rather
//! than under `/admin/api`, since scrapers expect the conventional path).

use axum::extract::State;
use axum::response::{IntoResponse, Response};

use crate::state::AppState;

pub async fn metrics(State(state): State<AppState>) -> Response {
    let body = curator_observability::prometheus_exporter::render_metrics(&state.metrics);
    (
        [(axum::http::header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    )
        .into_response()
}
