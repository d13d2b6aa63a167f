use crate::server::AppState;
use axum::extract::State;
use axum::response::Json;
use curator_core::ids::new_request_id;
use serde_json::{json, Value};

/// `GET /admin/api/stats`, surfacing the per-process `/random` stats
/// window the public server owns.
pub async fn stats(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "ok": true,
        "stats": state.stats.snapshot(),
        "request_id": new_request_id(),
    }))
}
