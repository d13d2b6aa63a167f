use crate::server::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use curator_core::ids::new_request_id;
use curator_store::proxies::{ConflictPolicy, ProxiesRepo};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct ImportBody {
    uris: Vec<String>,
    #[serde(default)]
    conflict_policy: Option<String>,
}

/// `POST /admin/api/proxies/import`, the conflict-policy endpoint E2E
/// scenario 5 exercises.
pub async fn import_proxies(
    State(state): State<AppState>,
    Json(body): Json<ImportBody>,
) -> (StatusCode, Json<Value>) {
    let request_id = new_request_id();
    let policy = body
        .conflict_policy
        .as_deref()
        .and_then(ConflictPolicy::parse)
        .unwrap_or(ConflictPolicy::Skip);

    let repo = ProxiesRepo::new(&state.pool);
    match repo.import_uris(&body.uris, policy, &state.vault).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({"ok": true, "summary": summary, "request_id": request_id})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"ok": false, "error": e.to_string(), "request_id": request_id})),
        ),
    }
}
