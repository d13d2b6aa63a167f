use crate::server::AppState;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::Json;
use curator_core::ids::new_request_id;
use curator_store::settings::SettingsRepo;
use serde_json::{json, Value};

/// `GET /admin/api/settings`, grounded on
/// `original_source/backend/app/core/effective_settings.py`'s runtime
/// overlay, flattened to the `key -> value_json` shape the store already
/// models.
pub async fn list_settings(State(state): State<AppState>) -> Json<Value> {
    let repo = SettingsRepo::new(&state.pool);
    let rows = repo.list().await.unwrap_or_default();
    let settings: Value = rows
        .into_iter()
        .map(|row| {
            let value = serde_json::from_str::<Value>(&row.value_json).unwrap_or(Value::Null);
            (row.key, value)
        })
        .collect::<serde_json::Map<_, _>>()
        .into();

    Json(json!({
        "ok": true,
        "settings": settings,
        "request_id": new_request_id(),
    }))
}

/// `PUT /admin/api/settings/{key}`, accepting a bare JSON value as the
/// request body and storing it verbatim under `key`.
pub async fn put_setting(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(value): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let repo = SettingsRepo::new(&state.pool);
    let value_json = serde_json::to_string(&value).unwrap_or_else(|_| "null".to_string());

    match repo.set(&key, &value_json).await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({"ok": true, "key": key, "request_id": new_request_id()})),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"ok": false, "error": e.to_string(), "request_id": new_request_id()})),
        ),
    }
}
