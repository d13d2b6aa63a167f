//! `GET /version`: build metadata, no DB round trip.

use axum::response::Json;
use serde_json::{json, Value};

pub async fn version() -> Json<Value> {
    Json(json!({
        "ok": true,
        "version": env!("CARGO_PKG_VERSION"),
        "build": option_env!("CURATOR_BUILD_ID").unwrap_or("dev"),
        "commit": option_env!("CURATOR_COMMIT_SHA").unwrap_or("unknown"),
    }))
}
