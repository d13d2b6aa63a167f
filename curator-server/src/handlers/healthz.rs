//! `GET /healthz`: the same worker/queue staleness report
//! `curator_admin::handlers::health` exposes under the admin surface,
//! mounted here unauthenticated for external uptime checks, with a 503
//! when the database itself is unreachable.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use chrono::Duration;
use curator_core::ids::new_request_id;
use curator_core::time::parse_iso;
use curator_store::settings::SettingsRepo;
use serde_json::{json, Value};

use crate::state::AppState;

const JOB_STATUSES: &[&str] = &["pending", "running", "paused", "canceled", "completed", "failed", "dlq"];

pub async fn healthz(State(state): State<AppState>) -> Response {
    let request_id = new_request_id();
    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    if !db_ok {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "ok": false, "db_ok": false, "request_id": request_id })),
        )
            .into_response();
    }

    let stale_after_s =
        curator_core::config::clamp_worker_heartbeat_stale_seconds(state.config.worker.heartbeat_stale_seconds) as i64;

    let settings = SettingsRepo::new(&state.pool);
    let worker_last_seen_at = settings
        .get("worker.last_seen_at")
        .await
        .ok()
        .flatten()
        .and_then(|row| serde_json::from_str::<Value>(&row.value_json).ok())
        .and_then(|value| match value {
            Value::String(s) => Some(s),
            Value::Object(map) => map.get("at").and_then(|v| v.as_str()).map(str::to_string),
            _ => None,
        });

    let (worker_ok, worker_reason) = match &worker_last_seen_at {
        None => (false, "no_heartbeat"),
        Some(at) => match parse_iso(at) {
            None => (false, "invalid_timestamp"),
            Some(last_seen) => {
                let stale = chrono::Utc::now() - last_seen > Duration::seconds(stale_after_s);
                (!stale, if stale { "stale" } else { "ok" })
            }
        },
    };

    let mut counts = json!({});
    let mut queue_ok = true;
    let mut queue_reason = "ok";
    match sqlx::query_as::<_, (String, i64)>("SELECT status, COUNT(*) FROM jobs GROUP BY status")
        .fetch_all(&state.pool)
        .await
    {
        Ok(rows) => {
            let map = counts.as_object_mut().unwrap();
            for status in JOB_STATUSES {
                map.insert(status.to_string(), json!(0));
            }
            for (status, count) in rows {
                map.insert(status, json!(count));
            }
        }
        Err(_) => {
            queue_ok = false;
            queue_reason = "query_failed";
        }
    }

    Json(json!({
        "ok": true,
        "db_ok": true,
        "worker_ok": worker_ok,
        "queue_ok": queue_ok,
        "worker": {
            "last_seen_at": worker_last_seen_at,
            "stale_after_s": stale_after_s,
            "reason": worker_reason,
        },
        "queue": {
            "counts": counts,
            "reason": queue_reason,
        },
        "request_id": request_id,
    }))
    .into_response()
}
