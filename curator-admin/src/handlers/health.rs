use crate::server::AppState;
use axum::extract::State;
use axum::response::Json;
use chrono::Duration;
use curator_core::ids::new_request_id;
use curator_core::time::parse_iso;
use curator_store::settings::SettingsRepo;
use serde_json::{json, Value};

const JOB_STATUSES: &[&str] = &["pending", "running", "paused", "canceled", "completed", "failed", "dlq"];
const DEFAULT_STALE_AFTER_S: i64 = 60;

/// `GET /admin/api/health`, a direct port of
/// `original_source/backend/app/api/public/healthz.py`'s worker/queue
/// staleness report.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let request_id = new_request_id();

    let db_ok = sqlx::query("SELECT 1").execute(&state.pool).await.is_ok();

    if !db_ok {
        return Json(json!({
            "ok": false,
            "db_ok": false,
            "request_id": request_id,
        }));
    }

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
                let stale = chrono::Utc::now() - last_seen > Duration::seconds(DEFAULT_STALE_AFTER_S);
                (!stale, if stale { "stale" } else { "ok" })
            }
        },
    };

    let mut counts = json!({});
    let mut queue_ok = true;
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
        Err(_) => queue_ok = false,
    }

    Json(json!({
        "ok": true,
        "db_ok": true,
        "worker_ok": worker_ok,
        "queue_ok": queue_ok,
        "worker": {
            "last_seen_at": worker_last_seen_at,
            "stale_after_s": DEFAULT_STALE_AFTER_S,
            "reason": worker_reason,
        },
        "queue": {
            "counts": counts,
        },
        "request_id": request_id,
    }))
}
