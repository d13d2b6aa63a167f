use crate::auth::create_jwt;
use crate::server::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::Json;
use curator_core::ids::new_request_id;
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Debug, Deserialize)]
pub struct LoginBody {
    #[serde(default)]
    username: String,
    #[serde(default)]
    password: String,
}

/// `POST /admin/api/login`, grounded on
/// `original_source/backend/app/api/admin/auth.py::login`.
pub async fn login(State(state): State<AppState>, Json(body): Json<LoginBody>) -> (StatusCode, Json<Value>) {
    let request_id = new_request_id();
    let username = body.username.trim();
    if username.is_empty() || body.password.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"ok": false, "error": "missing credentials", "request_id": request_id})),
        );
    }

    let expected_password = state.admin.password.as_deref().unwrap_or_default();
    let credentials_match = username == state.admin.username
        && !expected_password.is_empty()
        && constant_time_eq(body.password.as_bytes(), expected_password.as_bytes());

    if !credentials_match {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"ok": false, "error": "invalid credentials", "request_id": request_id})),
        );
    }

    let now = chrono::Utc::now().timestamp();
    let token = match create_jwt(state.secret_key(), &state.admin.username, state.admin.jwt_ttl_s, now) {
        Ok(t) => t,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "error": "token generation failed", "request_id": request_id})),
            );
        }
    };

    (StatusCode::OK, Json(json!({"ok": true, "token": token, "request_id": request_id})))
}

/// `POST /admin/api/logout`. Tokens are stateless; this only confirms the
/// caller already holds a valid one.
pub async fn logout() -> Json<Value> {
    Json(json!({"ok": true, "request_id": new_request_id()}))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_time_eq_matches_equal_slices() {
        assert!(constant_time_eq(b"secret", b"secret"));
        assert!(!constant_time_eq(b"secret", b"secre0"));
        assert!(!constant_time_eq(b"short", b"longer-value"));
    }
}
