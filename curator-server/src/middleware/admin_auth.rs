//! Gate for the handful of public-surface routes the spec marks
//! admin-authenticated (`/metrics`). Reuses `curator_admin::auth`'s JWT
//! verification rather than duplicating it, the same bearer+subject
//! check the admin crate's own `require_admin_auth` middleware runs.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use curator_admin::auth::{require_admin, AuthError};

use crate::state::AppState;

pub async fn require_admin_auth(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let header = request.headers().get(axum::http::header::AUTHORIZATION).and_then(|v| v.to_str().ok());

    let secret_key = state.config.security.secret_key.as_deref().unwrap_or_default();
    match require_admin(header, secret_key, &state.config.admin.username) {
        Ok(_claims) => Ok(next.run(request).await),
        Err(AuthError::Forbidden) => Err(StatusCode::FORBIDDEN),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}
