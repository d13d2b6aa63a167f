use crate::auth::{require_admin, AuthError};
use crate::server::AppState;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;

/// Rejects requests without a valid `Bearer` JWT whose `sub` matches the
/// configured admin username.
pub async fn require_admin_auth(
    State(state): State<AppState>,
    request: Request<axum::body::Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    let header = request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    match require_admin(header, state.secret_key(), &state.admin.username) {
        Ok(_claims) => Ok(next.run(request).await),
        Err(AuthError::Forbidden) => Err(StatusCode::FORBIDDEN),
        Err(_) => Err(StatusCode::UNAUTHORIZED),
    }
}
