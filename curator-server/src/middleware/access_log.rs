//! Request-id stamping and access logging for the public surface,
//! grounded on `curator_observability::access_log::AccessLogEntry` and
//! run through the same redaction pass the observability crate exposes
//! for anything structured that might carry a secret.

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{HeaderValue, Request};
use axum::middleware::Next;
use axum::response::Response;
use curator_core::ids::new_request_id;
use curator_observability::access_log::AccessLogEntry;
use curator_observability::redact::redact_text;
use std::net::SocketAddr;
use std::time::Instant;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

pub async fn request_context(mut request: Request<Body>, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(new_request_id);

    let client_ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let started_at = Instant::now();

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let mut response = next.run(request).await;

    let latency_ms = started_at.elapsed().as_secs_f64() * 1000.0;
    let status = response.status().as_u16();

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert("x-request-id", value);
    }

    let entry = AccessLogEntry {
        timestamp: curator_core::time::now_iso_millis(),
        request_id: request_id.clone(),
        path: redact_text(&path),
        client_ip,
        method,
        response_status: status,
        latency_ms,
        upstream_addr: None,
    };

    tracing::info!(
        request_id = %entry.request_id,
        path = %entry.path,
        method = %entry.method,
        status = entry.response_status,
        latency_ms = entry.latency_ms,
        client_ip = %entry.client_ip,
        "request completed"
    );

    response
}

#[derive(Clone)]
pub struct RequestId(pub String);

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
