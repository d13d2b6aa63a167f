use serde::{Deserialize, Serialize};

/// Structured access log entry, grounded on
/// `original_source/backend/app/core/request_id.py`'s per-request fields.
#[derive(Debug, Serialize, Deserialize)]
pub struct AccessLogEntry {
    pub timestamp: String,
    pub request_id: String,
    pub path: String,
    pub client_ip: String,
    pub method: String,
    pub response_status: u16,
    pub latency_ms: f64,
    pub upstream_addr: Option<String>,
}
