/// Seam for the per-process `/random` stats window owned by the public
/// server binary, so this crate never needs to depend on it.
pub trait StatsSource: Send + Sync {
    fn snapshot(&self) -> serde_json::Value;
}

/// Used when a binary wires the admin server up without a live stats
/// window (e.g. an admin-only process, or tests).
pub struct NoStats;

impl StatsSource for NoStats {
    fn snapshot(&self) -> serde_json::Value {
        serde_json::json!({
            "total_requests": 0,
            "total_ok": 0,
            "total_error": 0,
            "in_flight": 0,
            "window_seconds": 60,
            "last_window_requests": 0,
            "last_window_ok": 0,
            "last_window_error": 0,
            "last_window_success_rate": 0.0,
        })
    }
}
