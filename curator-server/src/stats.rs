//! Per-process `/random` request stats: cumulative totals plus a 60s
//! sliding window, a port of
//! `original_source/backend/app/core/random_request_stats.py`. Backs
//! `GET /admin/api/stats` via `curator_admin::StatsSource`.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Instant;

use curator_admin::StatsSource;
use serde_json::{json, Value};

struct Inner {
    total_requests: u64,
    total_ok: u64,
    total_error: u64,
    in_flight: u64,
    events: VecDeque<(Instant, bool)>,
}

pub struct RandomRequestStats {
    window_s: u64,
    inner: Mutex<Inner>,
}

pub struct InFlightGuard<'a> {
    stats: &'a RandomRequestStats,
    started_at: Instant,
}

impl RandomRequestStats {
    pub fn new(window_seconds: u64) -> Self {
        Self {
            window_s: window_seconds.max(1),
            inner: Mutex::new(Inner {
                total_requests: 0,
                total_ok: 0,
                total_error: 0,
                in_flight: 0,
                events: VecDeque::new(),
            }),
        }
    }

    fn purge(inner: &mut Inner, now: Instant, window_s: u64) {
        let window = std::time::Duration::from_secs(window_s);
        while let Some(&(t, _)) = inner.events.front() {
            if now.duration_since(t) <= window {
                break;
            }
            inner.events.pop_front();
        }
    }

    /// Marks a request as started; the returned guard's `Drop`-adjacent
    /// `finish` call records the outcome and decrements in-flight.
    pub fn on_begin(&self) -> InFlightGuard<'_> {
        let mut inner = self.inner.lock().unwrap();
        inner.total_requests += 1;
        inner.in_flight += 1;
        InFlightGuard { stats: self, started_at: Instant::now() }
    }

    fn on_end(&self, status_code: u16) {
        let ok = (200..400).contains(&status_code);
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        inner.in_flight = inner.in_flight.saturating_sub(1);
        if ok {
            inner.total_ok += 1;
        } else {
            inner.total_error += 1;
        }
        inner.events.push_back((now, ok));
        Self::purge(&mut inner, now, self.window_s);
    }
}

impl<'a> InFlightGuard<'a> {
    pub fn finish(self, status_code: u16) {
        self.stats.on_end(status_code);
    }

    /// Elapsed wall time since this request began, for latency metrics.
    pub fn elapsed(&self) -> std::time::Duration {
        self.started_at.elapsed()
    }
}

impl StatsSource for RandomRequestStats {
    fn snapshot(&self) -> Value {
        let now = Instant::now();
        let mut inner = self.inner.lock().unwrap();
        Self::purge(&mut inner, now, self.window_s);

        let last_total = inner.events.len() as u64;
        let last_ok = inner.events.iter().filter(|(_, ok)| *ok).count() as u64;
        let last_error = last_total - last_ok;
        let rate = if last_total > 0 { last_ok as f64 / last_total as f64 } else { 0.0 };

        json!({
            "total_requests": inner.total_requests,
            "total_ok": inner.total_ok,
            "total_error": inner.total_error,
            "in_flight": inner.in_flight,
            "window_seconds": self.window_s,
            "last_window_requests": last_total,
            "last_window_ok": last_ok,
            "last_window_error": last_error,
            "last_window_success_rate": rate,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_totals_and_in_flight() {
        let stats = RandomRequestStats::new(60);
        let guard = stats.on_begin();
        let snap = stats.snapshot();
        assert_eq!(snap["in_flight"], 1);
        guard.finish(200);
        let snap = stats.snapshot();
        assert_eq!(snap["in_flight"], 0);
        assert_eq!(snap["total_ok"], 1);
        assert_eq!(snap["last_window_success_rate"], 1.0);
    }

    #[test]
    fn error_status_counts_as_error() {
        let stats = RandomRequestStats::new(60);
        stats.on_begin().finish(502);
        let snap = stats.snapshot();
        assert_eq!(snap["total_error"], 1);
        assert_eq!(snap["last_window_success_rate"], 0.0);
    }
}
