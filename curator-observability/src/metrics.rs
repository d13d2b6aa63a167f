use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};

/// Prometheus collector for the public and worker surfaces. A
/// representative subset of the original catalogue per SPEC_FULL's
/// "ambient stack" note — not every label set the original exposed.
pub struct MetricsCollector {
    registry: Registry,

    pub http_requests_total: IntCounterVec,
    pub http_request_duration: HistogramVec,

    /// `RANDOM_REQUESTS_TOTAL{result}` from spec §4.J.
    pub random_requests_total: IntCounterVec,
    /// `RANDOM_LATENCY_SECONDS` from spec §4.J.
    pub random_latency_seconds: HistogramVec,

    pub jobs_claimed_total: IntCounterVec,
    pub jobs_completed_total: IntCounterVec,
    pub jobs_failed_total: IntCounterVec,

    pub proxy_probe_success_total: IntCounterVec,
    pub proxy_probe_failure_total: IntCounterVec,

    pub active_connections: IntGauge,
}

impl MetricsCollector {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("curator_http_requests_total", "Total HTTP requests").namespace("curator"),
            &["route", "method", "status"],
        )?;
        let http_request_duration = HistogramVec::new(
            HistogramOpts::new("curator_http_request_duration_seconds", "Request latency")
                .namespace("curator")
                .buckets(vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["route"],
        )?;
        let random_requests_total = IntCounterVec::new(
            Opts::new("curator_random_requests_total", "Total /random requests by result").namespace("curator"),
            &["result"],
        )?;
        let random_latency_seconds = HistogramVec::new(
            HistogramOpts::new("curator_random_latency_seconds", "/random handler latency")
                .namespace("curator")
                .buckets(vec![0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["result"],
        )?;
        let jobs_claimed_total = IntCounterVec::new(
            Opts::new("curator_jobs_claimed_total", "Jobs claimed by type").namespace("curator"),
            &["type"],
        )?;
        let jobs_completed_total = IntCounterVec::new(
            Opts::new("curator_jobs_completed_total", "Jobs completed by type").namespace("curator"),
            &["type"],
        )?;
        let jobs_failed_total = IntCounterVec::new(
            Opts::new("curator_jobs_failed_total", "Jobs failed by type").namespace("curator"),
            &["type"],
        )?;
        let proxy_probe_success_total = IntCounterVec::new(
            Opts::new("curator_proxy_probe_success_total", "Successful proxy probes").namespace("curator"),
            &["endpoint_id"],
        )?;
        let proxy_probe_failure_total = IntCounterVec::new(
            Opts::new("curator_proxy_probe_failure_total", "Failed proxy probes").namespace("curator"),
            &["endpoint_id"],
        )?;
        let active_connections = IntGauge::new("curator_active_connections", "Active HTTP connections")?;

        registry.register(Box::new(http_requests_total.clone()))?;
        registry.register(Box::new(http_request_duration.clone()))?;
        registry.register(Box::new(random_requests_total.clone()))?;
        registry.register(Box::new(random_latency_seconds.clone()))?;
        registry.register(Box::new(jobs_claimed_total.clone()))?;
        registry.register(Box::new(jobs_completed_total.clone()))?;
        registry.register(Box::new(jobs_failed_total.clone()))?;
        registry.register(Box::new(proxy_probe_success_total.clone()))?;
        registry.register(Box::new(proxy_probe_failure_total.clone()))?;
        registry.register(Box::new(active_connections.clone()))?;

        Ok(Self {
            registry,
            http_requests_total,
            http_request_duration,
            random_requests_total,
            random_latency_seconds,
            jobs_claimed_total,
            jobs_completed_total,
            jobs_failed_total,
            proxy_probe_success_total,
            proxy_probe_failure_total,
            active_connections,
        })
    }

    pub fn record_request(&self, route: &str, method: &str, status: u16, duration_secs: f64) {
        self.http_requests_total.with_label_values(&[route, method, &status.to_string()]).inc();
        self.http_request_duration.with_label_values(&[route]).observe(duration_secs);
    }

    pub fn record_random_request(&self, result: &str, duration_secs: f64) {
        self.random_requests_total.with_label_values(&[result]).inc();
        self.random_latency_seconds.with_label_values(&[result]).observe(duration_secs);
    }

    pub fn gather_text(&self) -> String {
        let encoder = TextEncoder::new();
        let metrics = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metrics, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new().expect("failed to build metrics collector")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gather_text_includes_registered_metric_names() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_random_request("ok", 0.01);
        let text = collector.gather_text();
        assert!(text.contains("curator_random_requests_total"));
    }
}
