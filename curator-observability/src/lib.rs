pub mod access_log;
pub mod metrics;
pub mod prometheus_exporter;
pub mod redact;
