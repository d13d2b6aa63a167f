//! Domain types for every table in the data model: images and their tags,
//! upstream credentials and the proxy fleet they route through, the durable
//! job queue, and the small amount of admin/observability plumbing the
//! public and admin surfaces need.
//!
//! All timestamps are ISO-8601 UTC with millisecond precision and a
//! trailing `Z` (`curator_core::time::now_iso_millis`). Booleans are stored
//! as `0`/`1` in SQLite; these types use `bool`/`Option<T>` and the store
//! layer maps at the boundary.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum ImageStatus {
    Active = 1,
    Disabled = 2,
    Broken = 3,
    Deleted = 4,
}

impl ImageStatus {
    pub fn from_i64(v: i64) -> Option<Self> {
        match v {
            1 => Some(ImageStatus::Active),
            2 => Some(ImageStatus::Disabled),
            3 => Some(ImageStatus::Broken),
            4 => Some(ImageStatus::Deleted),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(i64)]
pub enum Orientation {
    Portrait = 1,
    Landscape = 2,
    Square = 3,
}

/// Identity `(illust_id, page_index)` unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Image {
    pub id: i64,
    pub illust_id: i64,
    pub page_index: i32,
    pub extension: String,
    pub original_url: String,
    pub proxy_path: String,
    pub random_key: f64,

    pub width: Option<i64>,
    pub height: Option<i64>,
    pub aspect_ratio: Option<f64>,
    pub orientation: Option<i64>,

    pub x_restrict: Option<i64>,
    pub ai_type: Option<i64>,
    pub illust_type: Option<i64>,
    pub user_id: Option<i64>,
    pub user_name: Option<String>,
    pub title: Option<String>,
    pub created_at_pixiv: Option<String>,

    pub bookmark_count: Option<i64>,
    pub view_count: Option<i64>,
    pub comment_count: Option<i64>,

    pub status: i64,
    pub fail_count: i64,
    pub last_fail_at: Option<String>,
    pub last_ok_at: Option<String>,
    pub last_error_code: Option<String>,
    pub last_error_msg: Option<String>,

    pub created_at: String,
    pub updated_at: String,
}

impl Image {
    pub fn status(&self) -> Option<ImageStatus> {
        ImageStatus::from_i64(self.status)
    }

    pub fn has_complete_metadata(&self) -> bool {
        self.width.is_some() && self.height.is_some() && self.user_id.is_some()
    }

    pub fn legacy_filename(&self) -> String {
        if self.page_index == 0 {
            format!("{}.{}", self.illust_id, self.extension)
        } else {
            format!("{}-{}.{}", self.illust_id, self.page_index + 1, self.extension)
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ImageTag {
    pub image_id: i64,
    pub tag_id: i64,
}

/// Credential record. `refresh_token_enc` is ciphertext; plaintext is never
/// returned by any read path except the outbound client factory (§4.C/4.E).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct PixivToken {
    pub id: i64,
    pub label: Option<String>,
    pub refresh_token_enc: String,
    pub enabled: bool,
    pub weight: f64,
    pub error_count: i64,
    pub backoff_until: Option<String>,
    pub last_ok_at: Option<String>,
    pub last_fail_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl PixivToken {
    /// Always `***`; never the plaintext refresh token.
    pub const MASKED: &'static str = "***";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProxyScheme {
    Http,
    Https,
    Socks4,
    Socks5,
}

impl ProxyScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProxyScheme::Http => "http",
            ProxyScheme::Https => "https",
            ProxyScheme::Socks4 => "socks4",
            ProxyScheme::Socks5 => "socks5",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "http" => Some(ProxyScheme::Http),
            "https" => Some(ProxyScheme::Https),
            "socks4" => Some(ProxyScheme::Socks4),
            "socks5" => Some(ProxyScheme::Socks5),
            _ => None,
        }
    }
}

/// Identity `(scheme, host, port, username)` unique.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProxyEndpoint {
    pub id: i64,
    pub scheme: String,
    pub host: String,
    pub port: i32,
    pub username: Option<String>,
    pub password_enc: Option<String>,
    pub enabled: bool,
    pub source: String,

    pub last_latency_ms: Option<i64>,
    pub last_ok_at: Option<String>,
    pub last_fail_at: Option<String>,
    pub success_count: i64,
    pub failure_count: i64,
    pub blacklisted_until: Option<String>,
    pub last_error: Option<String>,

    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProxyPool {
    pub id: i64,
    pub name: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ProxyPoolEndpoint {
    pub pool_id: i64,
    pub endpoint_id: i64,
    pub enabled: bool,
    pub weight: f64,
}

/// Unique `(token_id, pool_id)`. `override_proxy_id` is set iff
/// `override_expires_at` is set; the effective proxy is the override when
/// not expired, else the primary.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TokenProxyBinding {
    pub token_id: i64,
    pub pool_id: i64,
    pub primary_proxy_id: i64,
    pub override_proxy_id: Option<i64>,
    pub override_expires_at: Option<String>,
    pub proxy_fail_attempt: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Paused,
    Canceled,
    Completed,
    Failed,
    Dlq,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Paused => "paused",
            JobStatus::Canceled => "canceled",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Dlq => "dlq",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Some(match s {
            "pending" => JobStatus::Pending,
            "running" => JobStatus::Running,
            "paused" => JobStatus::Paused,
            "canceled" => JobStatus::Canceled,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            "dlq" => JobStatus::Dlq,
            _ => return None,
        })
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Job {
    pub id: i64,
    #[sqlx(rename = "type")]
    pub job_type: String,
    pub status: String,
    pub priority: i64,
    pub run_after: Option<String>,
    pub attempt: i64,
    pub max_attempts: i64,
    pub payload_json: String,
    pub last_error: Option<String>,
    pub locked_by: Option<String>,
    pub locked_at: Option<String>,
    pub ref_type: Option<String>,
    pub ref_id: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Job {
    pub fn status(&self) -> Option<JobStatus> {
        JobStatus::parse(&self.status)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct HydrationRun {
    pub id: i64,
    pub ref_id: String,
    pub status: String,
    pub total: i64,
    pub succeeded: i64,
    pub failed: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RuntimeSetting {
    pub key: String,
    pub value_json: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Import {
    pub id: i64,
    pub source: String,
    pub total: i64,
    pub created_count: i64,
    pub skipped_count: i64,
    pub error_count: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct RequestLog {
    pub id: i64,
    pub request_id: String,
    pub path: String,
    pub method: String,
    pub status: i64,
    pub duration_ms: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct AdminAudit {
    pub id: i64,
    pub actor: String,
    pub action: String,
    pub details_json: String,
    pub created_at: String,
}

/// Key material is never stored; only `HMAC-SHA-256(secret_key, api_key)`
/// plus an 8-char SHA-256 hint.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ApiKey {
    pub id: String,
    pub key_hash: String,
    pub id_hint: String,
    pub enabled: bool,
    pub rpm: Option<i64>,
    pub burst: Option<i64>,
    pub created_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn image_status_roundtrip() {
        assert_eq!(ImageStatus::from_i64(1), Some(ImageStatus::Active));
        assert_eq!(ImageStatus::from_i64(3), Some(ImageStatus::Broken));
        assert_eq!(ImageStatus::from_i64(99), None);
    }

    #[test]
    fn job_status_roundtrip() {
        for s in ["pending", "running", "paused", "canceled", "completed", "failed", "dlq"] {
            let parsed = JobStatus::parse(s).unwrap();
            assert_eq!(parsed.as_str(), s);
        }
        assert!(JobStatus::parse("bogus").is_none());
    }

    #[test]
    fn legacy_filename_first_page_has_no_suffix() {
        let img = sample_image();
        assert_eq!(img.legacy_filename(), "12345670.jpg");
    }

    #[test]
    fn legacy_filename_second_page_is_one_based() {
        let mut img = sample_image();
        img.page_index = 1;
        assert_eq!(img.legacy_filename(), "12345670-2.jpg");
    }

    #[test]
    fn proxy_scheme_parses_case_insensitively() {
        assert_eq!(ProxyScheme::parse("HTTP"), Some(ProxyScheme::Http));
        assert_eq!(ProxyScheme::parse("socks5"), Some(ProxyScheme::Socks5));
        assert_eq!(ProxyScheme::parse("ftp"), None);
    }

    fn sample_image() -> Image {
        Image {
            id: 1,
            illust_id: 12345670,
            page_index: 0,
            extension: "jpg".to_string(),
            original_url: "https://example.test/origin.jpg".to_string(),
            proxy_path: "/i/1.jpg".to_string(),
            random_key: 0.5,
            width: None,
            height: None,
            aspect_ratio: None,
            orientation: None,
            x_restrict: None,
            ai_type: None,
            illust_type: None,
            user_id: None,
            user_name: None,
            title: None,
            created_at_pixiv: None,
            bookmark_count: None,
            view_count: None,
            comment_count: None,
            status: 1,
            fail_count: 0,
            last_fail_at: None,
            last_ok_at: None,
            last_error_code: None,
            last_error_msg: None,
            created_at: "2026-01-01T00:00:00.000Z".to_string(),
            updated_at: "2026-01-01T00:00:00.000Z".to_string(),
        }
    }
}
