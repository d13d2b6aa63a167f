use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::PathBuf;

/// Top-level configuration for Curator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// `dev` auto-generates secrets under `./data/`; `prod` requires them set.
    #[serde(default)]
    pub app_env: AppEnv,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub admin: AdminConfig,

    #[serde(default)]
    pub security: SecurityConfig,

    #[serde(default)]
    pub pixiv_oauth: PixivOauthConfig,

    #[serde(default)]
    pub imgproxy: ImgproxyConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub public_api_key: PublicApiKeyConfig,

    #[serde(default)]
    pub random: RandomDefaultsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AppEnv {
    Dev,
    Prod,
}

impl Default for AppEnv {
    fn default() -> Self {
        AppEnv::Dev
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_public_addr")]
    pub public_addr: SocketAddr,

    #[serde(default = "default_admin_addr")]
    pub admin_addr: SocketAddr,

    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    #[serde(default)]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            public_addr: default_public_addr(),
            admin_addr: default_admin_addr(),
            request_timeout_ms: default_request_timeout_ms(),
            cors_origins: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub sqlite_busy_timeout_ms: u64,

    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            sqlite_busy_timeout_ms: default_busy_timeout_ms(),
            pool_size: default_pool_size(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminConfig {
    #[serde(default = "default_admin_username")]
    pub username: String,

    /// Plaintext in config only for dev convenience; prod must set via env.
    #[serde(default)]
    pub password: Option<String>,

    #[serde(default = "default_jwt_ttl_s")]
    pub jwt_ttl_s: i64,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: default_admin_username(),
            password: None,
            jwt_ttl_s: default_jwt_ttl_s(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    #[serde(default)]
    pub secret_key: Option<String>,

    #[serde(default)]
    pub field_encryption_key: Option<String>,

    #[serde(default)]
    pub field_encryption_key_file: Option<PathBuf>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            field_encryption_key: None,
            field_encryption_key_file: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PixivOauthConfig {
    #[serde(default)]
    pub client_id: Option<String>,

    #[serde(default)]
    pub client_secret: Option<String>,

    #[serde(default)]
    pub hash_secret: Option<String>,
}

impl Default for PixivOauthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            client_secret: None,
            hash_secret: None,
        }
    }
}

impl PixivOauthConfig {
    pub fn is_configured(&self) -> bool {
        self.client_id.as_deref().is_some_and(|s| !s.trim().is_empty())
            && self
                .client_secret
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImgproxyConfig {
    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default)]
    pub key: Option<String>,

    #[serde(default)]
    pub salt: Option<String>,

    #[serde(default = "default_imgproxy_max_dim")]
    pub max_dim: u32,

    #[serde(default)]
    pub default_options: Option<String>,

    #[serde(default = "default_imgproxy_chunk_size")]
    pub url_chunk_size: usize,
}

impl Default for ImgproxyConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            key: None,
            salt: None,
            max_dim: default_imgproxy_max_dim(),
            default_options: None,
            url_chunk_size: default_imgproxy_chunk_size(),
        }
    }
}

impl ImgproxyConfig {
    pub fn is_configured(&self) -> bool {
        self.base_url.is_some() && self.key.is_some() && self.salt.is_some()
    }

    pub fn clamped_max_dim(&self) -> u32 {
        self.max_dim.clamp(16, 20_000)
    }

    pub fn clamped_chunk_size(&self) -> usize {
        self.url_chunk_size.clamp(0, 128)
    }

    pub fn effective_default_options(&self) -> String {
        self.default_options.clone().unwrap_or_else(|| {
            let dim = self.clamped_max_dim();
            format!("rs:fit:{dim}:{dim}")
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    #[serde(default = "default_heartbeat_stale_s")]
    pub heartbeat_stale_seconds: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_lock_ttl_s")]
    pub lock_ttl_s: i64,

    #[serde(default = "default_claim_batch")]
    pub claim_batch: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            heartbeat_stale_seconds: default_heartbeat_stale_s(),
            poll_interval_ms: default_poll_interval_ms(),
            lock_ttl_s: default_lock_ttl_s(),
            claim_batch: default_claim_batch(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicApiKeyConfig {
    #[serde(default)]
    pub required: bool,

    #[serde(default = "default_rpm")]
    pub rpm: u32,

    #[serde(default = "default_burst")]
    pub burst: u32,
}

impl Default for PublicApiKeyConfig {
    fn default() -> Self {
        Self {
            required: false,
            rpm: default_rpm(),
            burst: default_burst(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomDefaultsConfig {
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    #[serde(default)]
    pub r18_strict: bool,

    #[serde(default = "default_fail_cooldown_ms")]
    pub fail_cooldown_ms: i64,

    #[serde(default = "default_strategy")]
    pub strategy: String,

    #[serde(default = "default_quality_samples")]
    pub quality_samples: u32,
}

impl Default for RandomDefaultsConfig {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            r18_strict: false,
            fail_cooldown_ms: default_fail_cooldown_ms(),
            strategy: default_strategy(),
            quality_samples: default_quality_samples(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    #[serde(default = "default_true")]
    pub metrics_enabled: bool,

    #[serde(default = "default_metrics_path")]
    pub metrics_path: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_path: default_metrics_path(),
        }
    }
}

impl AppConfig {
    /// Load configuration from YAML file + environment variables.
    ///
    /// Environment variables override: `CURATOR_SERVER__PUBLIC_ADDR`, etc.
    pub fn load(config_path: Option<&str>) -> anyhow::Result<Self> {
        let mut figment = Figment::new();

        if let Some(path) = config_path {
            figment = figment.merge(Yaml::file(path));
        } else {
            for default_path in &["curator.yaml", "/etc/curator/curator.yaml", "config/curator.yaml"] {
                if std::path::Path::new(default_path).exists() {
                    figment = figment.merge(Yaml::file(default_path));
                    break;
                }
            }
        }

        figment = figment.merge(Env::prefixed("CURATOR_").split("__"));

        let config: Self = figment.extract()?;
        Ok(config)
    }

    pub fn is_dev(&self) -> bool {
        self.app_env == AppEnv::Dev
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_env: AppEnv::default(),
            server: ServerConfig::default(),
            database: DatabaseConfig::default(),
            admin: AdminConfig::default(),
            security: SecurityConfig::default(),
            pixiv_oauth: PixivOauthConfig::default(),
            imgproxy: ImgproxyConfig::default(),
            worker: WorkerConfig::default(),
            public_api_key: PublicApiKeyConfig::default(),
            random: RandomDefaultsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

fn default_public_addr() -> SocketAddr {
    "0.0.0.0:8080".parse().unwrap()
}

fn default_admin_addr() -> SocketAddr {
    "127.0.0.1:8081".parse().unwrap()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

fn default_database_url() -> String {
    "sqlite://./data/curator.sqlite3".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    30_000
}

fn default_pool_size() -> u32 {
    5
}

fn default_admin_username() -> String {
    "admin".to_string()
}

fn default_jwt_ttl_s() -> i64 {
    3600
}

fn default_imgproxy_max_dim() -> u32 {
    2048
}

fn default_imgproxy_chunk_size() -> usize {
    16
}

fn default_heartbeat_stale_s() -> u64 {
    60
}

fn default_poll_interval_ms() -> u64 {
    500
}

fn default_lock_ttl_s() -> i64 {
    300
}

fn default_claim_batch() -> usize {
    1
}

fn default_rpm() -> u32 {
    60
}

fn default_burst() -> u32 {
    10
}

fn default_attempts() -> u32 {
    1
}

fn default_fail_cooldown_ms() -> i64 {
    60_000
}

fn default_strategy() -> String {
    "ascending".to_string()
}

fn default_quality_samples() -> u32 {
    8
}

fn default_metrics_path() -> String {
    "/metrics".to_string()
}

fn default_true() -> bool {
    true
}

/// `WORKER_HEARTBEAT_STALE_SECONDS`, clamp [1, 86400].
pub fn clamp_worker_heartbeat_stale_seconds(s: u64) -> u64 {
    s.clamp(1, 86_400)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.public_addr.port(), 8080);
        assert_eq!(cfg.server.admin_addr.port(), 8081);
        assert!(cfg.is_dev());
        assert_eq!(cfg.admin.username, "admin");
    }

    #[test]
    fn imgproxy_default_options_use_clamped_max_dim() {
        let mut cfg = ImgproxyConfig::default();
        cfg.max_dim = 999_999;
        assert_eq!(cfg.clamped_max_dim(), 20_000);
        assert_eq!(cfg.effective_default_options(), "rs:fit:20000:20000");
    }

    #[test]
    fn heartbeat_stale_clamp() {
        assert_eq!(clamp_worker_heartbeat_stale_seconds(0), 1);
        assert_eq!(clamp_worker_heartbeat_stale_seconds(999_999), 86_400);
        assert_eq!(clamp_worker_heartbeat_stale_seconds(90), 90);
    }

    #[test]
    fn pixiv_oauth_configured_requires_both_fields() {
        let mut cfg = PixivOauthConfig::default();
        assert!(!cfg.is_configured());
        cfg.client_id = Some("abc".into());
        assert!(!cfg.is_configured());
        cfg.client_secret = Some("def".into());
        assert!(cfg.is_configured());
    }
}
