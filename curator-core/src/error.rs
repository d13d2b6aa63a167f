use serde::Serialize;
use thiserror::Error;

/// Closed error-code catalogue shared by every HTTP surface.
///
/// Values are the wire strings emitted in `AppError::to_json_body`'s
/// `code` field; never reorder or rename once shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    BadRequest,
    Unauthorized,
    Forbidden,
    NotFound,
    RateLimited,
    InternalError,
    NoMatch,
    UpstreamStreamError,
    Upstream403,
    Upstream404,
    UpstreamRateLimit,
    InvalidUploadType,
    PayloadTooLarge,
    UnsupportedUrl,
    TokenRefreshFailed,
    TokenBackoff,
    NoTokenAvailable,
    ProxyRequired,
    ProxyAuthFailed,
    ProxyConnectFailed,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "BAD_REQUEST",
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::NotFound => "NOT_FOUND",
            ErrorCode::RateLimited => "RATE_LIMITED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
            ErrorCode::NoMatch => "NO_MATCH",
            ErrorCode::UpstreamStreamError => "UPSTREAM_STREAM_ERROR",
            ErrorCode::Upstream403 => "UPSTREAM_403",
            ErrorCode::Upstream404 => "UPSTREAM_404",
            ErrorCode::UpstreamRateLimit => "UPSTREAM_RATE_LIMIT",
            ErrorCode::InvalidUploadType => "INVALID_UPLOAD_TYPE",
            ErrorCode::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            ErrorCode::UnsupportedUrl => "UNSUPPORTED_URL",
            ErrorCode::TokenRefreshFailed => "TOKEN_REFRESH_FAILED",
            ErrorCode::TokenBackoff => "TOKEN_BACKOFF",
            ErrorCode::NoTokenAvailable => "NO_TOKEN_AVAILABLE",
            ErrorCode::ProxyRequired => "PROXY_REQUIRED",
            ErrorCode::ProxyAuthFailed => "PROXY_AUTH_FAILED",
            ErrorCode::ProxyConnectFailed => "PROXY_CONNECT_FAILED",
        }
    }

    /// Default HTTP status for a bare error code with no finer-grained override.
    pub fn default_status(&self) -> u16 {
        match self {
            ErrorCode::BadRequest => 400,
            ErrorCode::Unauthorized => 401,
            ErrorCode::Forbidden => 403,
            ErrorCode::NotFound => 404,
            ErrorCode::RateLimited => 429,
            ErrorCode::InternalError => 500,
            ErrorCode::NoMatch => 404,
            ErrorCode::UpstreamStreamError => 502,
            ErrorCode::Upstream403 => 502,
            ErrorCode::Upstream404 => 502,
            ErrorCode::UpstreamRateLimit => 502,
            ErrorCode::InvalidUploadType => 400,
            ErrorCode::PayloadTooLarge => 413,
            ErrorCode::UnsupportedUrl => 400,
            ErrorCode::TokenRefreshFailed => 502,
            ErrorCode::TokenBackoff => 503,
            ErrorCode::NoTokenAvailable => 503,
            ErrorCode::ProxyRequired => 400,
            ErrorCode::ProxyAuthFailed => 502,
            ErrorCode::ProxyConnectFailed => 502,
        }
    }

    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::BadRequest => "请求参数错误",
            ErrorCode::Unauthorized => "未授权",
            ErrorCode::Forbidden => "禁止访问",
            ErrorCode::NotFound => "资源不存在",
            ErrorCode::RateLimited => "请求过于频繁",
            ErrorCode::InternalError => "服务器内部错误",
            ErrorCode::NoMatch => "没有匹配的图片",
            ErrorCode::UpstreamStreamError => "上游请求失败",
            ErrorCode::Upstream403 => "上游拒绝访问（403）",
            ErrorCode::Upstream404 => "上游资源不存在（404）",
            ErrorCode::UpstreamRateLimit => "上游触发限流（429）",
            ErrorCode::InvalidUploadType => "上传类型不支持",
            ErrorCode::PayloadTooLarge => "请求体过大",
            ErrorCode::UnsupportedUrl => "链接格式不支持",
            ErrorCode::TokenRefreshFailed => "令牌刷新失败",
            ErrorCode::TokenBackoff => "令牌已进入退避",
            ErrorCode::NoTokenAvailable => "没有可用令牌",
            ErrorCode::ProxyRequired => "需要代理",
            ErrorCode::ProxyAuthFailed => "代理认证失败",
            ErrorCode::ProxyConnectFailed => "代理连接失败",
        }
    }
}

fn is_ascii_only(text: &str) -> bool {
    text.is_ascii()
}

/// Map a known ASCII phrase to its localized counterpart, or fall back to the
/// code's default. Mirrors the original system's ad-hoc-message table so the
/// handful of hand-written `anyhow!("...")` strings scattered through the
/// handlers still surface a sensible zh-CN message.
pub fn normalize_error_message(code: ErrorCode, message: &str) -> String {
    let msg = message.trim();
    if msg.is_empty() {
        return code.default_message().to_string();
    }
    if !is_ascii_only(msg) {
        return msg.to_string();
    }
    let key = msg.to_lowercase();
    if let Some(mapped) = ascii_message_map(&key) {
        return mapped.to_string();
    }
    if let Some(rest) = key.strip_prefix("unsupported ") {
        let rest = rest.trim();
        return if rest.is_empty() {
            code.default_message().to_string()
        } else {
            format!("参数不支持：{rest}")
        };
    }
    if let Some(rest) = key.strip_prefix("invalid ") {
        let rest = rest.trim();
        return if rest.is_empty() {
            code.default_message().to_string()
        } else {
            format!("参数无效：{rest}")
        };
    }
    if let Some(rest) = key.strip_prefix("missing ") {
        let rest = rest.trim();
        return if rest.is_empty() {
            code.default_message().to_string()
        } else {
            format!("缺少字段：{rest}")
        };
    }
    code.default_message().to_string()
}

fn ascii_message_map(key: &str) -> Option<&'static str> {
    Some(match key {
        "missing api key" => "缺少 API Key",
        "invalid api key" => "API Key 无效",
        "rate limited" => "请求过于频繁",
        "database unavailable" => "数据库不可用",
        "invalid json body" => "JSON 请求体无效",
        "pixiv oauth not configured" => "未配置 Pixiv OAuth（client_id/client_secret）",
        "encryption not configured" => "未配置加密密钥（FIELD_ENCRYPTION_KEY）",
        "invalid stored token" => "令牌密文无效（无法解密）",
        "token not found" => "令牌不存在",
        "job not found" => "任务不存在",
        "proxy endpoint not found" => "代理节点不存在",
        "proxy pool not found" => "代理池不存在",
        "job is running" => "任务正在运行中",
        "proxy authentication failed" => "代理认证失败",
        "proxy connect failed" => "代理连接失败",
        "upstream request failed" => "上游请求失败",
        "upstream forbidden" => "上游拒绝访问（403）",
        "upstream not found" => "上游资源不存在（404）",
        "upstream rate limited" => "上游触发限流（429）",
        "upstream error" => "上游错误",
        "invalid proxy endpoint" => "代理节点配置无效",
        "unsupported conflict_policy" => "conflict_policy 参数不支持",
        _ => return None,
    })
}

/// Unified error type for Curator.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("{message}")]
    Api {
        code: ErrorCode,
        message: String,
        status: Option<u16>,
        details: serde_json::Value,
    },

    #[error("store error: {0}")]
    Store(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("internal: {0}")]
    Internal(String),
}

impl AppError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        AppError::Api {
            code,
            message: message.into(),
            status: None,
            details: serde_json::json!({}),
        }
    }

    pub fn with_status(code: ErrorCode, message: impl Into<String>, status: u16) -> Self {
        AppError::Api {
            code,
            message: message.into(),
            status: Some(status),
            details: serde_json::json!({}),
        }
    }

    pub fn with_details(
        code: ErrorCode,
        message: impl Into<String>,
        details: serde_json::Value,
    ) -> Self {
        AppError::Api {
            code,
            message: message.into(),
            status: None,
            details,
        }
    }

    /// Overrides the HTTP status on an already-constructed `Api` error;
    /// no-op on the other variants, which always map to 500.
    pub fn and_status(mut self, new_status: u16) -> Self {
        if let AppError::Api { status, .. } = &mut self {
            *status = Some(new_status);
        }
        self
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Api { code, .. } => *code,
            AppError::Store(_) | AppError::Io(_) | AppError::Serde(_) | AppError::Internal(_) => {
                ErrorCode::InternalError
            }
        }
    }

    pub fn status_code(&self) -> u16 {
        match self {
            AppError::Api { code, status, .. } => status.unwrap_or_else(|| code.default_status()),
            _ => 500,
        }
    }

    /// JSON error body: `{ok:false, code, message, request_id, details}`.
    pub fn to_json_body(&self, request_id: &str) -> serde_json::Value {
        let code = self.code();
        let message = match self {
            AppError::Api { message, .. } => normalize_error_message(code, message),
            other => normalize_error_message(code, &other.to_string()),
        };
        let details = match self {
            AppError::Api { details, .. } => details.clone(),
            _ => serde_json::json!({}),
        };
        serde_json::json!({
            "ok": false,
            "code": code.as_str(),
            "message": message,
            "request_id": request_id,
            "details": details,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_match_table() {
        assert_eq!(ErrorCode::NotFound.default_status(), 404);
        assert_eq!(ErrorCode::UpstreamRateLimit.default_status(), 502);
        assert_eq!(ErrorCode::RateLimited.default_status(), 429);
        assert_eq!(ErrorCode::NoTokenAvailable.default_status(), 503);
    }

    #[test]
    fn json_body_is_valid_and_carries_request_id() {
        let err = AppError::new(ErrorCode::NoMatch, "no eligible image");
        let body = err.to_json_body("req_abc0123456789f");
        assert_eq!(body["ok"], false);
        assert_eq!(body["code"], "NO_MATCH");
        assert_eq!(body["request_id"], "req_abc0123456789f");
    }

    #[test]
    fn ascii_message_is_localized() {
        let msg = normalize_error_message(ErrorCode::BadRequest, "unsupported limit");
        assert_eq!(msg, "参数不支持：limit");
    }

    #[test]
    fn unknown_ascii_message_falls_back_to_default() {
        let msg = normalize_error_message(ErrorCode::InternalError, "something exploded");
        assert_eq!(msg, "服务器内部错误");
    }

    #[test]
    fn non_ascii_message_passes_through() {
        let msg = normalize_error_message(ErrorCode::BadRequest, "标签筛选条件过多");
        assert_eq!(msg, "标签筛选条件过多");
    }

    #[test]
    fn empty_message_uses_default() {
        let msg = normalize_error_message(ErrorCode::Forbidden, "  ");
        assert_eq!(msg, "禁止访问");
    }
}
