//! Outbound HTTP client factory, grounded on
//! `ando-proxy::health_check`'s `reqwest::Client::builder()` pattern, with
//! the fixed headers `original_source/backend/app/core/http_stream.py`
//! and `app/pixiv/oauth.py` attach to every outbound request.

use std::time::Duration;

pub const PIXIV_REFERER: &str = "https://www.pixiv.net/";
const DEFAULT_USER_AGENT: &str = "PixivAndroidApp/5.0.234 (Android 11; Curator)";

/// Builds a `reqwest::Client` bound to an optional forward-proxy URI,
/// with connect/overall timeouts matching the streaming fetcher's
/// defaults (10s connect, 30s overall unless overridden).
pub fn build_client(proxy_uri: Option<&str>, timeout_s: u64) -> reqwest::Result<reqwest::Client> {
    let mut builder = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_s))
        .connect_timeout(Duration::from_secs(10))
        .redirect(reqwest::redirect::Policy::limited(5))
        .user_agent(DEFAULT_USER_AGENT);

    if let Some(uri) = proxy_uri {
        builder = builder.proxy(reqwest::Proxy::all(uri)?);
    }

    builder.build()
}

/// Headers attached to every pixiv-app-API call: `X-Client-Time` plus an
/// optional `X-Client-Hash = md5(client_time + hash_secret)`, per
/// `original_source/backend/app/pixiv/oauth.py::build_headers`.
pub fn oauth_client_hash_headers(client_time_iso: &str, hash_secret: Option<&str>) -> Vec<(&'static str, String)> {
    use md5::{Digest, Md5};

    let mut headers = vec![("X-Client-Time", client_time_iso.to_string())];
    if let Some(secret) = hash_secret {
        let mut hasher = Md5::new();
        hasher.update(client_time_iso.as_bytes());
        hasher.update(secret.as_bytes());
        let digest = hasher.finalize();
        headers.push(("X-Client-Hash", hex_encode(&digest)));
    }
    headers
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").unwrap();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_client_without_proxy_succeeds() {
        assert!(build_client(None, 30).is_ok());
    }

    #[test]
    fn build_client_with_proxy_uri_succeeds() {
        assert!(build_client(Some("http://127.0.0.1:8080"), 30).is_ok());
    }

    #[test]
    fn oauth_headers_omit_hash_when_secret_absent() {
        let headers = oauth_client_hash_headers("2026-01-01T00:00:00+00:00", None);
        assert_eq!(headers.len(), 1);
    }

    #[test]
    fn oauth_hash_header_is_deterministic_md5() {
        let headers = oauth_client_hash_headers("2026-01-01T00:00:00+00:00", Some("secret"));
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[1].0, "X-Client-Hash");
        assert_eq!(headers[1].1.len(), 32);
    }
}
