//! Streaming reverse-proxy fetcher. Port of
//! `original_source/backend/app/core/http_stream.py::stream_url`, using
//! `reqwest`'s streaming body the way `ando-proxy` streams upstream bytes.

use bytes::Bytes;
use curator_core::error::{AppError, ErrorCode};
use futures_core::Stream;
use std::pin::Pin;

pub struct StreamedResponse {
    pub status: u16,
    pub content_type: String,
    pub content_length: Option<u64>,
    pub accept_ranges: Option<String>,
    pub content_range: Option<String>,
    pub body: Pin<Box<dyn Stream<Item = reqwest::Result<Bytes>> + Send>>,
}

pub struct FetchOptions<'a> {
    pub referer: &'a str,
    pub range_header: Option<&'a str>,
}

impl Default for FetchOptions<'_> {
    fn default() -> Self {
        Self { referer: crate::client::PIXIV_REFERER, range_header: None }
    }
}

/// Issues a GET against `url` through `client` and returns a streaming
/// body on success, or an `AppError` with the stable codes the public
/// surface maps to a 502 (§7): `PROXY_AUTH_FAILED`, `PROXY_CONNECT_FAILED`,
/// `UPSTREAM_403`, `UPSTREAM_404`, `UPSTREAM_RATE_LIMIT`,
/// `UPSTREAM_STREAM_ERROR`.
pub async fn stream_url(client: &reqwest::Client, url: &str, opts: FetchOptions<'_>) -> Result<StreamedResponse, AppError> {
    let mut request = client.get(url).header("Referer", opts.referer);
    if let Some(range) = opts.range_header {
        request = request.header("Range", range);
    }

    let upstream = request.send().await.map_err(classify_send_error)?;

    let status = upstream.status().as_u16();
    if status != 200 && status != 206 {
        return Err(classify_status_error(status));
    }

    let content_type = upstream
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream")
        .to_string();
    let content_length = upstream.content_length();
    let accept_ranges = header_str(&upstream, "accept-ranges");
    let content_range = header_str(&upstream, "content-range");

    Ok(StreamedResponse {
        status,
        content_type,
        content_length,
        accept_ranges,
        content_range,
        body: Box::pin(upstream.bytes_stream()),
    })
}

fn header_str(resp: &reqwest::Response, name: &str) -> Option<String> {
    resp.headers().get(name).and_then(|v| v.to_str().ok()).map(str::to_string)
}

fn classify_send_error(err: reqwest::Error) -> AppError {
    if err.is_connect() {
        let message = err.to_string();
        let lower = message.to_ascii_lowercase();
        let code = if lower.contains("407") || lower.contains("proxy authentication") {
            ErrorCode::ProxyAuthFailed
        } else {
            ErrorCode::ProxyConnectFailed
        };
        return AppError::new(code, code.default_message()).and_status(502);
    }
    AppError::new(ErrorCode::UpstreamStreamError, ErrorCode::UpstreamStreamError.default_message()).and_status(502)
}

fn classify_status_error(status: u16) -> AppError {
    let code = match status {
        403 => ErrorCode::Upstream403,
        404 => ErrorCode::Upstream404,
        429 => ErrorCode::UpstreamRateLimit,
        _ => ErrorCode::UpstreamStreamError,
    };
    AppError::new(code, code.default_message()).and_status(502)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn successful_stream_carries_content_type_and_length() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/img.jpg"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"hello".to_vec()).insert_header("content-type", "image/jpeg"))
            .mount(&server)
            .await;

        let client = reqwest::Client::new();
        let resp = stream_url(&client, &format!("{}/img.jpg", server.uri()), FetchOptions::default()).await.unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.content_type, "image/jpeg");
    }

    #[tokio::test]
    async fn upstream_404_maps_to_stable_error_code_with_502_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/gone.jpg")).respond_with(ResponseTemplate::new(404)).mount(&server).await;

        let client = reqwest::Client::new();
        let err = stream_url(&client, &format!("{}/gone.jpg", server.uri()), FetchOptions::default()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::Upstream404);
        assert_eq!(err.status_code(), 502);
    }

    #[tokio::test]
    async fn upstream_429_maps_to_upstream_rate_limit() {
        let server = MockServer::start().await;
        Mock::given(method("GET")).and(path("/limited.jpg")).respond_with(ResponseTemplate::new(429)).mount(&server).await;

        let client = reqwest::Client::new();
        let err = stream_url(&client, &format!("{}/limited.jpg", server.uri()), FetchOptions::default()).await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpstreamRateLimit);
    }
}
