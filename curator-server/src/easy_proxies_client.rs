//! Concrete `EasyProxiesClient`, a direct port of
//! `original_source/backend/app/easy_proxies/client.py`: authenticate
//! with a shared password to get a bearer token, then export the
//! current proxy list as newline-separated URIs.

use async_trait::async_trait;
use curator_handlers::easy_proxies::{EasyProxiesClient, EasyProxiesError};
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct AuthResponse {
    token: String,
}

pub struct HttpEasyProxiesClient {
    client: Client,
    password: String,
}

impl HttpEasyProxiesClient {
    pub fn new(client: Client, password: String) -> Self {
        Self { client, password }
    }
}

#[async_trait]
impl EasyProxiesClient for HttpEasyProxiesClient {
    async fn fetch_proxy_uris(&self, base_url: &str) -> Result<Vec<String>, EasyProxiesError> {
        let base_url = base_url.trim_end_matches('/');

        let auth_response = self
            .client
            .post(format!("{base_url}/api/auth"))
            .json(&serde_json::json!({ "password": self.password }))
            .send()
            .await
            .map_err(|e| EasyProxiesError::RequestFailed(e.to_string()))?;
        if !auth_response.status().is_success() {
            return Err(EasyProxiesError::RequestFailed(format!("auth status {}", auth_response.status())));
        }
        let auth_body: AuthResponse = auth_response
            .json()
            .await
            .map_err(|e| EasyProxiesError::RequestFailed(e.to_string()))?;

        let export_response = self
            .client
            .get(format!("{base_url}/api/export"))
            .header("Authorization", format!("Bearer {}", auth_body.token))
            .send()
            .await
            .map_err(|e| EasyProxiesError::RequestFailed(e.to_string()))?;
        if !export_response.status().is_success() {
            return Err(EasyProxiesError::RequestFailed(format!("export status {}", export_response.status())));
        }
        let text = export_response
            .text()
            .await
            .map_err(|e| EasyProxiesError::RequestFailed(e.to_string()))?;

        Ok(text.lines().map(str::trim).filter(|line| !line.is_empty()).map(str::to_string).collect())
    }
}
