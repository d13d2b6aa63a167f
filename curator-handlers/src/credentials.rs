//! Shared credential+proxy+client acquisition for handlers that call the
//! upstream app API (`hydrate_metadata`, `heal_url`). Composes §4.D
//! selection, §4.E the token cache, and §4.C the client factory the same
//! way the public `/random` path does for the streaming fetch.

use async_trait::async_trait;
use curator_core::domain::PixivToken;
use curator_store::proxy_uri::format_proxy_uri;
use curator_store::{tokens::TokensRepo, Vault};
use curator_upstream::select::{choose_token_now, SelectStrategy};
use curator_upstream::token_cache::{AccessTokenCache, OauthToken, TokenRefresher};
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    #[error("no oauth credential available: {0}")]
    NoToken(#[from] curator_upstream::select::SelectError),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Refresh(#[from] anyhow::Error),
}

/// Refreshes an OAuth access token by decrypting the credential's stored
/// refresh token and issuing the grant request. Grounded on
/// `original_source/backend/app/pixiv/access_token_cache.py`'s injected
/// `refresh` callable, generalized to the `TokenRefresher` trait.
pub struct OauthRefresher {
    pool: SqlitePool,
    vault: Arc<Vault>,
    oauth_client_id: String,
    oauth_client_secret: String,
    hash_secret: Option<String>,
}

impl OauthRefresher {
    pub fn new(pool: SqlitePool, vault: Arc<Vault>, oauth_client_id: String, oauth_client_secret: String, hash_secret: Option<String>) -> Self {
        Self { pool, vault, oauth_client_id, oauth_client_secret, hash_secret }
    }
}

#[async_trait]
impl TokenRefresher for OauthRefresher {
    async fn refresh(&self, token_id: i64) -> anyhow::Result<OauthToken> {
        let tokens = TokensRepo::new(&self.pool);
        let token = tokens
            .get(token_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("credential {token_id} not found"))?;
        let refresh_token = self.vault.decrypt(&token.refresh_token_enc)?;

        let client = curator_upstream::client::build_client(None, 30)?;
        let now_iso = curator_core::time::now_iso_millis();
        let mut headers = curator_upstream::client::oauth_client_hash_headers(&now_iso, self.hash_secret.as_deref());
        headers.push(("X-Client-Time", now_iso.clone()));

        let mut request = client
            .post("https://oauth.secure.pixiv.net/auth/token")
            .form(&[
                ("client_id", self.oauth_client_id.as_str()),
                ("client_secret", self.oauth_client_secret.as_str()),
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ]);
        for (name, value) in headers {
            request = request.header(name, value);
        }

        let response = request.send().await?;
        if !response.status().is_success() {
            anyhow::bail!("oauth refresh failed with status {}", response.status());
        }
        #[derive(serde::Deserialize)]
        struct TokenResponse {
            access_token: String,
            expires_in: f64,
        }
        let body: TokenResponse = response.json().await?;
        Ok(OauthToken { access_token: body.access_token, expires_in_s: body.expires_in })
    }
}

pub struct AcquiredCredential {
    pub token_id: i64,
    pub access_token: String,
    pub proxy_uri: Option<String>,
}

/// Choose an eligible credential (round-robin by default), resolve its
/// access token through the single-flight cache, and resolve the proxy
/// URI bound to it from the first enabled proxy pool, if any.
pub async fn acquire_credential(
    pool: &SqlitePool,
    vault: &Vault,
    cache: &AccessTokenCache,
    refresher: &dyn TokenRefresher,
    strategy: SelectStrategy,
) -> Result<AcquiredCredential, CredentialError> {
    let tokens_repo = TokensRepo::new(pool);
    let tokens: Vec<PixivToken> = tokens_repo.list_enabled().await?;
    let (token, token_id) = choose_token_now(&tokens, strategy, None, 0.0)?;
    let access_token = cache.get_or_refresh(token_id, refresher).await?;

    let proxies = curator_store::proxies::ProxiesRepo::new(pool);
    let proxy_uri = if let Some(pool_row) = proxies.get_pool_by_name("default").await? {
        if let Some(binding) = proxies.get_binding(token_id, pool_row.id).await? {
            let now = curator_core::time::now_iso_millis();
            let effective_id = match (binding.override_proxy_id, &binding.override_expires_at) {
                (Some(override_id), Some(expires_at)) if expires_at.as_str() > now.as_str() => override_id,
                _ => binding.primary_proxy_id,
            };
            let endpoint = proxies.get(effective_id).await?.filter(|endpoint| {
                let not_blacklisted = match &endpoint.blacklisted_until {
                    Some(until) => until.as_str() <= now.as_str(),
                    None => true,
                };
                endpoint.enabled && not_blacklisted
            });
            if let Some(endpoint) = endpoint {
                let password = match &endpoint.password_enc {
                    Some(enc) => Some(vault.decrypt(enc).map_err(anyhow::Error::from)?),
                    None => None,
                };
                Some(format_proxy_uri(&endpoint.scheme, &endpoint.host, endpoint.port, endpoint.username.as_deref(), password.as_deref()))
            } else {
                None
            }
        } else {
            None
        }
    } else {
        None
    };

    let _ = token;
    Ok(AcquiredCredential { token_id, access_token, proxy_uri })
}
