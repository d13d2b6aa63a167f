//! Public API-key gate: `X-API-Key` header, looked up as
//! `HMAC-SHA-256(secret_key, api_key)` against `api_keys.key_hash`
//! (mirrors how `pixiv_tokens`/`proxy_endpoints` secrets are hashed
//! rather than stored raw), with a short in-process lookup cache and a
//! per-key token bucket so the database isn't hit on every request.

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::Response;
use curator_core::domain::ApiKey;
use curator_core::error::{AppError, ErrorCode};
use curator_store::api_keys::ApiKeysRepo;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";
const LOOKUP_CACHE_TTL: Duration = Duration::from_secs(5);

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        write!(out, "{b:02x}").unwrap();
    }
    out
}

struct CachedLookup {
    key: Option<ApiKey>,
    cached_at: Instant,
}

pub struct ApiKeyGate {
    secret_key: String,
    cache: Mutex<HashMap<String, CachedLookup>>,
    buckets: Mutex<HashMap<String, TokenBucket>>,
}

struct TokenBucket {
    tokens: f64,
    capacity: f64,
    refill_per_s: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(rpm: u32, burst: u32) -> Self {
        let capacity = burst.max(1) as f64;
        Self {
            tokens: capacity,
            capacity,
            refill_per_s: (rpm.max(1) as f64) / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn try_take(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.last_refill = now;
        self.tokens = (self.tokens + elapsed * self.refill_per_s).min(self.capacity);
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

impl ApiKeyGate {
    pub fn new(secret_key: String) -> Self {
        Self {
            secret_key,
            cache: Mutex::new(HashMap::new()),
            buckets: Mutex::new(HashMap::new()),
        }
    }

    fn hash(&self, api_key: &str) -> String {
        let mut mac = Hmac::<Sha256>::new_from_slice(self.secret_key.as_bytes())
            .expect("hmac accepts any key length");
        mac.update(api_key.as_bytes());
        hex_encode(&mac.finalize().into_bytes())
    }

    async fn lookup(&self, pool: &sqlx::SqlitePool, api_key: &str) -> Option<ApiKey> {
        let key_hash = self.hash(api_key);

        if let Some(cached) = self.cache.lock().unwrap().get(&key_hash) {
            if cached.cached_at.elapsed() < LOOKUP_CACHE_TTL {
                return cached.key.clone();
            }
        }

        let repo = ApiKeysRepo::new(pool);
        let found = repo.find_by_hash(&key_hash).await.ok().flatten();
        self.cache.lock().unwrap().insert(
            key_hash,
            CachedLookup {
                key: found.clone(),
                cached_at: Instant::now(),
            },
        );
        found
    }

    fn check_rate_limit(&self, key_id: &str, rpm: u32, burst: u32) -> bool {
        let mut buckets = self.buckets.lock().unwrap();
        buckets
            .entry(key_id.to_string())
            .or_insert_with(|| TokenBucket::new(rpm, burst))
            .try_take()
    }
}

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, StatusCode> {
    if !state.config.public_api_key.required {
        return Ok(next.run(request).await);
    }

    let api_key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    let Some(api_key) = api_key.filter(|k| !k.trim().is_empty()) else {
        let err = AppError::new(ErrorCode::Unauthorized, "missing api key");
        return Err(err.status_code().try_into().unwrap_or(StatusCode::UNAUTHORIZED));
    };

    let Some(found) = state.api_key_gate.lookup(&state.pool, &api_key).await else {
        let err = AppError::new(ErrorCode::Unauthorized, "invalid api key");
        return Err(err.status_code().try_into().unwrap_or(StatusCode::UNAUTHORIZED));
    };

    let rpm = found.rpm.unwrap_or(state.config.public_api_key.rpm as i64).max(1) as u32;
    let burst = found.burst.unwrap_or(state.config.public_api_key.burst as i64).max(1) as u32;

    if !state.api_key_gate.check_rate_limit(&found.id, rpm, burst) {
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(request).await)
}
