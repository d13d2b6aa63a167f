//! `GET /random`: the core of the public surface. Picks an eligible
//! image (§4.H via `curator_select`), then either serializes it as JSON,
//! redirects to its proxy path, or streams its bytes through the
//! upstream fetcher with retry-on-failure and opportunistic healing,
//! the same shape `original_source/backend/app/api/random.py` drives but
//! rebuilt on top of the queue/select/upstream crates instead of one
//! monolithic view function.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Extension;
use curator_core::domain::Image;
use curator_core::error::{AppError, ErrorCode};
use curator_select::engine::{select_image, SelectConfig, Strategy};
use curator_select::filter::RandomFilter;
use curator_select::pick::seed_to_r_key;
use curator_store::images::ImagesRepo;
use curator_store::jobs::JobsRepo;
use curator_store::settings::SettingsRepo;
use curator_store::tags::TagsRepo;
use curator_upstream::fetch::{stream_url, FetchOptions};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::imgproxy::build_signed_url;
use crate::middleware::access_log::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize, Default)]
pub struct RandomQuery {
    pub r18: Option<String>,
    pub r18_strict: Option<String>,
    pub orientation: Option<i64>,
    pub ai_type: Option<i64>,
    pub illust_type: Option<String>,
    pub min_width: Option<i64>,
    pub min_height: Option<i64>,
    pub min_pixels: Option<i64>,
    pub min_bookmarks: Option<i64>,
    pub min_views: Option<i64>,
    pub min_comments: Option<i64>,
    pub included_tags: Option<String>,
    pub excluded_tags: Option<String>,
    pub user_id: Option<i64>,
    pub illust_id: Option<i64>,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
    pub fail_cooldown_ms: Option<i64>,
    pub strategy: Option<String>,
    pub quality_samples: Option<u32>,
    pub format: Option<String>,
    pub redirect: Option<u8>,
    pub seed: Option<String>,
    pub attempts: Option<u32>,
}

struct EffectiveDefaults {
    attempts: u32,
    r18_strict: bool,
    fail_cooldown_ms: i64,
    strategy: Strategy,
    quality_samples: usize,
    strategy_source: &'static str,
}

fn parse_illust_type(raw: &str) -> Option<i64> {
    match raw {
        "illust" => Some(0),
        "manga" => Some(1),
        "ugoira" => Some(2),
        other => other.parse().ok(),
    }
}

async fn setting_i64(settings: &SettingsRepo<'_>, key: &str) -> Option<i64> {
    let row = settings.get(key).await.ok().flatten()?;
    serde_json::from_str(&row.value_json).ok()
}

async fn setting_str(settings: &SettingsRepo<'_>, key: &str) -> Option<String> {
    let row = settings.get(key).await.ok().flatten()?;
    serde_json::from_str(&row.value_json).ok()
}

async fn setting_bool(settings: &SettingsRepo<'_>, key: &str) -> Option<bool> {
    let row = settings.get(key).await.ok().flatten()?;
    serde_json::from_str(&row.value_json).ok()
}

/// Resolves `attempts, r18_strict, fail_cooldown_ms, strategy,
/// quality_samples` from query overrides first, then runtime settings
/// merged over the static config default, per §4.J.
async fn resolve_defaults(state: &AppState, query: &RandomQuery) -> EffectiveDefaults {
    let settings = SettingsRepo::new(&state.pool);
    let cfg = &state.config.random;

    let attempts = match query.attempts {
        Some(v) if v >= 1 => v,
        _ => setting_i64(&settings, "random.attempts").await.map(|v| v.max(1) as u32).unwrap_or(cfg.attempts),
    };

    let r18_strict = match &query.r18_strict {
        Some(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        None => setting_bool(&settings, "random.r18_strict").await.unwrap_or(cfg.r18_strict),
    };

    let fail_cooldown_ms = match query.fail_cooldown_ms {
        Some(v) => v,
        None => setting_i64(&settings, "random.fail_cooldown_ms").await.unwrap_or(cfg.fail_cooldown_ms),
    };

    let quality_samples = match query.quality_samples {
        Some(v) => v.max(1) as usize,
        None => setting_i64(&settings, "random.quality_samples")
            .await
            .map(|v| v.max(1) as usize)
            .unwrap_or(cfg.quality_samples as usize),
    };

    let (strategy_raw, strategy_source) = match &query.strategy {
        Some(v) => (v.clone(), "query"),
        None => match setting_str(&settings, "random.strategy").await {
            Some(v) => (v, "runtime"),
            None => (cfg.strategy.clone(), "runtime"),
        },
    };
    let strategy = match strategy_raw.as_str() {
        "quality" => Strategy::Quality,
        _ => Strategy::Default,
    };

    EffectiveDefaults { attempts, r18_strict, fail_cooldown_ms, strategy, quality_samples, strategy_source }
}

fn build_filter(query: &RandomQuery, defaults: &EffectiveDefaults) -> RandomFilter {
    let r18 = query.r18.as_deref().and_then(|v| v.parse::<u8>().ok());
    let included_tags = query
        .included_tags
        .as_deref()
        .map(|s| s.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();
    let excluded_tags = query
        .excluded_tags
        .as_deref()
        .map(|s| s.split(',').map(str::trim).filter(|t| !t.is_empty()).map(str::to_string).collect())
        .unwrap_or_default();

    RandomFilter {
        r18,
        r18_strict: defaults.r18_strict,
        orientation: query.orientation,
        ai_type: query.ai_type,
        illust_type: query.illust_type.as_deref().and_then(parse_illust_type),
        min_width: query.min_width,
        min_height: query.min_height,
        min_pixels: query.min_pixels,
        min_bookmarks: query.min_bookmarks,
        min_views: query.min_views,
        min_comments: query.min_comments,
        included_tags,
        excluded_tags,
        user_id: query.user_id,
        illust_id: query.illust_id,
        created_from: query.created_from.clone(),
        created_to: query.created_to.clone(),
        fail_cooldown_ms: Some(defaults.fail_cooldown_ms),
    }
}

fn request_id_of(ext: &Option<Extension<RequestId>>) -> String {
    ext.as_ref().map(|Extension(id)| id.0.clone()).unwrap_or_else(curator_core::ids::new_request_id)
}

/// Derives the absolute, proxy-served URL for an image's legacy path so
/// imgproxy can sign over *our* URL rather than the pixiv origin.
fn proxy_served_url(headers: &HeaderMap, image: &Image) -> String {
    let scheme = headers
        .get("x-forwarded-proto")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("http");
    let host = headers
        .get("x-forwarded-host")
        .or_else(|| headers.get(axum::http::header::HOST))
        .and_then(|v| v.to_str().ok())
        .unwrap_or("localhost");
    format!("{scheme}://{host}{}", image.proxy_path)
}

pub async fn random_handler(
    State(state): State<AppState>,
    Query(query): Query<RandomQuery>,
    headers: HeaderMap,
    request_id: Option<Extension<RequestId>>,
) -> Result<Response, ApiError> {
    let request_id = request_id_of(&request_id);
    let guard = state.stats.on_begin();
    let started = std::time::Instant::now();

    let defaults = resolve_defaults(&state, &query).await;
    let filter = build_filter(&query, &defaults);
    let format = query.format.as_deref().unwrap_or("binary");
    let redirect = query.redirect.unwrap_or(0) == 1;
    let oauth_configured = state.config.pixiv_oauth.is_configured();

    // Query/runtime overrides change the picking strategy itself, not
    // just the debug block, so the config actually driving `select_image`
    // has to be rebuilt per request rather than reused from `state`.
    let select_config = SelectConfig {
        strategy: defaults.strategy,
        quality_samples: defaults.quality_samples,
        quality_mode: state.select_config.quality_mode,
        quality_weights: state.select_config.quality_weights.clone(),
    };

    let mut attempt = 0u32;
    let mut last_err: Option<AppError> = None;

    loop {
        attempt += 1;
        let r = match &query.seed {
            Some(seed) => seed_to_r_key(seed),
            None => rand::random::<f64>(),
        };

        let picked = select_image(&state.pool, &filter, &select_config, r, state.dedup.as_deref())
            .await
            .map_err(|e| AppError::Store(e.to_string()))?;

        let Some(image) = picked else {
            guard.finish(404);
            state.metrics.record_random_request("no_match", started.elapsed().as_secs_f64());
            let err = AppError::new(
                ErrorCode::NoMatch,
                "没有找到符合条件的图片",
            )
            .with_details_no_match(&filter);
            return Err(ApiError::with_request_id(err, request_id));
        };

        if format == "json" || format == "simple_json" {
            if !image.has_complete_metadata() {
                maybe_enqueue_hydrate(&state, &image, oauth_configured).await;
            }
            guard.finish(200);
            state.metrics.record_random_request("ok", started.elapsed().as_secs_f64());
            let body = serialize_image(&state, &headers, &image, format, &defaults).await?;
            return Ok((StatusCode::OK, axum::Json(body)).into_response());
        }

        if redirect {
            guard.finish(302);
            state.metrics.record_random_request("ok", started.elapsed().as_secs_f64());
            if !image.has_complete_metadata() {
                maybe_enqueue_hydrate(&state, &image, oauth_configured).await;
            }
            let mut resp = Redirect::to(&image.proxy_path).into_response();
            resp.headers_mut().insert("cache-control", "no-store".parse().unwrap());
            return Ok(resp);
        }

        match fetch_image_bytes(&state, &image).await {
            Ok(streamed) => {
                if !image.has_complete_metadata() {
                    maybe_enqueue_hydrate(&state, &image, oauth_configured).await;
                }
                guard.finish(streamed.status);
                state.metrics.record_random_request("ok", started.elapsed().as_secs_f64());
                return Ok(stream_response(streamed));
            }
            Err(err) => {
                record_fetch_failure(&state, &image, &err).await;
                last_err = Some(err);
                if attempt >= defaults.attempts.max(1) {
                    break;
                }
            }
        }
    }

    guard.finish(502);
    state.metrics.record_random_request("error", started.elapsed().as_secs_f64());
    let err = last_err.unwrap_or_else(|| AppError::new(ErrorCode::UpstreamStreamError, ErrorCode::UpstreamStreamError.default_message()));
    Err(ApiError::with_request_id(err, request_id))
}

/// Fetches an image's bytes and records the §4.J fail/heal bookkeeping
/// on error, for callers that don't need the retry loop `/random` runs.
pub(crate) async fn fetch_and_record(
    state: &AppState,
    image: &Image,
) -> Result<curator_upstream::fetch::StreamedResponse, ApiError> {
    match fetch_image_bytes(state, image).await {
        Ok(streamed) => Ok(streamed),
        Err(err) => {
            record_fetch_failure(state, image, &err).await;
            Err(ApiError::from(err))
        }
    }
}

async fn fetch_image_bytes(
    state: &AppState,
    image: &Image,
) -> Result<curator_upstream::fetch::StreamedResponse, AppError> {
    let credential = curator_handlers::credentials::acquire_credential(
        &state.pool,
        &state.vault,
        &state.token_cache,
        state.refresher.as_ref(),
        state.select_strategy,
    )
    .await
    .map_err(|e| AppError::new(ErrorCode::NoTokenAvailable, e.to_string()).and_status(502))?;

    let client = curator_upstream::client::build_client(credential.proxy_uri.as_deref(), 30)
        .map_err(|e| AppError::new(ErrorCode::ProxyConnectFailed, e.to_string()).and_status(502))?;

    stream_url(&client, &image.original_url, FetchOptions::default()).await
}

fn stream_response(streamed: curator_upstream::fetch::StreamedResponse) -> Response {
    let mut builder = Response::builder()
        .status(streamed.status)
        .header("content-type", streamed.content_type)
        .header("cache-control", "public, max-age=31536000, immutable");
    if let Some(len) = streamed.content_length {
        builder = builder.header("content-length", len.to_string());
    }
    if let Some(ranges) = &streamed.accept_ranges {
        builder = builder.header("accept-ranges", ranges.clone());
    }
    if let Some(range) = &streamed.content_range {
        builder = builder.header("content-range", range.clone());
    }
    builder.body(Body::from_stream(streamed.body)).unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

async fn record_fetch_failure(state: &AppState, image: &Image, err: &AppError) {
    let redacted = curator_observability::redact::redact_text(&err.to_string());
    let images = ImagesRepo::new(&state.pool);
    let _ = images.mark_fail(image.id, err.code().as_str(), &redacted).await;

    if matches!(err.code(), ErrorCode::Upstream404 | ErrorCode::Upstream403) {
        let _ = images.mark_broken(image.illust_id, err.code().as_str(), &redacted).await;
        let jobs = JobsRepo::new(&state.pool);
        let payload = json!({ "illust_id": image.illust_id }).to_string();
        let _ = jobs
            .enqueue_deduped("heal_url", &payload, 0, 5, "broken_image", &image.illust_id.to_string())
            .await;
    }
}

async fn maybe_enqueue_hydrate(state: &AppState, image: &Image, oauth_configured: bool) {
    if !oauth_configured {
        return;
    }
    let jobs = JobsRepo::new(&state.pool);
    let payload = json!({ "illust_id": image.illust_id }).to_string();
    let _ = jobs
        .enqueue_deduped("hydrate_metadata", &payload, -10, 5, "opportunistic_hydrate", &image.illust_id.to_string())
        .await;
}

async fn serialize_image(
    state: &AppState,
    headers: &HeaderMap,
    image: &Image,
    format: &str,
    defaults: &EffectiveDefaults,
) -> Result<serde_json::Value, ApiError> {
    let tags = TagsRepo::new(&state.pool).for_image(image.id).await?;
    let tag_names: Vec<String> = tags.iter().map(|t| t.name.clone()).collect();

    let mut image_json = serde_json::to_value(image).map_err(|e| ApiError::from(AppError::Serde(e)))?;
    if let Some(obj) = image_json.as_object_mut() {
        obj.remove("original_url");
    }

    let imgproxy_url = if state.config.imgproxy.is_configured() {
        let source = proxy_served_url(headers, image);
        build_signed_url(&state.config.imgproxy, &source, &image.extension, None).ok()
    } else {
        None
    };

    let mut data = json!({
        "image": image_json,
        "tags": tag_names,
    });
    if let Some(url) = imgproxy_url {
        data["imgproxy_url"] = json!(url);
    }

    if format == "json" {
        data["debug"] = json!({
            "strategy": if matches!(defaults.strategy, Strategy::Quality) { "quality" } else { "default" },
            "strategy_source": defaults.strategy_source,
        });
    }

    Ok(json!({ "ok": true, "data": data }))
}

trait NoMatchDetails {
    fn with_details_no_match(self, filter: &RandomFilter) -> Self;
}

impl NoMatchDetails for AppError {
    fn with_details_no_match(self, filter: &RandomFilter) -> Self {
        match self {
            AppError::Api { code, message, status, .. } => AppError::Api {
                code,
                message,
                status,
                details: json!({
                    "applied_filters": {
                        "r18": filter.r18,
                        "orientation": filter.orientation,
                        "ai_type": filter.ai_type,
                        "illust_type": filter.illust_type,
                        "included_tags": filter.included_tags,
                        "excluded_tags": filter.excluded_tags,
                    },
                    "hint": "尝试放宽筛选条件，例如减少标签限制或降低最低分辨率要求",
                }),
            },
            other => other,
        }
    }
}
