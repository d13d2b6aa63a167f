//! `GET /images` and `GET /images/{id}`: cursor-paginated public listing
//! and single-image lookup, both omitting the upstream origin URL the
//! same way `/random`'s JSON format does.

use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use serde_json::json;

use crate::error::{not_found, ApiError};
use crate::state::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 50;
const MAX_PAGE_LIMIT: i64 = 200;

#[derive(Debug, Deserialize, Default)]
pub struct PageQuery {
    pub cursor: Option<i64>,
    pub limit: Option<i64>,
}

fn clamp_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT)
}

fn redact_image(mut value: serde_json::Value) -> serde_json::Value {
    if let Some(obj) = value.as_object_mut() {
        obj.remove("original_url");
    }
    value
}

pub async fn list_images(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Result<Response, ApiError> {
    let repo = curator_store::images::ImagesRepo::new(&state.pool);
    let limit = clamp_limit(query.limit);
    let (rows, next_cursor) = repo.list(query.cursor, limit).await?;

    let items: Vec<serde_json::Value> =
        rows.iter().map(|img| redact_image(serde_json::to_value(img).unwrap_or(serde_json::Value::Null))).collect();

    Ok(Json(json!({ "ok": true, "data": { "items": items, "next_cursor": next_cursor } })).into_response())
}

pub async fn get_image(State(state): State<AppState>, Path(id): Path<i64>) -> Result<Response, ApiError> {
    let repo = curator_store::images::ImagesRepo::new(&state.pool);
    let image = repo.get_by_id(id).await?.ok_or_else(|| not_found("未找到该图片"))?;
    let tags = curator_store::tags::TagsRepo::new(&state.pool).for_image(image.id).await?;
    let tag_names: Vec<String> = tags.into_iter().map(|t| t.name).collect();

    let body = redact_image(serde_json::to_value(&image).unwrap_or(serde_json::Value::Null));
    Ok(Json(json!({ "ok": true, "data": { "image": body, "tags": tag_names } })).into_response())
}
