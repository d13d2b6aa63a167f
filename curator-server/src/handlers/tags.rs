//! `GET /tags`: cursor-paginated tag listing.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::error::ApiError;
use crate::handlers::images::PageQuery;
use crate::state::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 100;
const MAX_PAGE_LIMIT: i64 = 500;

pub async fn list_tags(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Result<Response, ApiError> {
    let repo = curator_store::tags::TagsRepo::new(&state.pool);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let (rows, next_cursor) = repo.list_page(query.cursor, limit).await?;

    Ok(Json(json!({ "ok": true, "data": { "items": rows, "next_cursor": next_cursor } })).into_response())
}
