//! `GET /authors`: cursor-paginated distinct-author listing.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Json, Response};
use serde_json::json;

use crate::error::ApiError;
use crate::handlers::images::PageQuery;
use crate::state::AppState;

const DEFAULT_PAGE_LIMIT: i64 = 50;
const MAX_PAGE_LIMIT: i64 = 200;

pub async fn list_authors(State(state): State<AppState>, Query(query): Query<PageQuery>) -> Result<Response, ApiError> {
    let repo = curator_store::authors::AuthorsRepo::new(&state.pool);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT).clamp(1, MAX_PAGE_LIMIT);
    let (rows, next_cursor) = repo.list(query.cursor, limit).await?;

    Ok(Json(json!({ "ok": true, "data": { "items": rows, "next_cursor": next_cursor } })).into_response())
}
