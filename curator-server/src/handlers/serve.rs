//! Byte-serving routes: `/i/{image_id}.{ext}` by surrogate id, and the
//! legacy `/{illust_id}.{ext}` / `/{illust_id}-{page}.{ext}` (`page`
//! 1-based) identity-based aliases kept for backward compatibility with
//! links already handed out before images got a surrogate id.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use curator_core::domain::Image;

use crate::error::{not_found, ApiError};
use crate::handlers::random::fetch_and_record;
use crate::state::AppState;

fn split_name_ext(file: &str) -> Option<(&str, &str)> {
    let dot = file.rfind('.')?;
    if dot == 0 || dot == file.len() - 1 {
        return None;
    }
    Some((&file[..dot], &file[dot + 1..]))
}

pub async fn serve_by_id(State(state): State<AppState>, Path(file): Path<String>) -> Result<Response, ApiError> {
    let (id_part, ext) = split_name_ext(&file).ok_or_else(|| not_found("未找到该图片"))?;
    let image_id: i64 = id_part.parse().map_err(|_| not_found("未找到该图片"))?;

    let images = curator_store::images::ImagesRepo::new(&state.pool);
    let image = images.get_by_id(image_id).await?.ok_or_else(|| not_found("未找到该图片"))?;
    if !image.extension.eq_ignore_ascii_case(ext) {
        return Err(not_found("未找到该图片"));
    }

    serve_image(&state, &image).await
}

pub async fn serve_legacy(State(state): State<AppState>, Path(file): Path<String>) -> Result<Response, ApiError> {
    let (name, ext) = split_name_ext(&file).ok_or_else(|| not_found("未找到该图片"))?;
    let (illust_id, page_display) = match name.rsplit_once('-') {
        Some((illust_part, page_part)) => {
            let illust_id: i64 = illust_part.parse().map_err(|_| not_found("未找到该图片"))?;
            let page: i64 = page_part.parse().map_err(|_| not_found("未找到该图片"))?;
            (illust_id, page)
        }
        None => {
            let illust_id: i64 = name.parse().map_err(|_| not_found("未找到该图片"))?;
            (illust_id, 1)
        }
    };
    if page_display < 1 {
        return Err(not_found("未找到该图片"));
    }
    let page_index = (page_display - 1) as i32;

    let images = curator_store::images::ImagesRepo::new(&state.pool);
    let image = images
        .get_by_illust_page(illust_id, page_index)
        .await?
        .ok_or_else(|| not_found("未找到该图片"))?;
    if !image.extension.eq_ignore_ascii_case(ext) {
        return Err(not_found("未找到该图片"));
    }

    serve_image(&state, &image).await
}

async fn serve_image(state: &AppState, image: &Image) -> Result<Response, ApiError> {
    let streamed = fetch_and_record(state, image).await?;

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
    Ok(builder
        .body(axum::body::Body::from_stream(streamed.body))
        .unwrap_or_else(|_| axum::http::StatusCode::INTERNAL_SERVER_ERROR.into_response()))
}
