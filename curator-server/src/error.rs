//! Axum glue around `curator_core::error::AppError`: every handler returns
//! `Result<_, ApiError>` and the `From` impls let `?` work against
//! `sqlx::Error`/`anyhow::Error` the way the admin crate's handlers already
//! do ad hoc per call site.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use curator_core::error::{AppError, ErrorCode};
use curator_core::ids::new_request_id;

pub struct ApiError {
    inner: AppError,
    request_id: String,
}

impl ApiError {
    pub fn new(inner: AppError) -> Self {
        Self { inner, request_id: new_request_id() }
    }

    pub fn with_request_id(inner: AppError, request_id: impl Into<String>) -> Self {
        Self { inner, request_id: request_id.into() }
    }
}

impl From<AppError> for ApiError {
    fn from(inner: AppError) -> Self {
        Self::new(inner)
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::new(AppError::Store(err.to_string()))
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        Self::new(AppError::Internal(err.to_string()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = self.inner.to_json_body(&self.request_id);
        (status, Json(body)).into_response()
    }
}

pub fn not_found(message: &str) -> ApiError {
    ApiError::new(AppError::new(ErrorCode::NotFound, message))
}

pub fn bad_request(message: impl Into<String>) -> ApiError {
    ApiError::new(AppError::new(ErrorCode::BadRequest, message))
}
