//! HTTP request handlers for the casting service.
//!
//! Extractor rejections are taken as `Result`s and mapped to `ApiError` so
//! every failure uses the same JSON error envelope.

pub mod health;
pub mod metrics;
pub mod performers;
pub mod works;

pub use health::{health_check, readiness_check};
pub use metrics::metrics_handler;
pub use performers::{
    create_performer, delete_performer, get_performer, list_performers, update_performer,
};
pub use works::{
    add_cast_member, create_work, delete_work, get_work, list_cast, list_works, update_work,
};

use crate::errors::ApiError;
use crate::models::{Page, PageQuery};
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::Json;
use serde::Serialize;

/// `{"success": true, "created": id}`
#[derive(Debug, Serialize)]
pub struct CreatedResponse {
    pub success: bool,
    pub created: i64,
}

/// `{"success": true, "deleted": id}`
#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub success: bool,
    pub deleted: i64,
}

/// Resolve the requested page. Missing `page` means the first page.
pub(crate) fn requested_page(
    query: Result<Query<PageQuery>, QueryRejection>,
    page_size: u32,
) -> Result<Page, ApiError> {
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let number = query.page.unwrap_or(1);
    Page::new(number, page_size)
        .ok_or_else(|| ApiError::BadRequest("page must be a positive integer".to_string()))
}

/// Unwrap a JSON body. Type errors are 422; anything else is 400.
pub(crate) fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    match payload {
        Ok(Json(body)) => Ok(body),
        Err(JsonRejection::JsonDataError(e)) => Err(ApiError::Unprocessable(e.body_text())),
        Err(e) => Err(ApiError::BadRequest(e.body_text())),
    }
}

pub(crate) fn path_id(path: Result<Path<i64>, PathRejection>) -> Result<i64, ApiError> {
    path.map(|Path(id)| id)
        .map_err(|_| ApiError::BadRequest("id must be an integer".to_string()))
}

/// Trimmed non-empty text, or a 422 naming the field.
pub(crate) fn required_text(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
        _ => Err(ApiError::Unprocessable(format!("{field} is required"))),
    }
}

/// Like [`required_text`] but absence is allowed.
pub(crate) fn optional_text(value: Option<String>, field: &str) -> Result<Option<String>, ApiError> {
    value.map(|text| required_text(Some(text), field)).transpose()
}
