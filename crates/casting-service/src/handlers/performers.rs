//! Performer handlers.
//!
//! Every route here sits behind the authorization middleware; a handler only
//! runs once the caller holds the operation's permission.

use super::{
    json_body, optional_text, path_id, requested_page, required_text, CreatedResponse,
    DeletedResponse,
};
use crate::errors::ApiError;
use crate::models::{
    NewPerformer, PageQuery, Performer, PerformerChanges, PerformerRequest, DEFAULT_GENDER,
};
use crate::routes::AppState;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use std::sync::Arc;
use tracing::instrument;

#[derive(Debug, Serialize)]
pub struct PerformerListResponse {
    pub success: bool,
    pub performers: Vec<Performer>,
}

#[derive(Debug, Serialize)]
pub struct PerformerResponse {
    pub success: bool,
    pub performer: Performer,
}

#[derive(Debug, Serialize)]
pub struct PerformerUpdatedResponse {
    pub success: bool,
    pub updated: i64,
    pub performer: Performer,
}

fn validate_age(age: i32) -> Result<i32, ApiError> {
    if age > 0 {
        Ok(age)
    } else {
        Err(ApiError::Unprocessable(
            "age must be a positive integer".to_string(),
        ))
    }
}

fn new_performer(body: PerformerRequest) -> Result<NewPerformer, ApiError> {
    let name = required_text(body.name, "name")?;
    let age = body
        .age
        .ok_or_else(|| ApiError::Unprocessable("age is required".to_string()))
        .and_then(validate_age)?;
    let gender = optional_text(body.gender, "gender")?.unwrap_or_else(|| DEFAULT_GENDER.to_string());

    Ok(NewPerformer { name, age, gender })
}

fn performer_changes(body: PerformerRequest) -> Result<PerformerChanges, ApiError> {
    Ok(PerformerChanges {
        name: optional_text(body.name, "name")?,
        age: body.age.map(validate_age).transpose()?,
        gender: optional_text(body.gender, "gender")?,
    })
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Performer {id} not found"))
}

/// GET /performers?page=N
#[instrument(skip_all, name = "casting.handlers.list_performers")]
pub async fn list_performers(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<PerformerListResponse>, ApiError> {
    let page = requested_page(query, state.page_size)?;
    let performers = state.repository.list_performers(page).await?;

    if performers.is_empty() {
        return Err(ApiError::NotFound("No performers on this page".to_string()));
    }

    Ok(Json(PerformerListResponse {
        success: true,
        performers,
    }))
}

/// GET /performers/:id
#[instrument(skip_all, name = "casting.handlers.get_performer")]
pub async fn get_performer(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<PerformerResponse>, ApiError> {
    let id = path_id(path)?;
    let performer = state
        .repository
        .get_performer(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(PerformerResponse {
        success: true,
        performer,
    }))
}

/// POST /performers
#[instrument(skip_all, name = "casting.handlers.create_performer")]
pub async fn create_performer(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<PerformerRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let performer = new_performer(json_body(payload)?)?;
    let created = state.repository.create_performer(performer).await?;

    tracing::info!(target: "casting.handlers.performers", id = created.id, "Performer created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            created: created.id,
        }),
    ))
}

/// PATCH /performers/:id
#[instrument(skip_all, name = "casting.handlers.update_performer")]
pub async fn update_performer(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<PerformerRequest>, JsonRejection>,
) -> Result<Json<PerformerUpdatedResponse>, ApiError> {
    let id = path_id(path)?;
    let changes = performer_changes(json_body(payload)?)?;

    let performer = state
        .repository
        .update_performer(id, changes)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(target: "casting.handlers.performers", id, "Performer updated");

    Ok(Json(PerformerUpdatedResponse {
        success: true,
        updated: id,
        performer,
    }))
}

/// DELETE /performers/:id
#[instrument(skip_all, name = "casting.handlers.delete_performer")]
pub async fn delete_performer(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = path_id(path)?;

    if !state.repository.delete_performer(id).await? {
        return Err(not_found(id));
    }

    tracing::info!(target: "casting.handlers.performers", id, "Performer deleted");

    Ok(Json(DeletedResponse {
        success: true,
        deleted: id,
    }))
}
