//! Work and cast handlers.

use super::{
    json_body, optional_text, path_id, requested_page, required_text, CreatedResponse,
    DeletedResponse,
};
use crate::errors::ApiError;
use crate::models::{
    CastMember, CastMemberRequest, NewParticipation, NewWork, PageQuery, Work, WorkChanges,
    WorkRequest,
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
pub struct WorkListResponse {
    pub success: bool,
    pub works: Vec<Work>,
}

#[derive(Debug, Serialize)]
pub struct WorkResponse {
    pub success: bool,
    pub work: Work,
}

#[derive(Debug, Serialize)]
pub struct WorkUpdatedResponse {
    pub success: bool,
    pub updated: i64,
    pub work: Work,
}

#[derive(Debug, Serialize)]
pub struct CastListResponse {
    pub success: bool,
    pub cast: Vec<CastMember>,
}

#[derive(Debug, Serialize)]
pub struct CastMemberResponse {
    pub success: bool,
    pub cast_member: CastMember,
}

fn new_work(body: WorkRequest) -> Result<NewWork, ApiError> {
    let title = required_text(body.title, "title")?;
    let release_date = body
        .release_date
        .ok_or_else(|| ApiError::Unprocessable("release_date is required".to_string()))?;

    Ok(NewWork {
        title,
        release_date,
    })
}

fn work_changes(body: WorkRequest) -> Result<WorkChanges, ApiError> {
    Ok(WorkChanges {
        title: optional_text(body.title, "title")?,
        release_date: body.release_date,
    })
}

fn new_participation(work_id: i64, body: CastMemberRequest) -> Result<NewParticipation, ApiError> {
    let performer_id = body
        .performer_id
        .ok_or_else(|| ApiError::Unprocessable("performer_id is required".to_string()))?;

    let fee = match body.fee {
        Some(fee) if fee.is_finite() && fee >= 0.0 => fee,
        Some(_) => {
            return Err(ApiError::Unprocessable(
                "fee must be a non-negative number".to_string(),
            ))
        }
        None => return Err(ApiError::Unprocessable("fee is required".to_string())),
    };

    Ok(NewParticipation {
        work_id,
        performer_id,
        fee,
    })
}

fn not_found(id: i64) -> ApiError {
    ApiError::NotFound(format!("Work {id} not found"))
}

/// GET /works?page=N
#[instrument(skip_all, name = "casting.handlers.list_works")]
pub async fn list_works(
    State(state): State<Arc<AppState>>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<Json<WorkListResponse>, ApiError> {
    let page = requested_page(query, state.page_size)?;
    let works = state.repository.list_works(page).await?;

    if works.is_empty() {
        return Err(ApiError::NotFound("No works on this page".to_string()));
    }

    Ok(Json(WorkListResponse {
        success: true,
        works,
    }))
}

/// GET /works/:id
#[instrument(skip_all, name = "casting.handlers.get_work")]
pub async fn get_work(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<WorkResponse>, ApiError> {
    let id = path_id(path)?;
    let work = state
        .repository
        .get_work(id)
        .await?
        .ok_or_else(|| not_found(id))?;

    Ok(Json(WorkResponse {
        success: true,
        work,
    }))
}

/// POST /works
#[instrument(skip_all, name = "casting.handlers.create_work")]
pub async fn create_work(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<WorkRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let work = new_work(json_body(payload)?)?;
    let created = state.repository.create_work(work).await?;

    tracing::info!(target: "casting.handlers.works", id = created.id, "Work created");

    Ok((
        StatusCode::CREATED,
        Json(CreatedResponse {
            success: true,
            created: created.id,
        }),
    ))
}

/// PATCH /works/:id
#[instrument(skip_all, name = "casting.handlers.update_work")]
pub async fn update_work(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<WorkRequest>, JsonRejection>,
) -> Result<Json<WorkUpdatedResponse>, ApiError> {
    let id = path_id(path)?;
    let changes = work_changes(json_body(payload)?)?;

    let work = state
        .repository
        .update_work(id, changes)
        .await?
        .ok_or_else(|| not_found(id))?;

    tracing::info!(target: "casting.handlers.works", id, "Work updated");

    Ok(Json(WorkUpdatedResponse {
        success: true,
        updated: id,
        work,
    }))
}

/// DELETE /works/:id
///
/// Participations of the work go with it.
#[instrument(skip_all, name = "casting.handlers.delete_work")]
pub async fn delete_work(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let id = path_id(path)?;

    if !state.repository.delete_work(id).await? {
        return Err(not_found(id));
    }

    tracing::info!(target: "casting.handlers.works", id, "Work deleted");

    Ok(Json(DeletedResponse {
        success: true,
        deleted: id,
    }))
}

/// GET /works/:id/cast
#[instrument(skip_all, name = "casting.handlers.list_cast")]
pub async fn list_cast(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
) -> Result<Json<CastListResponse>, ApiError> {
    let id = path_id(path)?;

    if state.repository.get_work(id).await?.is_none() {
        return Err(not_found(id));
    }
    let cast = state.repository.list_cast(id).await?;

    Ok(Json(CastListResponse {
        success: true,
        cast,
    }))
}

/// POST /works/:id/cast
#[instrument(skip_all, name = "casting.handlers.add_cast_member")]
pub async fn add_cast_member(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i64>, PathRejection>,
    payload: Result<Json<CastMemberRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CastMemberResponse>), ApiError> {
    let id = path_id(path)?;
    let participation = new_participation(id, json_body(payload)?)?;

    let cast_member = state.repository.add_cast_member(participation).await?;

    tracing::info!(
        target: "casting.handlers.works",
        work_id = cast_member.work_id,
        performer_id = cast_member.performer_id,
        "Cast member added"
    );

    Ok((
        StatusCode::CREATED,
        Json(CastMemberResponse {
            success: true,
            cast_member,
        }),
    ))
}
