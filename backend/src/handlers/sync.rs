//! Offline sync handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use shared::models::{Action, Resource};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::sync::{
    DownloadPayload, OfflinePackage, ResolveConflictInput, StartSyncInput, SyncConflict, SyncLog,
    SyncService, UploadInput, UploadResult,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub since: Option<DateTime<Utc>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CompleteRequest {
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    pub device_id: String,
}

/// Open a sync session for a device
pub async fn start_sync(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<StartSyncInput>,
) -> AppResult<(StatusCode, Json<SyncLog>)> {
    let log = SyncService::new(state.db)
        .start(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(log)))
}

/// Push offline changes
pub async fn upload(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(log_id): Path<Uuid>,
    Json(input): Json<UploadInput>,
) -> AppResult<Json<UploadResult>> {
    let result = SyncService::new(state.db)
        .upload(log_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(result))
}

/// Pull server changes
pub async fn download(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(log_id): Path<Uuid>,
    Query(query): Query<DownloadQuery>,
) -> AppResult<Json<DownloadPayload>> {
    let payload = SyncService::new(state.db)
        .download(log_id, current_user.0.user_id, query.since)
        .await?;
    Ok(Json(payload))
}

pub async fn complete_sync(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(log_id): Path<Uuid>,
    body: Option<Json<CompleteRequest>>,
) -> AppResult<Json<SyncLog>> {
    let Json(body) = body.unwrap_or_default();
    let log = SyncService::new(state.db)
        .complete(log_id, current_user.0.user_id, body.error_message)
        .await?;
    Ok(Json(log))
}

/// Last finished sync of a device
pub async fn sync_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DeviceQuery>,
) -> AppResult<Json<Option<SyncLog>>> {
    let log = SyncService::new(state.db)
        .last(current_user.0.user_id, &query.device_id)
        .await?;
    Ok(Json(log))
}

pub async fn list_conflicts(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<SyncConflict>>> {
    let conflicts = SyncService::new(state.db)
        .pending_for_user(current_user.0.user_id)
        .await?;
    Ok(Json(conflicts))
}

pub async fn resolve_conflict(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(conflict_id): Path<Uuid>,
    Json(input): Json<ResolveConflictInput>,
) -> AppResult<Json<SyncConflict>> {
    let conflict = SyncService::new(state.db)
        .resolve_conflict(conflict_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(conflict))
}

// ============================================================================
// Offline packages
// ============================================================================

/// Build a fresh package for the current course version
pub async fn build_package(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<OfflinePackage>)> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let package = SyncService::new(state.db).build_package(course_id).await?;
    Ok((StatusCode::CREATED, Json(package)))
}

/// Latest ready package; the download is recorded against the device
pub async fn download_package(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
    Query(query): Query<DeviceQuery>,
) -> AppResult<Json<OfflinePackage>> {
    let service = SyncService::new(state.db);
    let package = service.latest_package(course_id).await?;
    service
        .record_download(package.id, current_user.0.user_id, &query.device_id)
        .await?;
    Ok(Json(package))
}
