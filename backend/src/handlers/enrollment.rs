//! HTTP handlers for enrollments, lesson progress and evidence

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::models::{Action, EnrollmentStatus, Resource};
use shared::types::PaginatedResponse;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, CurrentUser};
use crate::services::enrollment::{
    EnrollInput, Enrollment, EnrollmentDetail, EnrollmentFilters, EnrollmentService,
    EnrollmentSummary, EvidenceInput, LessonEvidence, LessonProgressInput, ProgressUpdate,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MyEnrollmentsQuery {
    pub status: Option<EnrollmentStatus>,
}

/// Owners act on their own enrollments; anyone else needs `action` on enrollments
fn ensure_owner_or(user: &AuthUser, owner_id: Uuid, action: Action) -> AppResult<()> {
    if user.user_id == owner_id {
        Ok(())
    } else {
        user.require(Resource::Enrollment, action)
    }
}

/// Enroll the caller, or another user when the caller may assign training
pub async fn enroll(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<EnrollInput>,
) -> AppResult<(StatusCode, Json<Enrollment>)> {
    let user = current_user.0;
    let target = input.user_id.unwrap_or(user.user_id);
    let assigned_by = if target == user.user_id {
        None
    } else {
        user.require(Resource::Enrollment, Action::Assign)?;
        Some(user.user_id)
    };

    let enrollment = EnrollmentService::new(state.db)
        .enroll(target, input.course_id, input.due_date, assigned_by)
        .await?;
    Ok((StatusCode::CREATED, Json(enrollment)))
}

pub async fn my_enrollments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<MyEnrollmentsQuery>,
) -> AppResult<Json<Vec<EnrollmentSummary>>> {
    let enrollments = EnrollmentService::new(state.db)
        .my_enrollments(current_user.0.user_id, query.status)
        .await?;
    Ok(Json(enrollments))
}

pub async fn list_enrollments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filters): Query<EnrollmentFilters>,
) -> AppResult<Json<PaginatedResponse<EnrollmentSummary>>> {
    current_user.0.require(Resource::Enrollment, Action::View)?;
    let enrollments = EnrollmentService::new(state.db)
        .list_enrollments(filters)
        .await?;
    Ok(Json(enrollments))
}

pub async fn get_enrollment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<EnrollmentDetail>> {
    let detail = EnrollmentService::new(state.db).detail(enrollment_id).await?;
    ensure_owner_or(&current_user.0, detail.enrollment.user_id, Action::View)?;
    Ok(Json(detail))
}

pub async fn drop_enrollment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<Enrollment>> {
    let service = EnrollmentService::new(state.db);
    let enrollment = service.get_enrollment(enrollment_id).await?;
    ensure_owner_or(&current_user.0, enrollment.user_id, Action::Assign)?;
    let enrollment = service.drop_enrollment(enrollment_id).await?;
    Ok(Json(enrollment))
}

/// Learner progress on one lesson
pub async fn update_progress(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(enrollment_id): Path<Uuid>,
    Json(input): Json<LessonProgressInput>,
) -> AppResult<Json<ProgressUpdate>> {
    let service = EnrollmentService::new(state.db);
    let enrollment = service.get_enrollment(enrollment_id).await?;
    if enrollment.user_id != current_user.0.user_id {
        return Err(AppError::InsufficientPermissions);
    }
    let update = service.update_lesson_progress(enrollment_id, input).await?;
    Ok(Json(update))
}

// ============================================================================
// Evidence
// ============================================================================

pub async fn upload_evidence(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(progress_id): Path<Uuid>,
    Json(input): Json<EvidenceInput>,
) -> AppResult<(StatusCode, Json<LessonEvidence>)> {
    let service = EnrollmentService::new(state.db);
    let owner = service.progress_owner(progress_id).await?;
    if owner != current_user.0.user_id {
        return Err(AppError::InsufficientPermissions);
    }
    let evidence = service.upload_evidence(progress_id, input).await?;
    Ok((StatusCode::CREATED, Json(evidence)))
}

pub async fn list_evidence(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(progress_id): Path<Uuid>,
) -> AppResult<Json<Vec<LessonEvidence>>> {
    let service = EnrollmentService::new(state.db);
    let owner = service.progress_owner(progress_id).await?;
    ensure_owner_or(&current_user.0, owner, Action::View)?;
    let evidence = service.list_evidence(progress_id).await?;
    Ok(Json(evidence))
}

/// Instructors confirm field evidence, which completes the lesson
pub async fn verify_evidence(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(evidence_id): Path<Uuid>,
) -> AppResult<Json<LessonEvidence>> {
    let user = current_user.0;
    if !user.has_any_permission(&[
        (Resource::Course, Action::Edit),
        (Resource::Enrollment, Action::Assign),
    ]) {
        return Err(AppError::InsufficientPermissions);
    }
    let evidence = EnrollmentService::new(state.db)
        .verify_evidence(evidence_id, user.user_id)
        .await?;
    Ok(Json(evidence))
}
