//! HTTP handlers for learning paths and their assignments

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use shared::models::{Action, PathStatus, Resource};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::learning_path::{
    AssignPathInput, AssignmentSummary, CreatePathInput, LearningPath, LearningPathService,
    PathCourse, PathCourseInput, PathDetail, UpdatePathInput, UserPathDetail,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PathQuery {
    pub status: Option<PathStatus>,
}

#[derive(Debug, Deserialize)]
pub struct PathStatusRequest {
    pub status: PathStatus,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringAssignmentsQuery {
    pub days: Option<i64>,
}

const DEFAULT_EXPIRING_DAYS: i64 = 7;

/// List paths; learners only see active ones
pub async fn list_paths(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PathQuery>,
) -> AppResult<Json<Vec<LearningPath>>> {
    let status = if current_user.0.has_permission(Resource::LearningPath, Action::View) {
        query.status
    } else {
        Some(PathStatus::Active)
    };
    let paths = LearningPathService::new(state.db).list_paths(status).await?;
    Ok(Json(paths))
}

pub async fn get_path(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(path_id): Path<Uuid>,
) -> AppResult<Json<PathDetail>> {
    let detail = LearningPathService::new(state.db).get_detail(path_id).await?;
    if detail.path.status != PathStatus::Active {
        current_user.0.require(Resource::LearningPath, Action::View)?;
    }
    Ok(Json(detail))
}

pub async fn create_path(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreatePathInput>,
) -> AppResult<(StatusCode, Json<LearningPath>)> {
    current_user.0.require(Resource::LearningPath, Action::Create)?;
    let path = LearningPathService::new(state.db)
        .create_path(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(path)))
}

pub async fn update_path(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(path_id): Path<Uuid>,
    Json(input): Json<UpdatePathInput>,
) -> AppResult<Json<LearningPath>> {
    current_user.0.require(Resource::LearningPath, Action::Edit)?;
    let path = LearningPathService::new(state.db)
        .update_path(path_id, input)
        .await?;
    Ok(Json(path))
}

pub async fn set_path_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(path_id): Path<Uuid>,
    Json(body): Json<PathStatusRequest>,
) -> AppResult<Json<LearningPath>> {
    current_user.0.require(Resource::LearningPath, Action::Edit)?;
    let path = LearningPathService::new(state.db)
        .set_status(path_id, body.status)
        .await?;
    Ok(Json(path))
}

pub async fn add_path_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(path_id): Path<Uuid>,
    Json(input): Json<PathCourseInput>,
) -> AppResult<(StatusCode, Json<PathCourse>)> {
    current_user.0.require(Resource::LearningPath, Action::Edit)?;
    let course = LearningPathService::new(state.db)
        .add_course(path_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn remove_path_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((path_id, course_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::LearningPath, Action::Edit)?;
    LearningPathService::new(state.db)
        .remove_course(path_id, course_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Assign a path to one user or to every active user of a job profile
pub async fn assign_path(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(path_id): Path<Uuid>,
    Json(input): Json<AssignPathInput>,
) -> AppResult<Response> {
    current_user.0.require(Resource::LearningPath, Action::Assign)?;
    let service = LearningPathService::new(state.db);
    let assigned_by = Some(current_user.0.user_id);

    match (input.user_id, input.job_profile.as_deref()) {
        (Some(user_id), None) => {
            let assignment = service
                .assign(path_id, user_id, input.due_date, assigned_by)
                .await?;
            Ok((StatusCode::CREATED, Json(assignment)).into_response())
        }
        (None, Some(profile)) => {
            let result = service
                .assign_by_profile(path_id, profile, input.due_date, assigned_by)
                .await?;
            Ok((StatusCode::OK, Json(result)).into_response())
        }
        _ => Err(AppError::validation(
            "user_id",
            "Provide either user_id or job_profile",
            "Indique user_id o job_profile",
        )),
    }
}

pub async fn my_paths(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<AssignmentSummary>>> {
    let assignments = LearningPathService::new(state.db)
        .my_assignments(current_user.0.user_id)
        .await?;
    Ok(Json(assignments))
}

/// The caller's progress through a path, course by course
pub async fn my_path_detail(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(path_id): Path<Uuid>,
) -> AppResult<Json<UserPathDetail>> {
    let detail = LearningPathService::new(state.db)
        .user_path_detail(path_id, current_user.0.user_id)
        .await?;
    Ok(Json(detail))
}

pub async fn user_path_detail(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((path_id, user_id)): Path<(Uuid, Uuid)>,
) -> AppResult<Json<UserPathDetail>> {
    current_user.0.require_self_or(user_id, Resource::LearningPath)?;
    let detail = LearningPathService::new(state.db)
        .user_path_detail(path_id, user_id)
        .await?;
    Ok(Json(detail))
}

pub async fn expiring_assignments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ExpiringAssignmentsQuery>,
) -> AppResult<Json<Vec<AssignmentSummary>>> {
    current_user.0.require(Resource::LearningPath, Action::View)?;
    let days = query.days.unwrap_or(DEFAULT_EXPIRING_DAYS).max(0);
    let assignments = LearningPathService::new(state.db).expiring(days).await?;
    Ok(Json(assignments))
}
