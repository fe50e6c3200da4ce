//! HTTP handlers for assessments, attempts and grading

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::models::{Action, AssessmentStatus, Resource};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::assessment::{
    Assessment, AssessmentDetail, AssessmentService, AssessmentStatistics, Attempt, AttemptAnswer,
    AttemptHistory, AttemptResult, AttemptSession, CreateAssessmentInput, GradeAnswerInput,
    PendingAnswer, QuestionInput, QuestionWithAnswers, SubmitAnswerInput, UpdateAssessmentInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct AssessmentQuery {
    pub course_id: Option<Uuid>,
    pub status: Option<AssessmentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatusRequest {
    pub status: AssessmentStatus,
}

#[derive(Debug, Deserialize)]
pub struct PendingQuery {
    pub assessment_id: Option<Uuid>,
}

// ============================================================================
// Authoring
// ============================================================================

/// List assessments; learners only see published ones
pub async fn list_assessments(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<AssessmentQuery>,
) -> AppResult<Json<Vec<Assessment>>> {
    let status = if current_user.0.has_permission(Resource::Assessment, Action::View) {
        query.status
    } else {
        Some(AssessmentStatus::Published)
    };
    let assessments = AssessmentService::new(state.db)
        .list_assessments(query.course_id, status)
        .await?;
    Ok(Json(assessments))
}

/// Full assessment including the answer key
pub async fn get_assessment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(assessment_id): Path<Uuid>,
) -> AppResult<Json<AssessmentDetail>> {
    current_user.0.require(Resource::Assessment, Action::View)?;
    let detail = AssessmentService::new(state.db)
        .get_detail(assessment_id)
        .await?;
    Ok(Json(detail))
}

pub async fn create_assessment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateAssessmentInput>,
) -> AppResult<(StatusCode, Json<Assessment>)> {
    current_user.0.require(Resource::Assessment, Action::Create)?;
    let assessment = AssessmentService::new(state.db)
        .create_assessment(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(assessment)))
}

pub async fn update_assessment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(assessment_id): Path<Uuid>,
    Json(input): Json<UpdateAssessmentInput>,
) -> AppResult<Json<Assessment>> {
    current_user.0.require(Resource::Assessment, Action::Edit)?;
    let assessment = AssessmentService::new(state.db)
        .update_assessment(assessment_id, input)
        .await?;
    Ok(Json(assessment))
}

pub async fn set_assessment_status(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(assessment_id): Path<Uuid>,
    Json(body): Json<StatusRequest>,
) -> AppResult<Json<Assessment>> {
    current_user.0.require(Resource::Assessment, Action::Edit)?;
    let assessment = AssessmentService::new(state.db)
        .set_status(assessment_id, body.status)
        .await?;
    Ok(Json(assessment))
}

pub async fn delete_assessment(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(assessment_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Assessment, Action::Delete)?;
    AssessmentService::new(state.db)
        .delete_assessment(assessment_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_question(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(assessment_id): Path<Uuid>,
    Json(input): Json<QuestionInput>,
) -> AppResult<(StatusCode, Json<QuestionWithAnswers>)> {
    current_user.0.require(Resource::Assessment, Action::Edit)?;
    let question = AssessmentService::new(state.db)
        .add_question(assessment_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(question)))
}

pub async fn update_question(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((assessment_id, question_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<QuestionInput>,
) -> AppResult<Json<QuestionWithAnswers>> {
    current_user.0.require(Resource::Assessment, Action::Edit)?;
    let question = AssessmentService::new(state.db)
        .update_question(assessment_id, question_id, input)
        .await?;
    Ok(Json(question))
}

pub async fn delete_question(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((assessment_id, question_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Assessment, Action::Edit)?;
    AssessmentService::new(state.db)
        .delete_question(assessment_id, question_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn assessment_statistics(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(assessment_id): Path<Uuid>,
) -> AppResult<Json<AssessmentStatistics>> {
    current_user.0.require(Resource::Assessment, Action::View)?;
    let stats = AssessmentService::new(state.db)
        .statistics(assessment_id)
        .await?;
    Ok(Json(stats))
}

// ============================================================================
// Attempts
// ============================================================================

pub async fn start_attempt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(assessment_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<AttemptSession>)> {
    let session = AssessmentService::new(state.db)
        .start_attempt(assessment_id, current_user.0.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(session)))
}

pub async fn my_attempts(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(assessment_id): Path<Uuid>,
) -> AppResult<Json<AttemptHistory>> {
    let history = AssessmentService::new(state.db)
        .my_attempts(assessment_id, current_user.0.user_id)
        .await?;
    Ok(Json(history))
}

pub async fn get_attempt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(attempt_id): Path<Uuid>,
) -> AppResult<Json<AttemptSession>> {
    let session = AssessmentService::new(state.db)
        .get_session(attempt_id, current_user.0.user_id)
        .await?;
    Ok(Json(session))
}

pub async fn submit_answer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(attempt_id): Path<Uuid>,
    Json(input): Json<SubmitAnswerInput>,
) -> AppResult<Json<AttemptAnswer>> {
    let answer = AssessmentService::new(state.db)
        .submit_answer(attempt_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(answer))
}

pub async fn submit_attempt(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(attempt_id): Path<Uuid>,
) -> AppResult<Json<Attempt>> {
    let attempt = AssessmentService::new(state.db)
        .submit_attempt(attempt_id, current_user.0.user_id)
        .await?;
    Ok(Json(attempt))
}

/// Attempt results for the learner or a grader
pub async fn attempt_results(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(attempt_id): Path<Uuid>,
) -> AppResult<Json<AttemptResult>> {
    let result = AssessmentService::new(state.db).results(attempt_id).await?;
    let user = &current_user.0;
    if result.attempt.user_id != user.user_id
        && !user.has_permission(Resource::Assessment, Action::Grade)
    {
        return Err(AppError::InsufficientPermissions);
    }
    Ok(Json(result))
}

// ============================================================================
// Grading
// ============================================================================

pub async fn pending_grading(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<PendingQuery>,
) -> AppResult<Json<Vec<PendingAnswer>>> {
    current_user.0.require(Resource::Assessment, Action::Grade)?;
    let pending = AssessmentService::new(state.db)
        .pending_grading(query.assessment_id)
        .await?;
    Ok(Json(pending))
}

pub async fn grade_answer(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(answer_id): Path<Uuid>,
    Json(input): Json<GradeAnswerInput>,
) -> AppResult<Json<AttemptAnswer>> {
    current_user.0.require(Resource::Assessment, Action::Grade)?;
    let answer = AssessmentService::new(state.db)
        .grade_answer(answer_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(answer))
}
