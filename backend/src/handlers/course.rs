//! HTTP handlers for the course catalog and authoring

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::models::{Action, CourseStatus, Resource};
use shared::types::PaginatedResponse;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::course::{
    Category, Course, CourseDetail, CourseFilters, CourseService, CourseStatistics, CourseVersion,
    CreateCategoryInput, CreateCourseInput, LessonInput, Lesson, Module, ModuleInput,
    UpdateCategoryInput, UpdateCourseInput,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct PublishRequest {
    pub changelog: Option<String>,
}

// ============================================================================
// Categories
// ============================================================================

pub async fn list_categories(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Category>>> {
    let categories = CourseService::new(state.db).list_categories().await?;
    Ok(Json(categories))
}

pub async fn create_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    current_user.0.require(Resource::Course, Action::Create)?;
    let category = CourseService::new(state.db).create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn get_category(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
) -> AppResult<Json<Category>> {
    let category = CourseService::new(state.db).get_category(category_id).await?;
    Ok(Json(category))
}

pub async fn update_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
    Json(input): Json<UpdateCategoryInput>,
) -> AppResult<Json<Category>> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let category = CourseService::new(state.db)
        .update_category(category_id, input)
        .await?;
    Ok(Json(category))
}

pub async fn delete_category(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(category_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Course, Action::Delete)?;
    CourseService::new(state.db).delete_category(category_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Courses
// ============================================================================

/// List courses; learners only see the published catalog
pub async fn list_courses(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(mut filters): Query<CourseFilters>,
) -> AppResult<Json<PaginatedResponse<Course>>> {
    if !current_user.0.has_permission(Resource::Course, Action::View) {
        filters.status = Some(CourseStatus::Published);
    }
    let courses = CourseService::new(state.db).list_courses(filters).await?;
    Ok(Json(courses))
}

pub async fn get_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<CourseDetail>> {
    let detail = CourseService::new(state.db)
        .get_course_detail(course_id)
        .await?;
    if detail.course.status != CourseStatus::Published {
        current_user.0.require(Resource::Course, Action::View)?;
    }
    Ok(Json(detail))
}

pub async fn create_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateCourseInput>,
) -> AppResult<(StatusCode, Json<Course>)> {
    current_user.0.require(Resource::Course, Action::Create)?;
    let course = CourseService::new(state.db)
        .create_course(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn update_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
    Json(input): Json<UpdateCourseInput>,
) -> AppResult<Json<Course>> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let course = CourseService::new(state.db)
        .update_course(course_id, input)
        .await?;
    Ok(Json(course))
}

pub async fn delete_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Course, Action::Delete)?;
    CourseService::new(state.db).delete_course(course_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn publish_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
    body: Option<Json<PublishRequest>>,
) -> AppResult<Json<Course>> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let changelog = body.and_then(|Json(b)| b.changelog);
    let course = CourseService::new(state.db)
        .publish(course_id, current_user.0.user_id, changelog)
        .await?;
    Ok(Json(course))
}

pub async fn unpublish_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<Course>> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let course = CourseService::new(state.db).unpublish(course_id).await?;
    Ok(Json(course))
}

pub async fn archive_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<Course>> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let course = CourseService::new(state.db).archive(course_id).await?;
    Ok(Json(course))
}

pub async fn duplicate_course(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<Course>)> {
    current_user.0.require(Resource::Course, Action::Create)?;
    let course = CourseService::new(state.db)
        .duplicate(course_id, current_user.0.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(course)))
}

pub async fn list_versions(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<Vec<CourseVersion>>> {
    current_user.0.require(Resource::Course, Action::View)?;
    let versions = CourseService::new(state.db).versions(course_id).await?;
    Ok(Json(versions))
}

pub async fn course_statistics(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
) -> AppResult<Json<CourseStatistics>> {
    current_user.0.require(Resource::Report, Action::View)?;
    let stats = CourseService::new(state.db).statistics(course_id).await?;
    Ok(Json(stats))
}

// ============================================================================
// Modules and lessons
// ============================================================================

pub async fn add_module(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(course_id): Path<Uuid>,
    Json(input): Json<ModuleInput>,
) -> AppResult<(StatusCode, Json<Module>)> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let module = CourseService::new(state.db)
        .add_module(course_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(module)))
}

pub async fn update_module(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<ModuleInput>,
) -> AppResult<Json<Module>> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let module = CourseService::new(state.db)
        .update_module(course_id, module_id, input)
        .await?;
    Ok(Json(module))
}

pub async fn delete_module(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    CourseService::new(state.db)
        .delete_module(course_id, module_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn add_lesson(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((course_id, module_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<LessonInput>,
) -> AppResult<(StatusCode, Json<Lesson>)> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let lesson = CourseService::new(state.db)
        .add_lesson(course_id, module_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(lesson)))
}

pub async fn update_lesson(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
    Json(input): Json<LessonInput>,
) -> AppResult<Json<Lesson>> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    let lesson = CourseService::new(state.db)
        .update_lesson(course_id, lesson_id, input)
        .await?;
    Ok(Json(lesson))
}

pub async fn delete_lesson(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path((course_id, lesson_id)): Path<(Uuid, Uuid)>,
) -> AppResult<StatusCode> {
    current_user.0.require(Resource::Course, Action::Edit)?;
    CourseService::new(state.db)
        .delete_lesson(course_id, lesson_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
