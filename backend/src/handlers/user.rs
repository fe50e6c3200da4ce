//! HTTP handlers for user administration

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use shared::models::{Action, Resource};
use shared::types::PaginatedResponse;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::user::{
    CreateUserInput, UpdateUserInput, User, UserFilters, UserProfile, UserService,
};
use crate::AppState;

/// List users
pub async fn list_users(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filters): Query<UserFilters>,
) -> AppResult<Json<PaginatedResponse<User>>> {
    current_user.0.require(Resource::User, Action::View)?;
    let users = UserService::new(state.db).list_users(filters).await?;
    Ok(Json(users))
}

/// Create a user
pub async fn create_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateUserInput>,
) -> AppResult<(StatusCode, Json<User>)> {
    current_user.0.require(Resource::User, Action::Create)?;
    let user = UserService::new(state.db).create_user(input).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get a user profile
pub async fn get_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<UserProfile>> {
    current_user.0.require_self_or(user_id, Resource::User)?;
    let user = UserService::new(state.db).get_user(user_id).await?;
    Ok(Json(user.into()))
}

/// Update a user
pub async fn update_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
    Json(input): Json<UpdateUserInput>,
) -> AppResult<Json<User>> {
    current_user.0.require(Resource::User, Action::Edit)?;
    let user = UserService::new(state.db).update_user(user_id, input).await?;
    Ok(Json(user))
}

/// Deactivate a user
pub async fn deactivate_user(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(user_id): Path<Uuid>,
) -> AppResult<Json<User>> {
    current_user.0.require(Resource::User, Action::Delete)?;
    let user = UserService::new(state.db)
        .deactivate_user(user_id, current_user.0.user_id)
        .await?;
    Ok(Json(user))
}
