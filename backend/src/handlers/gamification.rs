//! HTTP handlers for points, badges and leaderboards

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use shared::types::PaginatedResponse;

use crate::error::{AppError, AppResult};
use crate::middleware::CurrentUser;
use crate::services::gamification::{
    AwardPointsInput, Badge, DeductPointsInput, GamificationService, LeaderboardEntry,
    LeaderboardQuery, PointTransaction, UserStats,
};
use crate::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

pub async fn my_stats(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<UserStats>> {
    let stats = GamificationService::new(state.db)
        .my_stats(current_user.0.user_id)
        .await?;
    Ok(Json(stats))
}

pub async fn points_history(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<PaginatedResponse<PointTransaction>>> {
    let history = GamificationService::new(state.db)
        .history(current_user.0.user_id, query.page, query.per_page)
        .await?;
    Ok(Json(history))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    _current_user: CurrentUser,
    Query(query): Query<LeaderboardQuery>,
) -> AppResult<Json<Vec<LeaderboardEntry>>> {
    let entries = GamificationService::new(state.db)
        .leaderboard(query)
        .await?;
    Ok(Json(entries))
}

pub async fn list_badges(
    State(state): State<AppState>,
    _current_user: CurrentUser,
) -> AppResult<Json<Vec<Badge>>> {
    let badges = GamificationService::new(state.db).list_badges().await?;
    Ok(Json(badges))
}

/// Manual award by an administrator
pub async fn award_points(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<AwardPointsInput>,
) -> AppResult<(StatusCode, Json<PointTransaction>)> {
    if !current_user.0.is_admin() {
        return Err(AppError::InsufficientPermissions);
    }
    let transaction = GamificationService::new(state.db)
        .award_points(input.user_id, &input.category, input.points, &input.description, None)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}

pub async fn deduct_points(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<DeductPointsInput>,
) -> AppResult<(StatusCode, Json<PointTransaction>)> {
    if !current_user.0.is_admin() {
        return Err(AppError::InsufficientPermissions);
    }
    let transaction = GamificationService::new(state.db)
        .deduct_points(input.user_id, input.points, &input.description)
        .await?;
    Ok((StatusCode::CREATED, Json(transaction)))
}
