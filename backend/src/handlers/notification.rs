//! HTTP handlers for the notification inbox, preferences and push devices

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use shared::models::{Action, Resource};
use shared::types::PaginatedResponse;
use uuid::Uuid;
use validator::Validate;

use crate::error::AppResult;
use crate::external::MessagingClient;
use crate::middleware::CurrentUser;
use crate::services::notification::{
    Notification, NotificationFilters, NotificationPreferences, NotificationService,
    PushSubscription, PushSubscriptionInput, SendNotificationInput, UpdatePreferencesInput,
};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct UnreadCount {
    pub unread: i64,
}

#[derive(Debug, Serialize)]
pub struct MarkedCount {
    pub marked: u64,
}

#[derive(Debug, Deserialize)]
pub struct DeviceQuery {
    pub device_id: String,
}

// ============================================================================
// Inbox
// ============================================================================

/// List the caller's notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(filters): Query<NotificationFilters>,
) -> AppResult<Json<PaginatedResponse<Notification>>> {
    let notifications = NotificationService::new(state.db)
        .list_mine(current_user.0.user_id, filters)
        .await?;
    Ok(Json(notifications))
}

pub async fn unread_count(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<UnreadCount>> {
    let unread = NotificationService::new(state.db)
        .unread_count(current_user.0.user_id)
        .await?;
    Ok(Json(UnreadCount { unread }))
}

pub async fn mark_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    let notification = NotificationService::new(state.db)
        .mark_read(current_user.0.user_id, notification_id)
        .await?;
    Ok(Json(notification))
}

pub async fn mark_all_read(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<MarkedCount>> {
    let marked = NotificationService::new(state.db)
        .mark_all_read(current_user.0.user_id)
        .await?;
    Ok(Json(MarkedCount { marked }))
}

/// Send an ad-hoc notification to a user
pub async fn send_notification(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<SendNotificationInput>,
) -> AppResult<(StatusCode, Json<Notification>)> {
    current_user.0.require(Resource::Notification, Action::Create)?;
    input.validate()?;
    let gateway = MessagingClient::from_config(&state.config.notifications);
    let notification = NotificationService::with_gateway(state.db, gateway)
        .send(input.into())
        .await?;
    Ok((StatusCode::CREATED, Json(notification)))
}

// ============================================================================
// Notification Preferences
// ============================================================================

/// Get notification preferences
pub async fn get_preferences(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<NotificationPreferences>> {
    let service = NotificationService::new(state.db);
    let prefs = service.get_preferences(current_user.0.user_id).await?;
    Ok(Json(prefs))
}

/// Update notification preferences
pub async fn update_preferences(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<UpdatePreferencesInput>,
) -> AppResult<Json<NotificationPreferences>> {
    let service = NotificationService::new(state.db);
    let prefs = service
        .update_preferences(current_user.0.user_id, input)
        .await?;
    Ok(Json(prefs))
}

// ============================================================================
// Push devices
// ============================================================================

pub async fn register_push(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<PushSubscriptionInput>,
) -> AppResult<(StatusCode, Json<PushSubscription>)> {
    let subscription = NotificationService::new(state.db)
        .register_push(current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(subscription)))
}

pub async fn remove_push(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<DeviceQuery>,
) -> AppResult<StatusCode> {
    NotificationService::new(state.db)
        .remove_push(current_user.0.user_id, &query.device_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
