//! Notification service
//!
//! Supports:
//! - Templated notifications per type and channel
//! - Per-user channel, type and quiet-hour preferences
//! - Delivery through the messaging gateway with retries
//! - In-app inbox management and push subscriptions

use std::collections::HashMap;

use chrono::{DateTime, Local, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use shared::models::{
    decide_delivery, in_quiet_hours, DeliveryDecision, NotificationChannel, NotificationPriority,
    NotificationStatus, NotificationType,
};
use shared::render_placeholders;
use shared::types::{PaginatedResponse, Pagination};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::external::messaging::{MessagingClient, OutboundMessage};

/// Failure recorded when an external channel has nowhere to go
const NO_GATEWAY_REASON: &str = "No messaging gateway configured";

/// Where a notification goes when it is delivered
#[derive(Debug, PartialEq, Eq)]
enum DeliveryRoute<'a, G> {
    InApp,
    Gateway(&'a G),
    Unavailable(&'static str),
}

fn delivery_route<G>(channel: NotificationChannel, gateway: Option<&G>) -> DeliveryRoute<'_, G> {
    match (channel, gateway) {
        (NotificationChannel::InApp, _) => DeliveryRoute::InApp,
        (_, Some(gateway)) => DeliveryRoute::Gateway(gateway),
        (_, None) => DeliveryRoute::Unavailable(NO_GATEWAY_REASON),
    }
}

/// Notification service
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    gateway: Option<MessagingClient>,
}

/// Stored notification
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub channel: NotificationChannel,
    pub priority: NotificationPriority,
    pub status: NotificationStatus,
    pub title: String,
    pub message: String,
    pub action_url: Option<String>,
    pub data: serde_json::Value,
    pub retry_count: i32,
    pub error_message: Option<String>,
    pub sent_at: Option<DateTime<Utc>>,
    pub read_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Notification template
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationTemplate {
    pub id: Uuid,
    pub notification_type: NotificationType,
    pub channel: NotificationChannel,
    pub subject: String,
    pub body: String,
    pub is_active: bool,
}

/// User notification preferences
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct NotificationPreferences {
    pub user_id: Uuid,
    pub email_enabled: bool,
    pub push_enabled: bool,
    pub sms_enabled: bool,
    pub in_app_enabled: bool,
    pub disabled_types: Vec<String>,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    pub updated_at: DateTime<Utc>,
}

impl NotificationPreferences {
    fn defaults(user_id: Uuid) -> Self {
        Self {
            user_id,
            email_enabled: true,
            push_enabled: true,
            sms_enabled: false,
            in_app_enabled: true,
            disabled_types: Vec::new(),
            quiet_hours_start: None,
            quiet_hours_end: None,
            updated_at: Utc::now(),
        }
    }

    pub fn channel_enabled(&self, channel: NotificationChannel) -> bool {
        match channel {
            NotificationChannel::Email => self.email_enabled,
            NotificationChannel::Push => self.push_enabled,
            NotificationChannel::Sms => self.sms_enabled,
            NotificationChannel::InApp => self.in_app_enabled,
        }
    }

    pub fn type_enabled(&self, notification_type: NotificationType) -> bool {
        !self
            .disabled_types
            .iter()
            .any(|t| t == notification_type.as_str())
    }

    pub fn is_quiet(&self, now: NaiveTime) -> bool {
        in_quiet_hours(self.quiet_hours_start, self.quiet_hours_end, now)
    }
}

/// Input for updating preferences
#[derive(Debug, Deserialize)]
pub struct UpdatePreferencesInput {
    pub email_enabled: Option<bool>,
    pub push_enabled: Option<bool>,
    pub sms_enabled: Option<bool>,
    pub in_app_enabled: Option<bool>,
    pub disabled_types: Option<Vec<NotificationType>>,
    pub quiet_hours_start: Option<NaiveTime>,
    pub quiet_hours_end: Option<NaiveTime>,
    /// Remove the quiet-hours window
    #[serde(default)]
    pub clear_quiet_hours: bool,
}

/// Push subscription
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PushSubscription {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub platform: String,
    pub token: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a push subscription
#[derive(Debug, Deserialize, Validate)]
pub struct PushSubscriptionInput {
    #[validate(length(min = 1, max = 200))]
    pub device_id: String,
    #[validate(length(min = 1, max = 20))]
    pub platform: String,
    #[validate(length(min = 1))]
    pub token: String,
}

/// Inbox filters
#[derive(Debug, Default, Deserialize)]
pub struct NotificationFilters {
    #[serde(default)]
    pub unread_only: bool,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Input for sending an ad-hoc notification
#[derive(Debug, Deserialize, Validate)]
pub struct SendNotificationInput {
    pub user_id: Uuid,
    pub notification_type: Option<NotificationType>,
    pub channel: Option<NotificationChannel>,
    pub priority: Option<NotificationPriority>,
    #[validate(length(min = 1, max = 200))]
    pub title: String,
    #[validate(length(min = 1))]
    pub message: String,
    pub action_url: Option<String>,
    #[serde(default)]
    pub context: HashMap<String, String>,
}

/// A notification request
#[derive(Debug, Clone)]
pub struct SendNotification {
    pub user_id: Uuid,
    pub notification_type: NotificationType,
    pub channel: NotificationChannel,
    pub priority: NotificationPriority,
    pub context: HashMap<String, String>,
    pub title: Option<String>,
    pub message: Option<String>,
    pub action_url: Option<String>,
}

impl SendNotification {
    pub fn new(
        user_id: Uuid,
        notification_type: NotificationType,
        channel: NotificationChannel,
    ) -> Self {
        Self {
            user_id,
            notification_type,
            channel,
            priority: NotificationPriority::default(),
            context: HashMap::new(),
            title: None,
            message: None,
            action_url: None,
        }
    }

    /// Add a template variable
    pub fn with(mut self, key: &str, value: impl ToString) -> Self {
        self.context.insert(key.to_string(), value.to_string());
        self
    }

    /// Fallback title and message when no template exists
    pub fn titled(mut self, title: &str, message: &str) -> Self {
        self.title = Some(title.to_string());
        self.message = Some(message.to_string());
        self
    }

    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn action_url(mut self, url: impl Into<String>) -> Self {
        self.action_url = Some(url.into());
        self
    }
}

impl From<SendNotificationInput> for SendNotification {
    fn from(input: SendNotificationInput) -> Self {
        Self {
            user_id: input.user_id,
            notification_type: input.notification_type.unwrap_or(NotificationType::System),
            channel: input.channel.unwrap_or(NotificationChannel::InApp),
            priority: input.priority.unwrap_or_default(),
            context: input.context,
            title: Some(input.title),
            message: Some(input.message),
            action_url: input.action_url,
        }
    }
}

const NOTIFICATION_COLUMNS: &str = r#"
    id, user_id, notification_type, channel, priority, status, title, message,
    action_url, data, retry_count, error_message, sent_at, read_at, created_at, updated_at
"#;

const PREFERENCE_COLUMNS: &str = r#"
    user_id, email_enabled, push_enabled, sms_enabled, in_app_enabled, disabled_types,
    quiet_hours_start, quiet_hours_end, updated_at
"#;

impl NotificationService {
    /// In-app only; other channels stay pending for the dispatcher
    pub fn new(db: PgPool) -> Self {
        Self { db, gateway: None }
    }

    /// Service that delivers external channels through the gateway
    pub fn with_gateway(db: PgPool, gateway: Option<MessagingClient>) -> Self {
        Self { db, gateway }
    }

    // ========================================================================
    // Sending
    // ========================================================================

    /// Create a notification and deliver it according to the user's preferences
    pub async fn send(&self, request: SendNotification) -> AppResult<Notification> {
        let template = sqlx::query_as::<_, NotificationTemplate>(
            r#"
            SELECT id, notification_type, channel, subject, body, is_active
            FROM notification_templates
            WHERE notification_type = $1 AND channel = $2 AND is_active = true
            "#,
        )
        .bind(request.notification_type)
        .bind(request.channel)
        .fetch_optional(&self.db)
        .await?;

        let (title, message) = render_content(&request, template.as_ref());

        let preferences = self.get_preferences(request.user_id).await?;
        let decision = decide_delivery(
            preferences.channel_enabled(request.channel),
            preferences.type_enabled(request.notification_type),
            preferences.is_quiet(Local::now().time()),
            request.priority,
        );

        let mut data = serde_json::to_value(&request.context)
            .unwrap_or_else(|_| serde_json::json!({}));
        let (status, error_message) = match decision {
            DeliveryDecision::Blocked(reason) => {
                data["blocked"] = serde_json::Value::Bool(true);
                (NotificationStatus::Failed, Some(reason.to_string()))
            }
            DeliveryDecision::Deferred | DeliveryDecision::Deliver => {
                (NotificationStatus::Pending, None)
            }
        };

        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            INSERT INTO notifications (
                user_id, notification_type, channel, priority, status, title, message,
                action_url, data, error_message
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(request.user_id)
        .bind(request.notification_type)
        .bind(request.channel)
        .bind(request.priority)
        .bind(status)
        .bind(&title)
        .bind(&message)
        .bind(&request.action_url)
        .bind(&data)
        .bind(&error_message)
        .fetch_one(&self.db)
        .await?;

        match decision {
            DeliveryDecision::Deliver => self.deliver(notification).await,
            DeliveryDecision::Deferred => {
                tracing::debug!(notification_id = %notification.id, "Notification deferred by quiet hours");
                Ok(notification)
            }
            DeliveryDecision::Blocked(reason) => {
                tracing::debug!(notification_id = %notification.id, reason, "Notification blocked");
                Ok(notification)
            }
        }
    }

    /// Deliver a pending or failed notification
    async fn deliver(&self, notification: Notification) -> AppResult<Notification> {
        let gateway = match delivery_route(notification.channel, self.gateway.as_ref()) {
            DeliveryRoute::InApp => return self.mark_sent(notification.id).await,
            DeliveryRoute::Gateway(gateway) => gateway,
            DeliveryRoute::Unavailable(reason) => {
                tracing::warn!(
                    notification_id = %notification.id,
                    channel = ?notification.channel,
                    reason,
                    "Notification cannot be delivered"
                );
                return self.mark_failed(notification.id, reason).await;
            }
        };

        let recipient = match self.recipient(&notification).await? {
            Some(recipient) => recipient,
            None => {
                return self
                    .mark_failed(notification.id, "No recipient address for channel")
                    .await
            }
        };

        let message = OutboundMessage {
            notification_id: notification.id,
            channel: notification.channel,
            recipient,
            subject: notification.title.clone(),
            body: notification.message.clone(),
            action_url: notification.action_url.clone(),
        };

        match gateway.send(&message).await {
            Ok(receipt) => {
                tracing::debug!(
                    notification_id = %notification.id,
                    message_id = %receipt.message_id,
                    "Notification delivered"
                );
                self.mark_sent(notification.id).await
            }
            Err(e) => {
                tracing::warn!(notification_id = %notification.id, error = %e, "Notification delivery failed");
                self.mark_failed(notification.id, &e.to_string()).await
            }
        }
    }

    async fn recipient(&self, notification: &Notification) -> AppResult<Option<String>> {
        let recipient = match notification.channel {
            NotificationChannel::Email => {
                sqlx::query_scalar::<_, String>("SELECT email FROM users WHERE id = $1")
                    .bind(notification.user_id)
                    .fetch_optional(&self.db)
                    .await?
            }
            NotificationChannel::Sms => {
                sqlx::query_scalar::<_, Option<String>>("SELECT phone FROM users WHERE id = $1")
                    .bind(notification.user_id)
                    .fetch_optional(&self.db)
                    .await?
                    .flatten()
            }
            NotificationChannel::Push => {
                sqlx::query_scalar::<_, String>(
                    r#"
                    SELECT token FROM push_subscriptions
                    WHERE user_id = $1 AND is_active = true
                    ORDER BY created_at DESC
                    LIMIT 1
                    "#,
                )
                .bind(notification.user_id)
                .fetch_optional(&self.db)
                .await?
            }
            NotificationChannel::InApp => None,
        };
        Ok(recipient)
    }

    async fn mark_sent(&self, notification_id: Uuid) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET
                status = 'sent', sent_at = NOW(), error_message = NULL, updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(notification_id)
        .fetch_one(&self.db)
        .await?;
        Ok(notification)
    }

    async fn mark_failed(&self, notification_id: Uuid, reason: &str) -> AppResult<Notification> {
        let notification = sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET
                status = 'failed',
                retry_count = retry_count + 1,
                error_message = $2,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(notification_id)
        .bind(reason)
        .fetch_one(&self.db)
        .await?;
        Ok(notification)
    }

    /// Retry failed deliveries under the retry budget; returns how many were sent
    pub async fn retry_failed(&self, max_retries: i32) -> AppResult<u64> {
        let failed = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE status = 'failed'
              AND retry_count < $1
              AND channel <> 'in_app'
              AND NOT (data ? 'blocked')
            ORDER BY created_at
            LIMIT 100
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(max_retries)
        .fetch_all(&self.db)
        .await?;

        let mut sent = 0;
        for notification in failed {
            if self.deliver(notification).await?.status == NotificationStatus::Sent {
                sent += 1;
            }
        }
        Ok(sent)
    }

    /// Deliver pending notifications whose quiet hours have ended
    pub async fn dispatch_pending(&self, limit: i64) -> AppResult<u64> {
        let pending = sqlx::query_as::<_, Notification>(&format!(
            r#"
            SELECT {}
            FROM notifications
            WHERE status = 'pending'
            ORDER BY priority DESC, created_at
            LIMIT $1
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let now = Local::now().time();
        let mut sent = 0;
        for notification in pending {
            let preferences = self.get_preferences(notification.user_id).await?;
            if preferences.is_quiet(now) && notification.priority != NotificationPriority::Urgent {
                continue;
            }
            if self.deliver(notification).await?.status == NotificationStatus::Sent {
                sent += 1;
            }
        }
        Ok(sent)
    }

    // ========================================================================
    // Inbox
    // ========================================================================

    /// Notifications of the current user, newest first
    pub async fn list_mine(
        &self,
        user_id: Uuid,
        filters: NotificationFilters,
    ) -> AppResult<PaginatedResponse<Notification>> {
        let pagination = Pagination::from_query(filters.page, filters.per_page);

        const FILTER: &str = r#"
            WHERE user_id = $1
              AND channel = 'in_app'
              AND status IN ('sent', 'read')
              AND (NOT $2 OR read_at IS NULL)
        "#;

        let total =
            sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM notifications {}", FILTER))
                .bind(user_id)
                .bind(filters.unread_only)
                .fetch_one(&self.db)
                .await?;

        let items = sqlx::query_as::<_, Notification>(&format!(
            "SELECT {} FROM notifications {} ORDER BY created_at DESC LIMIT $3 OFFSET $4",
            NOTIFICATION_COLUMNS, FILTER
        ))
        .bind(user_id)
        .bind(filters.unread_only)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(items, &pagination, total.max(0) as u64))
    }

    /// Unread in-app notifications
    pub async fn unread_count(&self, user_id: Uuid) -> AppResult<i64> {
        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM notifications
            WHERE user_id = $1 AND channel = 'in_app' AND status = 'sent' AND read_at IS NULL
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(count)
    }

    /// Mark one notification read
    pub async fn mark_read(&self, user_id: Uuid, notification_id: Uuid) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(&format!(
            r#"
            UPDATE notifications SET
                status = 'read', read_at = COALESCE(read_at, NOW()), updated_at = NOW()
            WHERE id = $1 AND user_id = $2
            RETURNING {}
            "#,
            NOTIFICATION_COLUMNS
        ))
        .bind(notification_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification".to_string()))
    }

    /// Mark every delivered notification read
    pub async fn mark_all_read(&self, user_id: Uuid) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            UPDATE notifications SET status = 'read', read_at = NOW(), updated_at = NOW()
            WHERE user_id = $1 AND status = 'sent' AND read_at IS NULL
            "#,
        )
        .bind(user_id)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Purge settled notifications older than the retention window
    pub async fn delete_old(&self, retention_days: i64) -> AppResult<u64> {
        let result = sqlx::query(
            r#"
            DELETE FROM notifications
            WHERE status <> 'pending'
              AND created_at < NOW() - ($1 * INTERVAL '1 day')
            "#,
        )
        .bind(retention_days)
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    // ========================================================================
    // Preferences and subscriptions
    // ========================================================================

    /// Preferences of a user, defaults when none are stored
    pub async fn get_preferences(&self, user_id: Uuid) -> AppResult<NotificationPreferences> {
        let preferences = sqlx::query_as::<_, NotificationPreferences>(&format!(
            "SELECT {} FROM notification_preferences WHERE user_id = $1",
            PREFERENCE_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(preferences.unwrap_or_else(|| NotificationPreferences::defaults(user_id)))
    }

    /// Update preferences
    pub async fn update_preferences(
        &self,
        user_id: Uuid,
        input: UpdatePreferencesInput,
    ) -> AppResult<NotificationPreferences> {
        if input.quiet_hours_start.is_some() != input.quiet_hours_end.is_some() {
            return Err(AppError::validation(
                "quiet_hours_start",
                "Quiet hours need both a start and an end",
                "El horario de silencio requiere inicio y fin",
            ));
        }

        let disabled_types: Option<Vec<String>> = input.disabled_types.map(|types| {
            types.iter().map(|t| t.as_str().to_string()).collect()
        });

        let preferences = sqlx::query_as::<_, NotificationPreferences>(&format!(
            r#"
            INSERT INTO notification_preferences (user_id) VALUES ($1)
            ON CONFLICT (user_id) DO UPDATE SET
                email_enabled = COALESCE($2, notification_preferences.email_enabled),
                push_enabled = COALESCE($3, notification_preferences.push_enabled),
                sms_enabled = COALESCE($4, notification_preferences.sms_enabled),
                in_app_enabled = COALESCE($5, notification_preferences.in_app_enabled),
                disabled_types = COALESCE($6, notification_preferences.disabled_types),
                quiet_hours_start = CASE WHEN $9 THEN NULL
                    ELSE COALESCE($7, notification_preferences.quiet_hours_start) END,
                quiet_hours_end = CASE WHEN $9 THEN NULL
                    ELSE COALESCE($8, notification_preferences.quiet_hours_end) END,
                updated_at = NOW()
            RETURNING {}
            "#,
            PREFERENCE_COLUMNS
        ))
        .bind(user_id)
        .bind(input.email_enabled)
        .bind(input.push_enabled)
        .bind(input.sms_enabled)
        .bind(input.in_app_enabled)
        .bind(&disabled_types)
        .bind(input.quiet_hours_start)
        .bind(input.quiet_hours_end)
        .bind(input.clear_quiet_hours)
        .fetch_one(&self.db)
        .await?;
        Ok(preferences)
    }

    /// Register or refresh a push subscription for a device
    pub async fn register_push(
        &self,
        user_id: Uuid,
        input: PushSubscriptionInput,
    ) -> AppResult<PushSubscription> {
        input.validate()?;
        let subscription = sqlx::query_as::<_, PushSubscription>(
            r#"
            INSERT INTO push_subscriptions (user_id, device_id, platform, token)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, device_id) DO UPDATE SET
                platform = EXCLUDED.platform,
                token = EXCLUDED.token,
                is_active = true
            RETURNING id, user_id, device_id, platform, token, is_active, created_at
            "#,
        )
        .bind(user_id)
        .bind(&input.device_id)
        .bind(input.platform.to_lowercase())
        .bind(&input.token)
        .fetch_one(&self.db)
        .await?;
        Ok(subscription)
    }

    /// Remove a device's push subscription
    pub async fn remove_push(&self, user_id: Uuid, device_id: &str) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM push_subscriptions WHERE user_id = $1 AND device_id = $2")
            .bind(user_id)
            .bind(device_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Push subscription".to_string()));
        }
        Ok(())
    }
}

/// Render title and message from the template, falling back to the request
fn render_content(
    request: &SendNotification,
    template: Option<&NotificationTemplate>,
) -> (String, String) {
    let fallback_title = request
        .title
        .clone()
        .unwrap_or_else(|| request.notification_type.as_str().replace('_', " "));
    let fallback_message = request.message.clone().unwrap_or_default();

    match template {
        Some(template) => (
            render_placeholders(&template.subject, &request.context),
            render_placeholders(&template.body, &request.context),
        ),
        None => (
            render_placeholders(&fallback_title, &request.context),
            render_placeholders(&fallback_message, &request.context),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(subject: &str, body: &str) -> NotificationTemplate {
        NotificationTemplate {
            id: Uuid::new_v4(),
            notification_type: NotificationType::CourseAssigned,
            channel: NotificationChannel::InApp,
            subject: subject.to_string(),
            body: body.to_string(),
            is_active: true,
        }
    }

    #[test]
    fn test_render_from_template() {
        let request = SendNotification::new(
            Uuid::new_v4(),
            NotificationType::CourseAssigned,
            NotificationChannel::InApp,
        )
        .with("course_title", "Trabajo en alturas");
        let tpl = template("Nuevo curso", "Se le asignó el curso {{course_title}}.");

        let (title, message) = render_content(&request, Some(&tpl));
        assert_eq!(title, "Nuevo curso");
        assert_eq!(message, "Se le asignó el curso Trabajo en alturas.");
    }

    #[test]
    fn test_render_fallback() {
        let request = SendNotification::new(
            Uuid::new_v4(),
            NotificationType::System,
            NotificationChannel::InApp,
        )
        .titled("Mantenimiento", "El sistema estará fuera de línea");
        let (title, message) = render_content(&request, None);
        assert_eq!(title, "Mantenimiento");
        assert_eq!(message, "El sistema estará fuera de línea");

        let bare = SendNotification::new(
            Uuid::new_v4(),
            NotificationType::CourseReminder,
            NotificationChannel::InApp,
        );
        assert_eq!(render_content(&bare, None).0, "course reminder");
    }

    #[test]
    fn test_external_channels_fail_without_gateway() {
        for channel in [
            NotificationChannel::Email,
            NotificationChannel::Push,
            NotificationChannel::Sms,
        ] {
            assert_eq!(
                delivery_route::<()>(channel, None),
                DeliveryRoute::Unavailable(NO_GATEWAY_REASON)
            );
            assert_eq!(delivery_route(channel, Some(&())), DeliveryRoute::Gateway(&()));
        }
        assert_eq!(
            delivery_route::<()>(NotificationChannel::InApp, None),
            DeliveryRoute::InApp
        );
    }

    #[test]
    fn test_preferences() {
        let mut prefs = NotificationPreferences::defaults(Uuid::new_v4());
        assert!(prefs.channel_enabled(NotificationChannel::Email));
        assert!(!prefs.channel_enabled(NotificationChannel::Sms));

        prefs.disabled_types = vec!["course_reminder".to_string()];
        assert!(!prefs.type_enabled(NotificationType::CourseReminder));
        assert!(prefs.type_enabled(NotificationType::CertificateIssued));

        prefs.quiet_hours_start = NaiveTime::from_hms_opt(22, 0, 0);
        prefs.quiet_hours_end = NaiveTime::from_hms_opt(6, 0, 0);
        assert!(prefs.is_quiet(NaiveTime::from_hms_opt(23, 30, 0).unwrap()));
        assert!(!prefs.is_quiet(NaiveTime::from_hms_opt(12, 0, 0).unwrap()));
    }
}
