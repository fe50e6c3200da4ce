//! Notification models and delivery rules

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};

/// Default number of delivery retries before giving up
pub const DEFAULT_MAX_RETRIES: i32 = 3;

/// Delivery channel
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "notification_channel", rename_all = "snake_case"))]
pub enum NotificationChannel {
    Email,
    Push,
    Sms,
    InApp,
}

/// Delivery status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "notification_status", rename_all = "snake_case"))]
pub enum NotificationStatus {
    Pending,
    Sent,
    Failed,
    Read,
}

/// Priority; urgent notifications ignore quiet hours
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Default)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "notification_priority", rename_all = "snake_case"))]
pub enum NotificationPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

/// Event that triggered a notification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "notification_type", rename_all = "snake_case"))]
pub enum NotificationType {
    CourseAssigned,
    CourseReminder,
    CertificateIssued,
    CertificateExpiring,
    PathAssigned,
    PathOverdue,
    AssessmentGraded,
    BadgeEarned,
    System,
}

impl NotificationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationType::CourseAssigned => "course_assigned",
            NotificationType::CourseReminder => "course_reminder",
            NotificationType::CertificateIssued => "certificate_issued",
            NotificationType::CertificateExpiring => "certificate_expiring",
            NotificationType::PathAssigned => "path_assigned",
            NotificationType::PathOverdue => "path_overdue",
            NotificationType::AssessmentGraded => "assessment_graded",
            NotificationType::BadgeEarned => "badge_earned",
            NotificationType::System => "system",
        }
    }
}

/// Whether `now` falls in the quiet window, both ends included. Windows with
/// `start > end` wrap midnight.
pub fn in_quiet_hours(start: Option<NaiveTime>, end: Option<NaiveTime>, now: NaiveTime) -> bool {
    match (start, end) {
        (Some(start), Some(end)) if start == end => false,
        (Some(start), Some(end)) if start < end => now >= start && now <= end,
        (Some(start), Some(end)) => now >= start || now <= end,
        _ => false,
    }
}

/// What to do with a freshly created notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryDecision {
    /// Preferences block it; recorded as failed with the reason
    Blocked(&'static str),
    /// Held until quiet hours end
    Deferred,
    /// Deliver now
    Deliver,
}

/// Apply user preferences and quiet hours to a notification
pub fn decide_delivery(
    channel_enabled: bool,
    type_enabled: bool,
    quiet: bool,
    priority: NotificationPriority,
) -> DeliveryDecision {
    if !channel_enabled {
        return DeliveryDecision::Blocked("Channel disabled by user preferences");
    }
    if !type_enabled {
        return DeliveryDecision::Blocked("Notification type disabled by user preferences");
    }
    if quiet && priority != NotificationPriority::Urgent {
        return DeliveryDecision::Deferred;
    }
    DeliveryDecision::Deliver
}

/// Failed notifications are retried while under the retry budget
pub fn should_retry(status: NotificationStatus, retry_count: i32, max_retries: i32) -> bool {
    status == NotificationStatus::Failed && retry_count < max_retries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_same_day_window() {
        assert!(in_quiet_hours(Some(t(13, 0)), Some(t(14, 0)), t(13, 30)));
        assert!(in_quiet_hours(Some(t(13, 0)), Some(t(14, 0)), t(14, 0)));
        assert!(!in_quiet_hours(Some(t(13, 0)), Some(t(14, 0)), t(14, 1)));
    }

    #[test]
    fn test_overnight_window() {
        let (s, e) = (Some(t(22, 0)), Some(t(6, 0)));
        assert!(in_quiet_hours(s, e, t(23, 0)));
        assert!(in_quiet_hours(s, e, t(2, 0)));
        assert!(!in_quiet_hours(s, e, t(12, 0)));
    }

    #[test]
    fn test_no_window() {
        assert!(!in_quiet_hours(None, Some(t(6, 0)), t(2, 0)));
        assert!(!in_quiet_hours(Some(t(6, 0)), Some(t(6, 0)), t(6, 0)));
    }

    #[test]
    fn test_delivery_decision() {
        use NotificationPriority::*;
        assert!(matches!(
            decide_delivery(false, true, false, Normal),
            DeliveryDecision::Blocked(_)
        ));
        assert!(matches!(
            decide_delivery(true, false, false, Normal),
            DeliveryDecision::Blocked(_)
        ));
        assert_eq!(decide_delivery(true, true, true, High), DeliveryDecision::Deferred);
        assert_eq!(decide_delivery(true, true, true, Urgent), DeliveryDecision::Deliver);
        assert_eq!(decide_delivery(true, true, false, Low), DeliveryDecision::Deliver);
    }

    #[test]
    fn test_retry_budget() {
        assert!(should_retry(NotificationStatus::Failed, 2, 3));
        assert!(!should_retry(NotificationStatus::Failed, 3, 3));
        assert!(!should_retry(NotificationStatus::Sent, 0, 3));
    }
}
