//! Notification delivery rule tests
//!
//! Property-based and unit tests for:
//! - Quiet hours windows (including windows that wrap midnight)
//! - Delivery decisions from user preferences
//! - Retry budget

use chrono::NaiveTime;
use proptest::prelude::*;
use shared::models::{
    decide_delivery, in_quiet_hours, should_retry, DeliveryDecision, NotificationPriority,
    NotificationStatus, DEFAULT_MAX_RETRIES,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn time_strategy() -> impl Strategy<Value = NaiveTime> {
    (0u32..24, 0u32..60).prop_map(|(h, m)| NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

fn priority_strategy() -> impl Strategy<Value = NotificationPriority> {
    prop_oneof![
        Just(NotificationPriority::Low),
        Just(NotificationPriority::Normal),
        Just(NotificationPriority::High),
        Just(NotificationPriority::Urgent),
    ]
}

fn status_strategy() -> impl Strategy<Value = NotificationStatus> {
    prop_oneof![
        Just(NotificationStatus::Pending),
        Just(NotificationStatus::Sent),
        Just(NotificationStatus::Failed),
        Just(NotificationStatus::Read),
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// A window and its complement cover the whole day and only share their edges
    #[test]
    fn test_window_and_complement_cover_the_day(
        start in time_strategy(),
        end in time_strategy(),
        now in time_strategy(),
    ) {
        prop_assume!(start != end);
        let inside = in_quiet_hours(Some(start), Some(end), now);
        let outside = in_quiet_hours(Some(end), Some(start), now);
        prop_assert!(inside || outside);
        prop_assert_eq!(inside && outside, now == start || now == end);
    }

    /// Missing bounds never silence anything
    #[test]
    fn test_incomplete_window_is_never_quiet(bound in time_strategy(), now in time_strategy()) {
        prop_assert!(!in_quiet_hours(Some(bound), None, now));
        prop_assert!(!in_quiet_hours(None, Some(bound), now));
        prop_assert!(!in_quiet_hours(Some(bound), Some(bound), now));
    }

    /// Urgent notifications always go out when the user accepts them
    #[test]
    fn test_urgent_ignores_quiet_hours(quiet in any::<bool>()) {
        prop_assert_eq!(
            decide_delivery(true, true, quiet, NotificationPriority::Urgent),
            DeliveryDecision::Deliver
        );
    }

    /// Disabled preferences block regardless of priority or time
    #[test]
    fn test_preferences_block(
        channel in any::<bool>(),
        kind in any::<bool>(),
        quiet in any::<bool>(),
        priority in priority_strategy(),
    ) {
        prop_assume!(!(channel && kind));
        let decision = decide_delivery(channel, kind, quiet, priority);
        prop_assert!(matches!(decision, DeliveryDecision::Blocked(_)));
    }

    /// Only failed notifications under budget are retried
    #[test]
    fn test_retry_budget(status in status_strategy(), retries in 0i32..10) {
        let retry = should_retry(status, retries, DEFAULT_MAX_RETRIES);
        prop_assert_eq!(
            retry,
            status == NotificationStatus::Failed && retries < DEFAULT_MAX_RETRIES
        );
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

fn at(h: u32, m: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(h, m, 0).unwrap()
}

#[test]
fn test_same_day_window() {
    let (start, end) = (Some(at(12, 0)), Some(at(14, 0)));
    assert!(in_quiet_hours(start, end, at(12, 0)));
    assert!(in_quiet_hours(start, end, at(13, 59)));
    assert!(in_quiet_hours(start, end, at(14, 0)));
    assert!(!in_quiet_hours(start, end, at(14, 1)));
    assert!(!in_quiet_hours(start, end, at(11, 59)));
}

#[test]
fn test_overnight_window() {
    let (start, end) = (Some(at(21, 0)), Some(at(5, 30)));
    assert!(in_quiet_hours(start, end, at(23, 0)));
    assert!(in_quiet_hours(start, end, at(0, 0)));
    assert!(in_quiet_hours(start, end, at(5, 30)));
    assert!(!in_quiet_hours(start, end, at(5, 31)));
    assert!(!in_quiet_hours(start, end, at(10, 0)));
}

#[test]
fn test_quiet_hours_defer_non_urgent() {
    assert_eq!(
        decide_delivery(true, true, true, NotificationPriority::High),
        DeliveryDecision::Deferred
    );
    assert_eq!(
        decide_delivery(true, true, false, NotificationPriority::Low),
        DeliveryDecision::Deliver
    );
}

#[test]
fn test_blocked_reason_names_the_preference() {
    assert_eq!(
        decide_delivery(false, true, false, NotificationPriority::Normal),
        DeliveryDecision::Blocked("Channel disabled by user preferences")
    );
    assert_eq!(
        decide_delivery(true, false, false, NotificationPriority::Normal),
        DeliveryDecision::Blocked("Notification type disabled by user preferences")
    );
}
