//! Enrollment and learning path progress tests
//!
//! Property-based and unit tests for:
//! - Lesson completion and course progress
//! - Enrollment status transitions
//! - Learning path progress, status and course locking

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    assignment_status, clamp_percent, enrollment_progress, is_completion_transition,
    is_course_locked, is_lesson_completed, missing_prerequisites, next_enrollment_status,
    path_progress, AssignmentStatus, EnrollmentStatus,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn percent_strategy() -> impl Strategy<Value = Decimal> {
    (-5_000i64..=15_000).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

fn active_status_strategy() -> impl Strategy<Value = EnrollmentStatus> {
    prop_oneof![
        Just(EnrollmentStatus::Enrolled),
        Just(EnrollmentStatus::InProgress),
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Client-reported progress is always clamped to 0..=100
    #[test]
    fn test_clamp_percent_bounds(value in percent_strategy()) {
        let clamped = clamp_percent(value);
        prop_assert!(clamped >= Decimal::ZERO);
        prop_assert!(clamped <= Decimal::from(100));
    }

    /// Course progress stays within bounds and reaches 100 only when all lessons are done
    #[test]
    fn test_course_progress_bounds(total in 0i64..50, completed in 0i64..60) {
        let progress = enrollment_progress(completed, total);
        prop_assert!(progress >= Decimal::ZERO);
        prop_assert!(progress <= Decimal::from(100));
        prop_assert_eq!(progress == Decimal::from(100), total > 0 && completed >= total);
    }

    /// Active enrollments complete exactly at 100%
    #[test]
    fn test_active_enrollment_transitions(
        status in active_status_strategy(),
        progress in (0i64..=10_000).prop_map(|h| Decimal::new(h, 2)),
    ) {
        let next = next_enrollment_status(status, progress);
        if progress >= Decimal::from(100) {
            prop_assert_eq!(next, EnrollmentStatus::Completed);
        } else if progress > Decimal::ZERO {
            prop_assert_eq!(next, EnrollmentStatus::InProgress);
        } else {
            prop_assert_eq!(next, status);
        }
    }

    /// Path progress mirrors course progress rules over required courses
    #[test]
    fn test_path_progress_bounds(total in 0i64..20, completed in 0i64..25) {
        let progress = path_progress(completed, total);
        prop_assert!(progress >= Decimal::ZERO);
        prop_assert!(progress <= Decimal::from(100));
    }

    /// A finished path is completed even when past due
    #[test]
    fn test_completed_path_never_overdue(days_late in 1i64..365) {
        let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let due = Some(now - Duration::days(days_late));
        prop_assert_eq!(
            assignment_status(Decimal::from(100), due, now),
            AssignmentStatus::Completed
        );
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_lesson_completion() {
    assert!(is_lesson_completed(true, Decimal::ZERO));
    assert!(is_lesson_completed(false, Decimal::from(100)));
    assert!(!is_lesson_completed(false, Decimal::new(9999, 2)));
}

#[test]
fn test_terminal_statuses_do_not_move() {
    for status in [
        EnrollmentStatus::Completed,
        EnrollmentStatus::Expired,
        EnrollmentStatus::Dropped,
    ] {
        assert_eq!(next_enrollment_status(status, Decimal::from(50)), status);
    }
}

#[test]
fn test_completion_counted_once() {
    // First update to reach 100% completes the course
    let first = next_enrollment_status(EnrollmentStatus::InProgress, Decimal::from(100));
    assert!(is_completion_transition(EnrollmentStatus::InProgress, first));

    // A second update that reads the already completed row does not
    let second = next_enrollment_status(first, Decimal::from(100));
    assert_eq!(second, EnrollmentStatus::Completed);
    assert!(!is_completion_transition(first, second));

    assert!(!is_completion_transition(
        EnrollmentStatus::Enrolled,
        EnrollmentStatus::InProgress
    ));
}

#[test]
fn test_reenroll_resets() {
    assert!(EnrollmentStatus::Expired.resets_on_reenroll());
    assert!(EnrollmentStatus::Dropped.resets_on_reenroll());
    assert!(!EnrollmentStatus::Completed.resets_on_reenroll());
}

#[test]
fn test_missing_prerequisites() {
    let required = vec!["SEG-001".to_string(), "SEG-002".to_string()];
    let completed = vec!["SEG-002".to_string()];
    assert_eq!(missing_prerequisites(&required, &completed), vec!["SEG-001"]);
    assert!(missing_prerequisites(&required, &required).is_empty());
}

#[test]
fn test_assignment_status() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    let tomorrow = Some(now + Duration::days(1));
    let yesterday = Some(now - Duration::days(1));
    assert_eq!(assignment_status(Decimal::ZERO, tomorrow, now), AssignmentStatus::Assigned);
    assert_eq!(assignment_status(Decimal::from(40), None, now), AssignmentStatus::InProgress);
    assert_eq!(assignment_status(Decimal::from(40), yesterday, now), AssignmentStatus::Overdue);
}

#[test]
fn test_course_locking() {
    assert!(!is_course_locked(None, &[]));
    assert!(is_course_locked(Some(1), &[]));
    assert!(!is_course_locked(Some(1), &[1, 2]));
    assert!(is_course_locked(Some(3), &[1, 2]));
}
