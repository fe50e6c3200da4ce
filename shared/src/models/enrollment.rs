//! Enrollment and lesson progress models

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Enrollment status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "enrollment_status", rename_all = "snake_case"))]
pub enum EnrollmentStatus {
    Enrolled,
    InProgress,
    Completed,
    Expired,
    Dropped,
}

/// Kind of evidence attached to a lesson (mostly for presential sessions)
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "evidence_type", rename_all = "snake_case"))]
pub enum EvidenceType {
    Photo,
    Attendance,
    Certificate,
    Other,
}

impl EnrollmentStatus {
    /// Expired or dropped enrollments start over when the user enrolls again
    pub fn resets_on_reenroll(&self) -> bool {
        matches!(self, EnrollmentStatus::Expired | EnrollmentStatus::Dropped)
    }

    pub fn is_active(&self) -> bool {
        matches!(self, EnrollmentStatus::Enrolled | EnrollmentStatus::InProgress)
    }
}

/// A lesson counts as done when explicitly flagged or fully consumed
pub fn is_lesson_completed(flagged: bool, progress_percent: Decimal) -> bool {
    flagged || progress_percent >= Decimal::from(100)
}

/// Clamp a client-reported progress value to 0..=100
pub fn clamp_percent(value: Decimal) -> Decimal {
    value.max(Decimal::ZERO).min(Decimal::from(100))
}

/// Enrollment progress from mandatory lessons, rounded to 2 decimals
pub fn enrollment_progress(completed_mandatory: i64, total_mandatory: i64) -> Decimal {
    if total_mandatory <= 0 {
        return Decimal::ZERO;
    }
    let completed = completed_mandatory.clamp(0, total_mandatory);
    (Decimal::from(completed) * Decimal::from(100) / Decimal::from(total_mandatory)).round_dp(2)
}

/// Status an enrollment moves to after its progress is recomputed
pub fn next_enrollment_status(current: EnrollmentStatus, progress: Decimal) -> EnrollmentStatus {
    if !current.is_active() {
        return current;
    }
    if progress >= Decimal::from(100) {
        EnrollmentStatus::Completed
    } else if progress > Decimal::ZERO {
        EnrollmentStatus::InProgress
    } else {
        current
    }
}

/// Whether moving from `before` to `after` completes the course; true only once
pub fn is_completion_transition(before: EnrollmentStatus, after: EnrollmentStatus) -> bool {
    after == EnrollmentStatus::Completed && before != EnrollmentStatus::Completed
}

/// Prerequisite codes that the user has not yet completed
pub fn missing_prerequisites<'a>(required: &'a [String], completed: &[String]) -> Vec<&'a str> {
    required
        .iter()
        .filter(|code| !completed.contains(code))
        .map(String::as_str)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_rounding() {
        assert_eq!(enrollment_progress(2, 3), Decimal::new(6667, 2));
        assert_eq!(enrollment_progress(0, 0), Decimal::ZERO);
        assert_eq!(enrollment_progress(5, 4), Decimal::from(100));
    }

    #[test]
    fn test_status_transitions() {
        let s = next_enrollment_status(EnrollmentStatus::Enrolled, Decimal::from(10));
        assert_eq!(s, EnrollmentStatus::InProgress);

        let s = next_enrollment_status(EnrollmentStatus::InProgress, Decimal::from(100));
        assert_eq!(s, EnrollmentStatus::Completed);

        let s = next_enrollment_status(EnrollmentStatus::Enrolled, Decimal::ZERO);
        assert_eq!(s, EnrollmentStatus::Enrolled);

        let s = next_enrollment_status(EnrollmentStatus::Completed, Decimal::from(50));
        assert_eq!(s, EnrollmentStatus::Completed);
    }

    #[test]
    fn test_lesson_completion() {
        assert!(is_lesson_completed(true, Decimal::ZERO));
        assert!(is_lesson_completed(false, Decimal::from(100)));
        assert!(!is_lesson_completed(false, Decimal::new(9999, 2)));
    }

    #[test]
    fn test_missing_prerequisites() {
        let required = vec!["SEG-001".to_string(), "SEG-002".to_string()];
        let completed = vec!["SEG-001".to_string()];
        assert_eq!(missing_prerequisites(&required, &completed), vec!["SEG-002"]);
        assert!(missing_prerequisites(&[], &completed).is_empty());
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn progress_stays_in_bounds(completed in -5i64..200, total in 0i64..150) {
            let p = enrollment_progress(completed, total);
            prop_assert!(p >= Decimal::ZERO);
            prop_assert!(p <= Decimal::from(100));
        }

        #[test]
        fn progress_is_monotonic(completed in 0i64..100, total in 1i64..100) {
            let a = enrollment_progress(completed, total);
            let b = enrollment_progress(completed + 1, total);
            prop_assert!(b >= a);
        }
    }
}
