//! Learning path models

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Learning path status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "path_status", rename_all = "snake_case"))]
pub enum PathStatus {
    Draft,
    Active,
    Archived,
}

/// Assignment status of a path for one user
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "assignment_status", rename_all = "snake_case"))]
pub enum AssignmentStatus {
    Assigned,
    InProgress,
    Completed,
    Overdue,
}

/// Path progress over its required courses, rounded to 2 decimals
pub fn path_progress(completed_required: i64, total_required: i64) -> Decimal {
    if total_required <= 0 {
        return Decimal::ZERO;
    }
    let completed = completed_required.clamp(0, total_required);
    (Decimal::from(completed) * Decimal::from(100) / Decimal::from(total_required)).round_dp(2)
}

/// Status derived from progress and due date
pub fn assignment_status(
    progress: Decimal,
    due_date: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> AssignmentStatus {
    if progress >= Decimal::from(100) {
        return AssignmentStatus::Completed;
    }
    if due_date.is_some_and(|due| due < now) {
        return AssignmentStatus::Overdue;
    }
    if progress > Decimal::ZERO {
        AssignmentStatus::InProgress
    } else {
        AssignmentStatus::Assigned
    }
}

/// A path course stays locked until the course at position `unlock_after` is complete
pub fn is_course_locked(unlock_after: Option<i32>, completed_orders: &[i32]) -> bool {
    match unlock_after {
        Some(order) => !completed_orders.contains(&order),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_path_progress() {
        assert_eq!(path_progress(1, 4), Decimal::from(25));
        assert_eq!(path_progress(0, 0), Decimal::ZERO);
    }

    #[test]
    fn test_assignment_status() {
        let now = Utc::now();
        let past = Some(now - Duration::days(1));
        let future = Some(now + Duration::days(1));

        assert_eq!(
            assignment_status(Decimal::from(100), past, now),
            AssignmentStatus::Completed
        );
        assert_eq!(
            assignment_status(Decimal::from(50), past, now),
            AssignmentStatus::Overdue
        );
        assert_eq!(
            assignment_status(Decimal::from(50), future, now),
            AssignmentStatus::InProgress
        );
        assert_eq!(
            assignment_status(Decimal::ZERO, None, now),
            AssignmentStatus::Assigned
        );
    }

    #[test]
    fn test_course_lock() {
        assert!(!is_course_locked(None, &[]));
        assert!(is_course_locked(Some(1), &[]));
        assert!(!is_course_locked(Some(1), &[1, 2]));
    }
}
