//! Course content models (LCMS)

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Course classification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "course_type", rename_all = "snake_case"))]
pub enum CourseType {
    Mandatory,
    Optional,
    Refresher,
}

/// Course lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "course_status", rename_all = "snake_case"))]
pub enum CourseStatus {
    Draft,
    Published,
    Archived,
}

/// Lesson content type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "lesson_type", rename_all = "snake_case"))]
pub enum LessonType {
    Video,
    Pdf,
    Scorm,
    Interactive,
    Audio,
    Quiz,
    Text,
    Presential,
}

impl LessonType {
    /// Presential lessons happen in the field and need attendance evidence
    pub fn is_presential(&self) -> bool {
        matches!(self, LessonType::Presential)
    }
}

impl std::fmt::Display for CourseStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CourseStatus::Draft => write!(f, "draft"),
            CourseStatus::Published => write!(f, "published"),
            CourseStatus::Archived => write!(f, "archived"),
        }
    }
}

/// Check that a course can be published
pub fn check_publishable(status: CourseStatus, lesson_count: i64) -> Result<(), &'static str> {
    if status == CourseStatus::Published {
        return Err("Course is already published");
    }
    if lesson_count == 0 {
        return Err("Course must contain at least one lesson before publishing");
    }
    Ok(())
}

/// Check that a course can be archived
pub fn check_archivable(status: CourseStatus) -> Result<(), &'static str> {
    if status == CourseStatus::Archived {
        return Err("Course is already archived");
    }
    Ok(())
}

/// Structural edits (modules, lessons) are only allowed on drafts
pub fn check_structure_editable(status: CourseStatus) -> Result<(), &'static str> {
    if status != CourseStatus::Draft {
        return Err("Only draft courses can be modified structurally");
    }
    Ok(())
}

/// Code assigned to a duplicated course, e.g. `SEG-001-COPY-A1B2C3`
pub fn duplicate_course_code(code: &str, suffix: &str) -> String {
    let suffix: String = suffix
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(6)
        .collect();
    format!("{}-COPY-{}", code, suffix.to_uppercase())
}

/// Percentage of enrollments that reached completion, rounded to 2 decimals
pub fn completion_rate(completed: i64, total: i64) -> Decimal {
    if total <= 0 {
        return Decimal::ZERO;
    }
    (Decimal::from(completed) * Decimal::from(100) / Decimal::from(total)).round_dp(2)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_rules() {
        assert!(check_publishable(CourseStatus::Draft, 3).is_ok());
        assert!(check_publishable(CourseStatus::Archived, 1).is_ok());
        assert!(check_publishable(CourseStatus::Published, 3).is_err());
        assert!(check_publishable(CourseStatus::Draft, 0).is_err());
    }

    #[test]
    fn test_archive_rules() {
        assert!(check_archivable(CourseStatus::Published).is_ok());
        assert!(check_archivable(CourseStatus::Archived).is_err());
    }

    #[test]
    fn test_duplicate_code() {
        assert_eq!(
            duplicate_course_code("SEG-001", "a1b2c3d4e5"),
            "SEG-001-COPY-A1B2C3"
        );
    }

    #[test]
    fn test_completion_rate() {
        assert_eq!(completion_rate(0, 0), Decimal::ZERO);
        assert_eq!(completion_rate(1, 3), Decimal::new(3333, 2));
        assert_eq!(completion_rate(5, 5), Decimal::from(100));
    }
}
