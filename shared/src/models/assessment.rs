//! Assessment, question and attempt models with grading rules

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Default minimum score to pass an assessment
pub const DEFAULT_PASSING_SCORE: i32 = 80;

/// Default attempt allowance (0 means unlimited)
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Assessment lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "assessment_status", rename_all = "snake_case"))]
pub enum AssessmentStatus {
    Draft,
    Published,
    Archived,
}

/// Question type
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "question_type", rename_all = "snake_case"))]
pub enum QuestionType {
    SingleChoice,
    MultipleChoice,
    TrueFalse,
    ShortAnswer,
    Essay,
    Matching,
    Ordering,
}

/// Attempt status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "attempt_status", rename_all = "snake_case"))]
pub enum AttemptStatus {
    InProgress,
    Submitted,
    Graded,
    Expired,
}

impl QuestionType {
    /// Free-text questions are graded by an instructor
    pub fn requires_manual_grading(&self) -> bool {
        matches!(self, QuestionType::ShortAnswer | QuestionType::Essay)
    }

    /// Choice-based questions carry answer options
    pub fn has_options(&self) -> bool {
        !self.requires_manual_grading()
    }

    /// Options keep their authored order for true/false and ordering questions
    pub fn allows_answer_shuffle(&self) -> bool {
        !matches!(self, QuestionType::TrueFalse | QuestionType::Ordering) && self.has_options()
    }
}

/// Grade an objective question.
///
/// Ordering questions compare the full sequence. All other choice types compare
/// the selected set with the set of correct options.
pub fn grade_objective(question_type: QuestionType, selected: &[Uuid], correct: &[Uuid]) -> bool {
    if selected.is_empty() || question_type.requires_manual_grading() {
        return false;
    }
    if question_type == QuestionType::Ordering {
        return selected == correct;
    }
    let selected: HashSet<&Uuid> = selected.iter().collect();
    let correct: HashSet<&Uuid> = correct.iter().collect();
    selected == correct
}

/// Result of grading a whole attempt
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GradeOutcome {
    pub score: Decimal,
    pub passed: bool,
}

/// Compute the attempt score as a percentage and the pass flag
pub fn grade_attempt(earned: Decimal, total: Decimal, passing_score: i32) -> GradeOutcome {
    if total <= Decimal::ZERO {
        return GradeOutcome {
            score: Decimal::ZERO,
            passed: false,
        };
    }
    let score = (earned.max(Decimal::ZERO) * Decimal::from(100) / total)
        .min(Decimal::from(100))
        .round_dp(2);
    GradeOutcome {
        score,
        passed: score >= Decimal::from(passing_score),
    }
}

/// Remaining attempts, `None` when unlimited
pub fn attempts_remaining(max_attempts: i32, used: i64) -> Option<i64> {
    if max_attempts <= 0 {
        return None;
    }
    Some((i64::from(max_attempts) - used).max(0))
}

/// Check whether a user may open a new attempt
pub fn check_can_start(
    status: AssessmentStatus,
    question_count: i64,
    has_open_attempt: bool,
    max_attempts: i32,
    used_attempts: i64,
) -> Result<(), &'static str> {
    if status != AssessmentStatus::Published {
        return Err("Assessment is not available");
    }
    if question_count == 0 {
        return Err("Assessment has no questions");
    }
    if has_open_attempt {
        return Err("You already have an attempt in progress");
    }
    if attempts_remaining(max_attempts, used_attempts) == Some(0) {
        return Err("Maximum number of attempts reached");
    }
    Ok(())
}

/// Whether a timed attempt has run out of time
pub fn is_time_expired(
    started_at: DateTime<Utc>,
    time_limit_minutes: Option<i32>,
    now: DateTime<Utc>,
) -> bool {
    match time_limit_minutes {
        Some(limit) if limit > 0 => now > started_at + Duration::minutes(i64::from(limit)),
        _ => false,
    }
}

/// Validate a question's option set; `correct_flags` holds `is_correct` per option
pub fn validate_question(
    question_type: QuestionType,
    correct_flags: &[bool],
) -> Result<(), &'static str> {
    let correct = correct_flags.iter().filter(|c| **c).count();

    if question_type.requires_manual_grading() {
        if !correct_flags.is_empty() {
            return Err("Free-text questions cannot have answer options");
        }
        return Ok(());
    }

    if correct_flags.len() < 2 {
        return Err("Question must have at least two answer options");
    }

    match question_type {
        QuestionType::TrueFalse if correct_flags.len() != 2 => {
            Err("True/false questions must have exactly two options")
        }
        QuestionType::SingleChoice | QuestionType::TrueFalse if correct != 1 => {
            Err("Question must have exactly one correct answer")
        }
        _ if correct == 0 => Err("Question must have at least one correct answer"),
        _ => Ok(()),
    }
}

/// Whether a submitted attempt waits for an instructor. Only free-text answers
/// that were actually given and not yet scored hold it back; blank ones score 0.
pub fn awaits_manual_grading(ungraded_answer_types: &[QuestionType]) -> bool {
    ungraded_answer_types
        .iter()
        .any(QuestionType::requires_manual_grading)
}

/// Validate points awarded by an instructor for a free-text answer
pub fn validate_manual_points(points: Decimal, max_points: Decimal) -> Result<(), &'static str> {
    if points < Decimal::ZERO || points > max_points {
        return Err("Awarded points must be between 0 and the question value");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_single_choice() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(grade_objective(QuestionType::SingleChoice, &[a], &[a]));
        assert!(!grade_objective(QuestionType::SingleChoice, &[b], &[a]));
        assert!(!grade_objective(QuestionType::SingleChoice, &[], &[a]));
    }

    #[test]
    fn test_grade_multiple_choice_is_set_equality() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert!(grade_objective(QuestionType::MultipleChoice, &[b, a], &[a, b]));
        assert!(!grade_objective(QuestionType::MultipleChoice, &[a], &[a, b]));
        assert!(!grade_objective(QuestionType::MultipleChoice, &[a, b, c], &[a, b]));
    }

    #[test]
    fn test_grade_ordering_is_sequence() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        assert!(grade_objective(QuestionType::Ordering, &[a, b], &[a, b]));
        assert!(!grade_objective(QuestionType::Ordering, &[b, a], &[a, b]));
    }

    #[test]
    fn test_grade_attempt() {
        let outcome = grade_attempt(Decimal::from(8), Decimal::from(10), 80);
        assert_eq!(outcome.score, Decimal::from(80));
        assert!(outcome.passed);

        let outcome = grade_attempt(Decimal::from(7), Decimal::from(10), 80);
        assert!(!outcome.passed);

        let outcome = grade_attempt(Decimal::ZERO, Decimal::ZERO, 0);
        assert_eq!(outcome.score, Decimal::ZERO);
        assert!(!outcome.passed);
    }

    #[test]
    fn test_can_start() {
        assert!(check_can_start(AssessmentStatus::Published, 5, false, 3, 2).is_ok());
        assert!(check_can_start(AssessmentStatus::Draft, 5, false, 3, 0).is_err());
        assert!(check_can_start(AssessmentStatus::Published, 0, false, 3, 0).is_err());
        assert!(check_can_start(AssessmentStatus::Published, 5, true, 3, 0).is_err());
        assert!(check_can_start(AssessmentStatus::Published, 5, false, 3, 3).is_err());
        assert!(check_can_start(AssessmentStatus::Published, 5, false, 0, 50).is_ok());
    }

    #[test]
    fn test_time_limit() {
        let start = Utc::now();
        assert!(!is_time_expired(start, None, start + Duration::hours(5)));
        assert!(!is_time_expired(start, Some(30), start + Duration::minutes(30)));
        assert!(is_time_expired(start, Some(30), start + Duration::minutes(31)));
    }

    #[test]
    fn test_validate_question() {
        assert!(validate_question(QuestionType::SingleChoice, &[true, false, false]).is_ok());
        assert!(validate_question(QuestionType::SingleChoice, &[true, true]).is_err());
        assert!(validate_question(QuestionType::MultipleChoice, &[true, true, false]).is_ok());
        assert!(validate_question(QuestionType::MultipleChoice, &[false, false]).is_err());
        assert!(validate_question(QuestionType::TrueFalse, &[true, false]).is_ok());
        assert!(validate_question(QuestionType::TrueFalse, &[true, false, false]).is_err());
        assert!(validate_question(QuestionType::Essay, &[]).is_ok());
        assert!(validate_question(QuestionType::Essay, &[true]).is_err());
        assert!(validate_question(QuestionType::Matching, &[true]).is_err());
    }

    #[test]
    fn test_answer_shuffle_rules() {
        assert!(QuestionType::SingleChoice.allows_answer_shuffle());
        assert!(!QuestionType::TrueFalse.allows_answer_shuffle());
        assert!(!QuestionType::Ordering.allows_answer_shuffle());
        assert!(!QuestionType::Essay.allows_answer_shuffle());
    }
}
