//! Assessment grading tests
//!
//! Property-based and unit tests for:
//! - Objective question grading
//! - Attempt scoring and the pass threshold
//! - Attempt allowance and time limits

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    attempts_remaining, awaits_manual_grading, check_can_start, grade_attempt, grade_objective,
    is_time_expired, validate_manual_points, validate_question, AssessmentStatus, QuestionType,
};
use uuid::Uuid;

// ============================================================================
// Property Test Strategies
// ============================================================================

fn ids(n: usize) -> Vec<Uuid> {
    (0..n).map(|_| Uuid::new_v4()).collect()
}

fn choice_type_strategy() -> impl Strategy<Value = QuestionType> {
    prop_oneof![
        Just(QuestionType::SingleChoice),
        Just(QuestionType::MultipleChoice),
        Just(QuestionType::TrueFalse),
        Just(QuestionType::Matching),
    ]
}

/// Points as hundredths, 0.00..=500.00
fn points_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=50_000).prop_map(|cents| Decimal::new(cents, 2))
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Selecting exactly the correct options in any order scores, for set-based types
    #[test]
    fn test_choice_grading_ignores_order(
        question_type in choice_type_strategy(),
        n in 1usize..6,
        rotation in 0usize..6,
    ) {
        let correct = ids(n);
        let mut selected = correct.clone();
        selected.rotate_left(rotation % n);
        prop_assert!(grade_objective(question_type, &selected, &correct));
    }

    /// A missing or extra option makes the answer wrong
    #[test]
    fn test_choice_grading_requires_exact_set(
        question_type in choice_type_strategy(),
        n in 2usize..6,
    ) {
        let correct = ids(n);
        let partial = &correct[..n - 1];
        prop_assert!(!grade_objective(question_type, partial, &correct));

        let mut extra = correct.clone();
        extra.push(Uuid::new_v4());
        prop_assert!(!grade_objective(question_type, &extra, &correct));
    }

    /// Score is always a percentage and passing follows the threshold
    #[test]
    fn test_attempt_score_bounds(
        earned in points_strategy(),
        total in points_strategy(),
        passing in 0i32..=100,
    ) {
        let outcome = grade_attempt(earned, total, passing);
        prop_assert!(outcome.score >= Decimal::ZERO);
        prop_assert!(outcome.score <= Decimal::from(100));
        if total > Decimal::ZERO {
            prop_assert_eq!(outcome.passed, outcome.score >= Decimal::from(passing));
        } else {
            prop_assert!(!outcome.passed);
        }
    }

    /// Remaining attempts never go negative and unlimited stays unlimited
    #[test]
    fn test_attempts_remaining_bounds(max in -2i32..10, used in 0i64..20) {
        match attempts_remaining(max, used) {
            None => prop_assert!(max <= 0),
            Some(left) => {
                prop_assert!(max > 0);
                prop_assert!(left >= 0);
                prop_assert!(left <= i64::from(max));
            }
        }
    }

    /// Manual grades must lie within the question's points
    #[test]
    fn test_manual_points_within_max(points in points_strategy(), max in points_strategy()) {
        let result = validate_manual_points(points, max);
        prop_assert_eq!(result.is_ok(), points <= max);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_ordering_question_compares_sequence() {
    let correct = ids(3);
    let mut swapped = correct.clone();
    swapped.swap(0, 2);
    assert!(grade_objective(QuestionType::Ordering, &correct, &correct));
    assert!(!grade_objective(QuestionType::Ordering, &swapped, &correct));
}

#[test]
fn test_free_text_never_auto_graded() {
    let correct = ids(1);
    assert!(!grade_objective(QuestionType::ShortAnswer, &correct, &correct));
    assert!(!grade_objective(QuestionType::Essay, &correct, &correct));
}

#[test]
fn test_empty_selection_is_wrong() {
    assert!(!grade_objective(QuestionType::SingleChoice, &[], &ids(1)));
}

#[test]
fn test_default_pass_threshold() {
    let passed = grade_attempt(Decimal::from(8), Decimal::from(10), 80);
    assert_eq!(passed.score, Decimal::from(80));
    assert!(passed.passed);

    let failed = grade_attempt(Decimal::new(79, 1), Decimal::from(10), 80);
    assert!(!failed.passed);
}

#[test]
fn test_start_rules() {
    assert!(check_can_start(AssessmentStatus::Published, 5, false, 3, 2).is_ok());
    assert_eq!(
        check_can_start(AssessmentStatus::Draft, 5, false, 3, 0),
        Err("Assessment is not available")
    );
    assert_eq!(
        check_can_start(AssessmentStatus::Published, 0, false, 3, 0),
        Err("Assessment has no questions")
    );
    assert!(check_can_start(AssessmentStatus::Published, 5, true, 3, 0).is_err());
    assert_eq!(
        check_can_start(AssessmentStatus::Published, 5, false, 3, 3),
        Err("Maximum number of attempts reached")
    );
    assert!(check_can_start(AssessmentStatus::Published, 5, false, 0, 50).is_ok());
}

#[test]
fn test_time_limit() {
    let started = Utc.with_ymd_and_hms(2025, 5, 1, 8, 0, 0).unwrap();
    assert!(!is_time_expired(started, Some(30), started + Duration::minutes(30)));
    assert!(is_time_expired(started, Some(30), started + Duration::minutes(31)));
    assert!(!is_time_expired(started, None, started + Duration::days(3)));
}

#[test]
fn test_question_option_rules() {
    assert!(validate_question(QuestionType::SingleChoice, &[false, true, false]).is_ok());
    assert!(validate_question(QuestionType::SingleChoice, &[true, true]).is_err());
    assert!(validate_question(QuestionType::MultipleChoice, &[false, false]).is_err());
    assert!(validate_question(QuestionType::Essay, &[]).is_ok());
}

#[test]
fn test_blank_essay_does_not_hold_grading() {
    // Only the single choice answer was recorded and it is already scored
    assert!(!awaits_manual_grading(&[]));
    // An objective answer never waits for review
    assert!(!awaits_manual_grading(&[QuestionType::SingleChoice]));
    // A written essay answer does
    assert!(awaits_manual_grading(&[QuestionType::Essay]));
    assert!(awaits_manual_grading(&[
        QuestionType::MultipleChoice,
        QuestionType::ShortAnswer
    ]));
}
