//! Gamification rule tests
//!
//! Property-based and unit tests for:
//! - Point scaling and deductions
//! - Activity streaks
//! - Levels and badges

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    assessment_points, check_deduction, course_badges, level_for_points, next_streak,
    scaled_points, Streak, COURSE_EXPERT_THRESHOLD,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn multiplier_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=500).prop_map(|hundredths| Decimal::new(hundredths, 2))
}

fn date_strategy() -> impl Strategy<Value = NaiveDate> {
    (0i64..3650).prop_map(|days| NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + Duration::days(days))
}

fn streak_strategy() -> impl Strategy<Value = Streak> {
    (0i32..100, 0i32..100).prop_map(|(current, extra)| Streak {
        current,
        longest: current + extra,
    })
}

fn levels() -> Vec<(i32, i32)> {
    vec![(1, 0), (2, 500), (3, 1500), (4, 3500), (5, 7500)]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Scaling is never negative and a unit multiplier is the identity
    #[test]
    fn test_scaled_points(base in 0i32..10_000, multiplier in multiplier_strategy()) {
        prop_assert!(scaled_points(base, multiplier) >= 0);
        prop_assert_eq!(scaled_points(base, Decimal::ONE), base);
    }

    /// The longest streak never falls behind the current one
    #[test]
    fn test_longest_streak_dominates(
        today in date_strategy(),
        gap in proptest::option::of(0i64..30),
        streak in streak_strategy(),
    ) {
        let last = gap.map(|g| today - Duration::days(g));
        let next = next_streak(last, today, streak);
        prop_assert!(next.current >= 1);
        prop_assert!(next.longest >= next.current);
        prop_assert!(next.longest >= streak.longest);
    }

    /// Levels never decrease as points grow
    #[test]
    fn test_levels_are_monotonic(points in 0i32..20_000, more in 0i32..5_000) {
        let lower = level_for_points(&levels(), points);
        let higher = level_for_points(&levels(), points + more);
        prop_assert!(lower <= higher);
    }

    /// Deductions succeed exactly when positive and covered
    #[test]
    fn test_deductions(available in 0i32..1_000, amount in -100i32..1_200) {
        let ok = amount > 0 && amount <= available;
        prop_assert_eq!(check_deduction(available, amount).is_ok(), ok);
    }

    /// Assessment points follow the score bands
    #[test]
    fn test_assessment_point_bands(score in 0i64..=100) {
        let points = assessment_points(Decimal::from(score));
        let expected = if score >= 90 { 100 } else if score >= 80 { 75 } else { 50 };
        prop_assert_eq!(points, expected);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_scaling_rounds_half_away_from_zero() {
    assert_eq!(scaled_points(5, Decimal::new(15, 1)), 8);
    assert_eq!(scaled_points(100, Decimal::new(125, 2)), 125);
    assert_eq!(scaled_points(100, Decimal::ZERO), 0);
}

#[test]
fn test_streak_transitions() {
    let today = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
    let streak = Streak { current: 4, longest: 6 };

    let same_day = next_streak(Some(today), today, streak);
    assert_eq!(same_day, streak);

    let next_day = next_streak(today.pred_opt(), today, streak);
    assert_eq!(next_day, Streak { current: 5, longest: 6 });

    let after_gap = next_streak(Some(today - Duration::days(3)), today, streak);
    assert_eq!(after_gap, Streak { current: 1, longest: 6 });

    let first = next_streak(None, today, Streak { current: 0, longest: 0 });
    assert_eq!(first, Streak { current: 1, longest: 1 });
}

#[test]
fn test_level_thresholds() {
    assert_eq!(level_for_points(&levels(), 0), Some(1));
    assert_eq!(level_for_points(&levels(), 499), Some(1));
    assert_eq!(level_for_points(&levels(), 500), Some(2));
    assert_eq!(level_for_points(&levels(), 100_000), Some(5));
    assert_eq!(level_for_points(&[], 100), None);
}

#[test]
fn test_course_badges() {
    assert!(course_badges(0, 0).is_empty());
    assert_eq!(course_badges(1, 0), vec!["first-course"]);
    assert_eq!(
        course_badges(COURSE_EXPERT_THRESHOLD, 2),
        vec!["first-course", "course-expert", "certified"]
    );
}
