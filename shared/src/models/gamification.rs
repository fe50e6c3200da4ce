//! Gamification: points, streaks, levels and badges

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Points for completing a course
pub const COURSE_COMPLETION_POINTS: i32 = 100;

/// Points for receiving a certificate
pub const CERTIFICATION_POINTS: i32 = 200;

/// Completions needed for the course-expert badge
pub const COURSE_EXPERT_THRESHOLD: i64 = 10;

/// Minimum score for the assessment-ace badge
pub const ASSESSMENT_ACE_SCORE: i64 = 90;

/// Point transaction kind
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "transaction_type", rename_all = "snake_case"))]
pub enum TransactionType {
    Earned,
    Bonus,
    Deducted,
    Expired,
}

/// Leaderboard period
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum LeaderboardPeriod {
    Weekly,
    Monthly,
    #[default]
    AllTime,
}

impl LeaderboardPeriod {
    /// Column of `user_points` that ranks this period
    pub fn points_column(&self) -> &'static str {
        match self {
            LeaderboardPeriod::Weekly => "weekly_points",
            LeaderboardPeriod::Monthly => "monthly_points",
            LeaderboardPeriod::AllTime => "total_points",
        }
    }
}

/// Apply a category multiplier to a base amount, rounding half away from zero
pub fn scaled_points(base: i32, multiplier: Decimal) -> i32 {
    let scaled = Decimal::from(base.unsigned_abs()) * multiplier.max(Decimal::ZERO);
    scaled
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i32()
        .unwrap_or(i32::MAX)
}

/// Streak state after activity on `today`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Streak {
    pub current: i32,
    pub longest: i32,
}

/// Advance a streak: same day keeps it, next day extends it, a gap restarts at 1
pub fn next_streak(last_activity: Option<NaiveDate>, today: NaiveDate, streak: Streak) -> Streak {
    let current = match last_activity {
        Some(last) if last == today => streak.current.max(1),
        Some(last) if last.succ_opt() == Some(today) => streak.current + 1,
        _ => 1,
    };
    Streak {
        current,
        longest: streak.longest.max(current),
    }
}

/// Level number for a point total given `(number, min_points)` thresholds
pub fn level_for_points(levels: &[(i32, i32)], total_points: i32) -> Option<i32> {
    levels
        .iter()
        .filter(|(_, min)| *min <= total_points)
        .max_by_key(|(_, min)| *min)
        .map(|(number, _)| *number)
}

/// Points for a graded assessment
pub fn assessment_points(score: Decimal) -> i32 {
    if score >= Decimal::from(ASSESSMENT_ACE_SCORE) {
        100
    } else if score >= Decimal::from(80) {
        75
    } else {
        50
    }
}

/// Badge slugs unlocked by a user's course and certificate counters
pub fn course_badges(completed_courses: i64, certificates: i64) -> Vec<&'static str> {
    let mut badges = Vec::new();
    if completed_courses >= 1 {
        badges.push("first-course");
    }
    if completed_courses >= COURSE_EXPERT_THRESHOLD {
        badges.push("course-expert");
    }
    if certificates >= 1 {
        badges.push("certified");
    }
    badges
}

/// Check that a deduction can be covered
pub fn check_deduction(available: i32, amount: i32) -> Result<(), &'static str> {
    if amount <= 0 {
        return Err("Deduction must be positive");
    }
    if amount > available {
        return Err("Insufficient points");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn test_scaled_points() {
        assert_eq!(scaled_points(100, Decimal::new(15, 1)), 150);
        assert_eq!(scaled_points(-100, Decimal::ONE), 100);
        assert_eq!(scaled_points(5, Decimal::new(15, 1)), 8);
    }

    #[test]
    fn test_streaks() {
        let s = Streak { current: 3, longest: 5 };
        assert_eq!(
            next_streak(Some(d(2025, 1, 1)), d(2025, 1, 2), s),
            Streak { current: 4, longest: 5 }
        );
        assert_eq!(
            next_streak(Some(d(2025, 1, 2)), d(2025, 1, 2), s),
            Streak { current: 3, longest: 5 }
        );
        assert_eq!(
            next_streak(Some(d(2025, 1, 1)), d(2025, 1, 5), s),
            Streak { current: 1, longest: 5 }
        );
        assert_eq!(
            next_streak(None, d(2025, 1, 5), Streak { current: 0, longest: 0 }),
            Streak { current: 1, longest: 1 }
        );
    }

    #[test]
    fn test_levels() {
        let levels = [(1, 0), (2, 500), (3, 1500)];
        assert_eq!(level_for_points(&levels, 0), Some(1));
        assert_eq!(level_for_points(&levels, 499), Some(1));
        assert_eq!(level_for_points(&levels, 500), Some(2));
        assert_eq!(level_for_points(&levels, 10_000), Some(3));
        assert_eq!(level_for_points(&[], 10), None);
    }

    #[test]
    fn test_assessment_points() {
        assert_eq!(assessment_points(Decimal::from(95)), 100);
        assert_eq!(assessment_points(Decimal::from(80)), 75);
        assert_eq!(assessment_points(Decimal::from(40)), 50);
    }

    #[test]
    fn test_badges() {
        assert!(course_badges(0, 0).is_empty());
        assert_eq!(course_badges(1, 0), vec!["first-course"]);
        assert_eq!(
            course_badges(10, 1),
            vec!["first-course", "course-expert", "certified"]
        );
    }
}
