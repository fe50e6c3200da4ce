//! Gamification service: points ledger, streaks, levels, badges and leaderboards

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    assessment_points, check_deduction, course_badges, level_for_points, next_streak,
    scaled_points, LeaderboardPeriod, NotificationChannel, NotificationType, Streak,
    TransactionType, ASSESSMENT_ACE_SCORE, CERTIFICATION_POINTS, COURSE_COMPLETION_POINTS,
};
use shared::types::{PaginatedResponse, Pagination};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::notification::{NotificationService, SendNotification};

/// Gamification service
#[derive(Clone)]
pub struct GamificationService {
    db: PgPool,
}

/// Point category
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PointCategory {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub multiplier: Decimal,
    pub is_active: bool,
}

/// Ledger entry
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PointTransaction {
    pub id: Uuid,
    pub user_id: Uuid,
    pub category_id: Option<Uuid>,
    pub transaction_type: TransactionType,
    pub points: i32,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Running point totals of a user
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserPoints {
    pub user_id: Uuid,
    pub total_points: i32,
    pub available_points: i32,
    pub weekly_points: i32,
    pub monthly_points: i32,
    pub level: Option<i32>,
    pub current_streak: i32,
    pub longest_streak: i32,
    pub last_activity_date: Option<NaiveDate>,
    pub updated_at: DateTime<Utc>,
}

/// Level threshold
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Level {
    pub number: i32,
    pub name: String,
    pub min_points: i32,
}

/// Badge definition
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Badge {
    pub id: Uuid,
    pub slug: String,
    pub name: String,
    pub description: String,
    pub points_reward: i32,
    pub is_active: bool,
}

/// Badge earned by a user
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EarnedBadge {
    pub slug: String,
    pub name: String,
    pub description: String,
    pub reference_id: Option<Uuid>,
    pub earned_at: DateTime<Utc>,
}

/// Leaderboard row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LeaderboardEntry {
    pub rank: i64,
    pub user_id: Uuid,
    pub full_name: String,
    pub points: i32,
    pub level: Option<i32>,
}

/// Personal gamification summary
#[derive(Debug, Serialize)]
pub struct UserStats {
    pub points: UserPoints,
    pub level: Option<Level>,
    pub next_level: Option<Level>,
    pub points_to_next_level: Option<i32>,
    pub rank: i64,
    pub badges: Vec<EarnedBadge>,
}

/// Input for a manual award
#[derive(Debug, Deserialize)]
pub struct AwardPointsInput {
    pub user_id: Uuid,
    pub category: String,
    pub points: i32,
    pub description: String,
}

/// Input for a deduction
#[derive(Debug, Deserialize)]
pub struct DeductPointsInput {
    pub user_id: Uuid,
    pub points: i32,
    pub description: String,
}

/// Leaderboard query
#[derive(Debug, Default, Deserialize)]
pub struct LeaderboardQuery {
    pub period: Option<LeaderboardPeriod>,
    pub limit: Option<i64>,
}

const TRANSACTION_COLUMNS: &str = r#"
    id, user_id, category_id, transaction_type, points, description,
    reference_type, reference_id, created_at
"#;

const POINTS_COLUMNS: &str = r#"
    user_id, total_points, available_points, weekly_points, monthly_points, level,
    current_streak, longest_streak, last_activity_date, updated_at
"#;

/// What a ledger entry refers to
#[derive(Debug, Clone, Copy)]
pub struct PointsReference<'a> {
    pub kind: &'a str,
    pub id: Uuid,
}

impl GamificationService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Points
    // ========================================================================

    /// Award points in a category, applying its multiplier
    pub async fn award_points(
        &self,
        user_id: Uuid,
        category_slug: &str,
        base_points: i32,
        description: &str,
        reference: Option<PointsReference<'_>>,
    ) -> AppResult<PointTransaction> {
        let category = sqlx::query_as::<_, PointCategory>(
            "SELECT id, slug, name, multiplier, is_active FROM point_categories WHERE slug = $1",
        )
        .bind(category_slug)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Point category".to_string()))?;

        if !category.is_active {
            return Err(AppError::rule("Point category is not active"));
        }

        let points = scaled_points(base_points, category.multiplier);

        let mut tx = self.db.begin().await?;
        let transaction = credit(
            &mut tx,
            user_id,
            Some(category.id),
            TransactionType::Earned,
            points,
            description,
            reference,
        )
        .await?;
        tx.commit().await?;

        tracing::debug!(user_id = %user_id, category = category_slug, points, "Points awarded");

        Ok(transaction)
    }

    /// Deduct available points (total points are never reduced)
    pub async fn deduct_points(
        &self,
        user_id: Uuid,
        amount: i32,
        description: &str,
    ) -> AppResult<PointTransaction> {
        let mut tx = self.db.begin().await?;
        let points = lock_points(&mut tx, user_id).await?;

        check_deduction(points.available_points, amount).map_err(AppError::rule)?;

        sqlx::query(
            "UPDATE user_points SET available_points = available_points - $2, updated_at = NOW() WHERE user_id = $1",
        )
        .bind(user_id)
        .bind(amount)
        .execute(&mut *tx)
        .await?;

        let transaction = sqlx::query_as::<_, PointTransaction>(&format!(
            r#"
            INSERT INTO point_transactions (user_id, transaction_type, points, description)
            VALUES ($1, 'deducted', $2, $3)
            RETURNING {}
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .bind(-amount)
        .bind(description)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(transaction)
    }

    // ========================================================================
    // Event hooks
    // ========================================================================

    /// Points and badges for a completed course
    pub async fn on_course_completed(&self, user_id: Uuid, enrollment_id: Uuid) -> AppResult<()> {
        self.award_points(
            user_id,
            "training",
            COURSE_COMPLETION_POINTS,
            "Course completed",
            Some(PointsReference {
                kind: "enrollment",
                id: enrollment_id,
            }),
        )
        .await?;
        self.check_badges(user_id, Some(enrollment_id)).await?;
        Ok(())
    }

    /// Points and badges for a graded assessment attempt
    pub async fn on_assessment_graded(
        &self,
        user_id: Uuid,
        attempt_id: Uuid,
        score: Decimal,
    ) -> AppResult<()> {
        self.award_points(
            user_id,
            "assessment",
            assessment_points(score),
            "Assessment graded",
            Some(PointsReference {
                kind: "assessment_attempt",
                id: attempt_id,
            }),
        )
        .await?;
        if score >= Decimal::from(ASSESSMENT_ACE_SCORE) {
            self.award_badge(user_id, "assessment-ace", Some(attempt_id))
                .await?;
        }
        Ok(())
    }

    /// Points and badges for an issued certificate
    pub async fn on_certificate_issued(&self, user_id: Uuid, certificate_id: Uuid) -> AppResult<()> {
        self.award_points(
            user_id,
            "certification",
            CERTIFICATION_POINTS,
            "Certificate earned",
            Some(PointsReference {
                kind: "certificate",
                id: certificate_id,
            }),
        )
        .await?;
        self.check_badges(user_id, Some(certificate_id)).await?;
        Ok(())
    }

    // ========================================================================
    // Badges
    // ========================================================================

    /// Award a badge once per user; returns the badge only when newly earned
    pub async fn award_badge(
        &self,
        user_id: Uuid,
        slug: &str,
        reference_id: Option<Uuid>,
    ) -> AppResult<Option<Badge>> {
        let badge = sqlx::query_as::<_, Badge>(
            "SELECT id, slug, name, description, points_reward, is_active FROM badges WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Badge".to_string()))?;

        if !badge.is_active {
            return Ok(None);
        }

        let mut tx = self.db.begin().await?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO user_badges (user_id, badge_id, reference_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, badge_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(badge.id)
        .bind(reference_id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted == 0 {
            return Ok(None);
        }

        if badge.points_reward > 0 {
            credit(
                &mut tx,
                user_id,
                None,
                TransactionType::Bonus,
                badge.points_reward,
                &format!("Badge earned: {}", badge.name),
                Some(PointsReference {
                    kind: "badge",
                    id: badge.id,
                }),
            )
            .await?;
        }

        tx.commit().await?;

        tracing::info!(user_id = %user_id, badge = %badge.slug, "Badge earned");

        NotificationService::new(self.db.clone())
            .send(
                SendNotification::new(user_id, NotificationType::BadgeEarned, NotificationChannel::InApp)
                    .with("badge_name", &badge.name)
                    .titled(&badge.name, &badge.description),
            )
            .await?;

        Ok(Some(badge))
    }

    /// Evaluate course and certificate badges from the user's counters
    pub async fn check_badges(
        &self,
        user_id: Uuid,
        reference_id: Option<Uuid>,
    ) -> AppResult<Vec<Badge>> {
        let (completed, certificates) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM enrollments WHERE user_id = $1 AND status = 'completed'),
                (SELECT COUNT(*) FROM certificates WHERE user_id = $1 AND status = 'issued')
            "#,
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let mut earned = Vec::new();
        for slug in course_badges(completed, certificates) {
            if let Some(badge) = self.award_badge(user_id, slug, reference_id).await? {
                earned.push(badge);
            }
        }
        Ok(earned)
    }

    /// Badge catalog
    pub async fn list_badges(&self) -> AppResult<Vec<Badge>> {
        let badges = sqlx::query_as::<_, Badge>(
            "SELECT id, slug, name, description, points_reward, is_active FROM badges WHERE is_active = true ORDER BY points_reward, name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(badges)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Top users for a period
    pub async fn leaderboard(&self, query: LeaderboardQuery) -> AppResult<Vec<LeaderboardEntry>> {
        let period = query.period.unwrap_or_default();
        let limit = query.limit.unwrap_or(10).clamp(1, 100);
        let column = period.points_column();

        let entries = sqlx::query_as::<_, LeaderboardEntry>(&format!(
            r#"
            SELECT
                RANK() OVER (ORDER BY up.{col} DESC) AS rank,
                up.user_id,
                u.first_name || ' ' || u.last_name AS full_name,
                up.{col} AS points,
                up.level
            FROM user_points up
            JOIN users u ON u.id = up.user_id
            WHERE u.status = 'active' AND up.{col} > 0
            ORDER BY up.{col} DESC, u.last_name
            LIMIT $1
            "#,
            col = column
        ))
        .bind(limit)
        .fetch_all(&self.db)
        .await?;
        Ok(entries)
    }

    /// Points, level, rank and badges of a user
    pub async fn my_stats(&self, user_id: Uuid) -> AppResult<UserStats> {
        let points = self.get_points(user_id).await?;

        let levels = sqlx::query_as::<_, Level>(
            "SELECT number, name, min_points FROM levels ORDER BY min_points",
        )
        .fetch_all(&self.db)
        .await?;

        let level = levels
            .iter()
            .filter(|l| l.min_points <= points.total_points)
            .last()
            .cloned();
        let next_level = levels
            .iter()
            .find(|l| l.min_points > points.total_points)
            .cloned();
        let points_to_next_level = next_level
            .as_ref()
            .map(|l| l.min_points - points.total_points);

        let rank = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) + 1 FROM user_points WHERE total_points > $1",
        )
        .bind(points.total_points)
        .fetch_one(&self.db)
        .await?;

        let badges = sqlx::query_as::<_, EarnedBadge>(
            r#"
            SELECT b.slug, b.name, b.description, ub.reference_id, ub.earned_at
            FROM user_badges ub
            JOIN badges b ON b.id = ub.badge_id
            WHERE ub.user_id = $1
            ORDER BY ub.earned_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(UserStats {
            points,
            level,
            next_level,
            points_to_next_level,
            rank,
            badges,
        })
    }

    /// Point totals, creating an empty ledger if missing
    pub async fn get_points(&self, user_id: Uuid) -> AppResult<UserPoints> {
        let points = sqlx::query_as::<_, UserPoints>(&format!(
            r#"
            INSERT INTO user_points (user_id, level) VALUES ($1, 1)
            ON CONFLICT (user_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING {}
            "#,
            POINTS_COLUMNS
        ))
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;
        Ok(points)
    }

    /// Ledger history, newest first
    pub async fn history(
        &self,
        user_id: Uuid,
        page: Option<u32>,
        per_page: Option<u32>,
    ) -> AppResult<PaginatedResponse<PointTransaction>> {
        let pagination = Pagination::from_query(page, per_page);

        let total = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM point_transactions WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        let items = sqlx::query_as::<_, PointTransaction>(&format!(
            r#"
            SELECT {}
            FROM point_transactions
            WHERE user_id = $1
            ORDER BY created_at DESC
            LIMIT $2 OFFSET $3
            "#,
            TRANSACTION_COLUMNS
        ))
        .bind(user_id)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(items, &pagination, total.max(0) as u64))
    }

    /// Zero the weekly counters
    pub async fn reset_weekly(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE user_points SET weekly_points = 0, updated_at = NOW() WHERE weekly_points <> 0",
        )
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }

    /// Zero the monthly counters
    pub async fn reset_monthly(&self) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE user_points SET monthly_points = 0, updated_at = NOW() WHERE monthly_points <> 0",
        )
        .execute(&self.db)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Lock the user's ledger row, creating it on first use
async fn lock_points(tx: &mut Transaction<'_, Postgres>, user_id: Uuid) -> AppResult<UserPoints> {
    sqlx::query("INSERT INTO user_points (user_id, level) VALUES ($1, 1) ON CONFLICT (user_id) DO NOTHING")
        .bind(user_id)
        .execute(&mut **tx)
        .await?;

    let points = sqlx::query_as::<_, UserPoints>(&format!(
        "SELECT {} FROM user_points WHERE user_id = $1 FOR UPDATE",
        POINTS_COLUMNS
    ))
    .bind(user_id)
    .fetch_one(&mut **tx)
    .await?;
    Ok(points)
}

/// Record a positive ledger entry and update totals, streak and level
async fn credit(
    tx: &mut Transaction<'_, Postgres>,
    user_id: Uuid,
    category_id: Option<Uuid>,
    transaction_type: TransactionType,
    points: i32,
    description: &str,
    reference: Option<PointsReference<'_>>,
) -> AppResult<PointTransaction> {
    let current = lock_points(tx, user_id).await?;

    let today = Utc::now().date_naive();
    let streak = next_streak(
        current.last_activity_date,
        today,
        Streak {
            current: current.current_streak,
            longest: current.longest_streak,
        },
    );

    let levels = sqlx::query_as::<_, (i32, i32)>("SELECT number, min_points FROM levels")
        .fetch_all(&mut **tx)
        .await?;
    let total = current.total_points.saturating_add(points);
    let level = level_for_points(&levels, total);

    sqlx::query(
        r#"
        UPDATE user_points SET
            total_points = total_points + $2,
            available_points = available_points + $2,
            weekly_points = weekly_points + $2,
            monthly_points = monthly_points + $2,
            level = $3,
            current_streak = $4,
            longest_streak = $5,
            last_activity_date = $6,
            updated_at = NOW()
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .bind(points)
    .bind(level)
    .bind(streak.current)
    .bind(streak.longest)
    .bind(today)
    .execute(&mut **tx)
    .await?;

    let transaction = sqlx::query_as::<_, PointTransaction>(&format!(
        r#"
        INSERT INTO point_transactions (
            user_id, category_id, transaction_type, points, description, reference_type, reference_id
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        TRANSACTION_COLUMNS
    ))
    .bind(user_id)
    .bind(category_id)
    .bind(transaction_type)
    .bind(points)
    .bind(description)
    .bind(reference.map(|r| r.kind))
    .bind(reference.map(|r| r.id))
    .fetch_one(&mut **tx)
    .await?;

    Ok(transaction)
}
