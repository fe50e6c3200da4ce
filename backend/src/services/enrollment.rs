//! Enrollment and lesson progress service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    clamp_percent, enrollment_progress, is_completion_transition, is_lesson_completed,
    missing_prerequisites, next_enrollment_status, CourseStatus, CourseType, EnrollmentStatus, EvidenceType,
    LessonType, NotificationChannel, NotificationType,
};
use shared::types::{PaginatedResponse, Pagination};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::gamification::GamificationService;
use crate::services::learning_path::LearningPathService;
use crate::services::notification::{NotificationService, SendNotification};

/// Enrollment service
#[derive(Clone)]
pub struct EnrollmentService {
    db: PgPool,
}

/// Enrollment record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Enrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub status: EnrollmentStatus,
    pub progress: Decimal,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Enrollment with course summary
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EnrollmentSummary {
    pub id: Uuid,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub course_code: String,
    pub course_title: String,
    pub course_type: CourseType,
    pub duration_hours: Decimal,
    pub status: EnrollmentStatus,
    pub progress: Decimal,
    pub due_date: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Progress on a single lesson
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LessonProgress {
    pub id: Uuid,
    pub enrollment_id: Uuid,
    pub lesson_id: Uuid,
    pub is_completed: bool,
    pub progress_percent: Decimal,
    pub time_spent_seconds: i64,
    pub last_position: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Lesson outline row with the learner's progress
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LessonOutline {
    pub lesson_id: Uuid,
    pub module_id: Uuid,
    pub module_title: String,
    pub title: String,
    pub lesson_type: LessonType,
    pub duration_minutes: i32,
    pub is_mandatory: bool,
    pub is_offline_available: bool,
    pub progress_id: Option<Uuid>,
    pub is_completed: Option<bool>,
    pub progress_percent: Option<Decimal>,
    pub time_spent_seconds: Option<i64>,
    pub last_position: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Enrollment with per-lesson progress
#[derive(Debug, Serialize)]
pub struct EnrollmentDetail {
    #[serde(flatten)]
    pub enrollment: Enrollment,
    pub course_code: String,
    pub course_title: String,
    pub lessons: Vec<LessonOutline>,
    pub total_time_spent_seconds: i64,
}

/// Evidence attached to lesson progress
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LessonEvidence {
    pub id: Uuid,
    pub lesson_progress_id: Uuid,
    pub evidence_type: EvidenceType,
    pub file_url: String,
    pub notes: Option<String>,
    pub is_verified: bool,
    pub verified_by: Option<Uuid>,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Input for enrolling a user
#[derive(Debug, Deserialize)]
pub struct EnrollInput {
    /// Defaults to the current user
    pub user_id: Option<Uuid>,
    pub course_id: Uuid,
    pub due_date: Option<DateTime<Utc>>,
}

/// Input for a lesson progress update
#[derive(Debug, Deserialize, Validate)]
pub struct LessonProgressInput {
    pub lesson_id: Uuid,
    pub progress_percent: Option<Decimal>,
    #[validate(range(min = 0))]
    pub time_spent_seconds: Option<i64>,
    #[validate(length(max = 500))]
    pub last_position: Option<String>,
    pub completed: Option<bool>,
}

/// Input for uploading evidence
#[derive(Debug, Deserialize, Validate)]
pub struct EvidenceInput {
    pub evidence_type: EvidenceType,
    #[validate(url)]
    pub file_url: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Filters for enrollment listings
#[derive(Debug, Default, Deserialize)]
pub struct EnrollmentFilters {
    pub user_id: Option<Uuid>,
    pub course_id: Option<Uuid>,
    pub status: Option<EnrollmentStatus>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

/// Result of a progress update
#[derive(Debug, Serialize)]
pub struct ProgressUpdate {
    pub lesson_progress: LessonProgress,
    pub enrollment: Enrollment,
}

const ENROLLMENT_COLUMNS: &str = r#"
    id, user_id, course_id, status, progress, due_date, assigned_by,
    started_at, completed_at, created_at, updated_at
"#;

const PROGRESS_COLUMNS: &str = r#"
    id, enrollment_id, lesson_id, is_completed, progress_percent, time_spent_seconds,
    last_position, completed_at, created_at, updated_at
"#;

const SUMMARY_SELECT: &str = r#"
    SELECT e.id, e.user_id, e.course_id, c.code AS course_code, c.title AS course_title,
           c.course_type, c.duration_hours, e.status, e.progress, e.due_date,
           e.started_at, e.completed_at, e.created_at
    FROM enrollments e
    JOIN courses c ON c.id = e.course_id
"#;

impl EnrollmentService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get an enrollment
    pub async fn get_enrollment(&self, enrollment_id: Uuid) -> AppResult<Enrollment> {
        sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {} FROM enrollments WHERE id = $1",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrollment".to_string()))
    }

    // ========================================================================
    // Enrollment
    // ========================================================================

    /// Enroll a user in a published course whose prerequisites they completed
    pub async fn enroll(
        &self,
        user_id: Uuid,
        course_id: Uuid,
        due_date: Option<DateTime<Utc>>,
        assigned_by: Option<Uuid>,
    ) -> AppResult<Enrollment> {
        let (status, title) = sqlx::query_as::<_, (CourseStatus, String)>(
            "SELECT status, title FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course".to_string()))?;

        if status != CourseStatus::Published {
            return Err(AppError::rule("Course is not published"));
        }

        let required = sqlx::query_scalar::<_, String>(
            r#"
            SELECT c.code
            FROM course_prerequisites cp
            JOIN courses c ON c.id = cp.prerequisite_id
            WHERE cp.course_id = $1
            ORDER BY c.code
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;

        if !required.is_empty() {
            let completed = sqlx::query_scalar::<_, String>(
                r#"
                SELECT c.code
                FROM enrollments e
                JOIN courses c ON c.id = e.course_id
                WHERE e.user_id = $1 AND e.status = 'completed'
                "#,
            )
            .bind(user_id)
            .fetch_all(&self.db)
            .await?;

            let missing = missing_prerequisites(&required, &completed);
            if !missing.is_empty() {
                return Err(AppError::PrerequisitesNotMet(
                    missing.into_iter().map(String::from).collect(),
                ));
            }
        }

        let existing = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {} FROM enrollments WHERE user_id = $1 AND course_id = $2",
            ENROLLMENT_COLUMNS
        ))
        .bind(user_id)
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?;

        let enrollment = match existing {
            Some(enrollment) if !enrollment.status.resets_on_reenroll() => return Ok(enrollment),
            Some(enrollment) => {
                let mut tx = self.db.begin().await?;
                sqlx::query("DELETE FROM lesson_progress WHERE enrollment_id = $1")
                    .bind(enrollment.id)
                    .execute(&mut *tx)
                    .await?;
                let reset = sqlx::query_as::<_, Enrollment>(&format!(
                    r#"
                    UPDATE enrollments SET
                        status = 'enrolled',
                        progress = 0,
                        due_date = $2,
                        assigned_by = $3,
                        started_at = NULL,
                        completed_at = NULL,
                        updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    ENROLLMENT_COLUMNS
                ))
                .bind(enrollment.id)
                .bind(due_date)
                .bind(assigned_by)
                .fetch_one(&mut *tx)
                .await?;
                tx.commit().await?;
                tracing::info!(enrollment_id = %reset.id, previous = ?enrollment.status, "Enrollment reset");
                reset
            }
            None => {
                let created = sqlx::query_as::<_, Enrollment>(&format!(
                    r#"
                    INSERT INTO enrollments (user_id, course_id, due_date, assigned_by)
                    VALUES ($1, $2, $3, $4)
                    RETURNING {}
                    "#,
                    ENROLLMENT_COLUMNS
                ))
                .bind(user_id)
                .bind(course_id)
                .bind(due_date)
                .bind(assigned_by)
                .fetch_one(&self.db)
                .await?;
                tracing::info!(enrollment_id = %created.id, user_id = %user_id, course_id = %course_id, "User enrolled");
                created
            }
        };

        if assigned_by.is_some_and(|by| by != user_id) {
            let due = due_date
                .map(|d| d.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| "-".to_string());
            NotificationService::new(self.db.clone())
                .send(
                    SendNotification::new(
                        user_id,
                        NotificationType::CourseAssigned,
                        NotificationChannel::InApp,
                    )
                    .with("course_title", &title)
                    .with("due_date", due)
                    .action_url(format!("/enrollments/{}", enrollment.id)),
                )
                .await?;
        }

        Ok(enrollment)
    }

    /// Drop an enrollment
    pub async fn drop_enrollment(&self, enrollment_id: Uuid) -> AppResult<Enrollment> {
        let enrollment = self.get_enrollment(enrollment_id).await?;
        match enrollment.status {
            EnrollmentStatus::Completed => {
                return Err(AppError::InvalidStateTransition(
                    "Completed enrollments cannot be dropped".to_string(),
                ))
            }
            EnrollmentStatus::Dropped => {
                return Err(AppError::InvalidStateTransition(
                    "Enrollment is already dropped".to_string(),
                ))
            }
            _ => {}
        }

        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            "UPDATE enrollments SET status = 'dropped', updated_at = NOW() WHERE id = $1 RETURNING {}",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .fetch_one(&self.db)
        .await?;
        Ok(enrollment)
    }

    // ========================================================================
    // Progress
    // ========================================================================

    /// Record progress on a lesson and recompute the enrollment
    pub async fn update_lesson_progress(
        &self,
        enrollment_id: Uuid,
        input: LessonProgressInput,
    ) -> AppResult<ProgressUpdate> {
        input.validate()?;
        let enrollment = self.get_enrollment(enrollment_id).await?;
        if matches!(
            enrollment.status,
            EnrollmentStatus::Expired | EnrollmentStatus::Dropped
        ) {
            return Err(AppError::rule("Enrollment is not active"));
        }

        self.ensure_lesson_in_course(enrollment.course_id, input.lesson_id)
            .await?;

        let percent = clamp_percent(input.progress_percent.unwrap_or(Decimal::ZERO));
        let completed = is_lesson_completed(input.completed.unwrap_or(false), percent);
        let percent = if completed { Decimal::from(100) } else { percent };

        let lesson_progress = sqlx::query_as::<_, LessonProgress>(&format!(
            r#"
            INSERT INTO lesson_progress (
                enrollment_id, lesson_id, is_completed, progress_percent,
                time_spent_seconds, last_position, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $3 THEN NOW() END)
            ON CONFLICT (enrollment_id, lesson_id) DO UPDATE SET
                is_completed = lesson_progress.is_completed OR EXCLUDED.is_completed,
                progress_percent = GREATEST(lesson_progress.progress_percent, EXCLUDED.progress_percent),
                time_spent_seconds = lesson_progress.time_spent_seconds + EXCLUDED.time_spent_seconds,
                last_position = COALESCE(EXCLUDED.last_position, lesson_progress.last_position),
                completed_at = COALESCE(lesson_progress.completed_at, EXCLUDED.completed_at),
                updated_at = NOW()
            RETURNING {}
            "#,
            PROGRESS_COLUMNS
        ))
        .bind(enrollment_id)
        .bind(input.lesson_id)
        .bind(completed)
        .bind(percent)
        .bind(input.time_spent_seconds.unwrap_or(0))
        .bind(&input.last_position)
        .fetch_one(&self.db)
        .await?;

        let enrollment = self.recalculate_progress(enrollment_id).await?;

        Ok(ProgressUpdate {
            lesson_progress,
            enrollment,
        })
    }

    /// Recompute progress from mandatory lessons and advance the status.
    ///
    /// The enrollment row stays locked until the new status is written, so
    /// concurrent updates see each other's completion.
    pub async fn recalculate_progress(&self, enrollment_id: Uuid) -> AppResult<Enrollment> {
        let mut tx = self.db.begin().await?;

        let enrollment = sqlx::query_as::<_, Enrollment>(&format!(
            "SELECT {} FROM enrollments WHERE id = $1 FOR UPDATE",
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrollment".to_string()))?;

        let (total, completed) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE lp.is_completed)
            FROM lessons l
            JOIN course_modules m ON m.id = l.module_id
            LEFT JOIN lesson_progress lp ON lp.lesson_id = l.id AND lp.enrollment_id = $1
            WHERE m.course_id = $2 AND l.is_mandatory
            "#,
        )
        .bind(enrollment_id)
        .bind(enrollment.course_id)
        .fetch_one(&mut *tx)
        .await?;

        let progress = enrollment_progress(completed, total);
        let status = next_enrollment_status(enrollment.status, progress);
        let just_completed = is_completion_transition(enrollment.status, status);

        let updated = sqlx::query_as::<_, Enrollment>(&format!(
            r#"
            UPDATE enrollments SET
                progress = $2,
                status = $3,
                started_at = CASE WHEN $2 > 0 THEN COALESCE(started_at, NOW()) ELSE started_at END,
                completed_at = CASE WHEN $4 THEN NOW() ELSE completed_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ENROLLMENT_COLUMNS
        ))
        .bind(enrollment_id)
        .bind(progress)
        .bind(status)
        .bind(just_completed)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        if just_completed {
            tracing::info!(enrollment_id = %enrollment_id, user_id = %updated.user_id, "Course completed");
            GamificationService::new(self.db.clone())
                .on_course_completed(updated.user_id, enrollment_id)
                .await?;
            LearningPathService::new(self.db.clone())
                .recalculate_for_course(updated.user_id, updated.course_id)
                .await?;
        }

        Ok(updated)
    }

    async fn ensure_lesson_in_course(&self, course_id: Uuid, lesson_id: Uuid) -> AppResult<()> {
        let exists = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM lessons l
            JOIN course_modules m ON m.id = l.module_id
            WHERE l.id = $1 AND m.course_id = $2
            "#,
        )
        .bind(lesson_id)
        .bind(course_id)
        .fetch_one(&self.db)
        .await?;
        if exists == 0 {
            return Err(AppError::NotFound("Lesson".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Evidence
    // ========================================================================

    /// Owner of the enrollment behind a lesson progress row
    pub async fn progress_owner(&self, lesson_progress_id: Uuid) -> AppResult<Uuid> {
        sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT e.user_id
            FROM lesson_progress lp
            JOIN enrollments e ON e.id = lp.enrollment_id
            WHERE lp.id = $1
            "#,
        )
        .bind(lesson_progress_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Lesson progress".to_string()))
    }

    /// Attach evidence (photo, attendance sheet, external certificate) to a lesson
    pub async fn upload_evidence(
        &self,
        lesson_progress_id: Uuid,
        input: EvidenceInput,
    ) -> AppResult<LessonEvidence> {
        input.validate()?;
        self.progress_owner(lesson_progress_id).await?;

        let evidence = sqlx::query_as::<_, LessonEvidence>(
            r#"
            INSERT INTO lesson_evidence (lesson_progress_id, evidence_type, file_url, notes)
            VALUES ($1, $2, $3, $4)
            RETURNING id, lesson_progress_id, evidence_type, file_url, notes,
                      is_verified, verified_by, verified_at, created_at
            "#,
        )
        .bind(lesson_progress_id)
        .bind(input.evidence_type)
        .bind(&input.file_url)
        .bind(&input.notes)
        .fetch_one(&self.db)
        .await?;
        Ok(evidence)
    }

    /// Verify evidence; the lesson counts as completed once verified
    pub async fn verify_evidence(
        &self,
        evidence_id: Uuid,
        verified_by: Uuid,
    ) -> AppResult<LessonEvidence> {
        let evidence = sqlx::query_as::<_, LessonEvidence>(
            r#"
            UPDATE lesson_evidence SET
                is_verified = true, verified_by = $2, verified_at = NOW()
            WHERE id = $1 AND NOT is_verified
            RETURNING id, lesson_progress_id, evidence_type, file_url, notes,
                      is_verified, verified_by, verified_at, created_at
            "#,
        )
        .bind(evidence_id)
        .bind(verified_by)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Unverified evidence".to_string()))?;

        let enrollment_id = sqlx::query_scalar::<_, Uuid>(
            r#"
            UPDATE lesson_progress SET
                is_completed = true,
                progress_percent = 100,
                completed_at = COALESCE(completed_at, NOW()),
                updated_at = NOW()
            WHERE id = $1
            RETURNING enrollment_id
            "#,
        )
        .bind(evidence.lesson_progress_id)
        .fetch_one(&self.db)
        .await?;

        self.recalculate_progress(enrollment_id).await?;

        Ok(evidence)
    }

    /// Evidence attached to a lesson progress row
    pub async fn list_evidence(&self, lesson_progress_id: Uuid) -> AppResult<Vec<LessonEvidence>> {
        let evidence = sqlx::query_as::<_, LessonEvidence>(
            r#"
            SELECT id, lesson_progress_id, evidence_type, file_url, notes,
                   is_verified, verified_by, verified_at, created_at
            FROM lesson_evidence
            WHERE lesson_progress_id = $1
            ORDER BY created_at
            "#,
        )
        .bind(lesson_progress_id)
        .fetch_all(&self.db)
        .await?;
        Ok(evidence)
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Enrollments of a user
    pub async fn my_enrollments(
        &self,
        user_id: Uuid,
        status: Option<EnrollmentStatus>,
    ) -> AppResult<Vec<EnrollmentSummary>> {
        let enrollments = sqlx::query_as::<_, EnrollmentSummary>(&format!(
            r#"
            {}
            WHERE e.user_id = $1 AND ($2::enrollment_status IS NULL OR e.status = $2)
            ORDER BY e.due_date NULLS LAST, e.created_at DESC
            "#,
            SUMMARY_SELECT
        ))
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.db)
        .await?;
        Ok(enrollments)
    }

    /// Enrollments across users
    pub async fn list_enrollments(
        &self,
        filters: EnrollmentFilters,
    ) -> AppResult<PaginatedResponse<EnrollmentSummary>> {
        let pagination = Pagination::from_query(filters.page, filters.per_page);

        const FILTER: &str = r#"
            WHERE ($1::uuid IS NULL OR e.user_id = $1)
              AND ($2::uuid IS NULL OR e.course_id = $2)
              AND ($3::enrollment_status IS NULL OR e.status = $3)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!(
            "SELECT COUNT(*) FROM enrollments e {}",
            FILTER
        ))
        .bind(filters.user_id)
        .bind(filters.course_id)
        .bind(filters.status)
        .fetch_one(&self.db)
        .await?;

        let items = sqlx::query_as::<_, EnrollmentSummary>(&format!(
            "{} {} ORDER BY e.created_at DESC LIMIT $4 OFFSET $5",
            SUMMARY_SELECT, FILTER
        ))
        .bind(filters.user_id)
        .bind(filters.course_id)
        .bind(filters.status)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(items, &pagination, total.max(0) as u64))
    }

    /// Enrollment with the course outline and per-lesson progress
    pub async fn detail(&self, enrollment_id: Uuid) -> AppResult<EnrollmentDetail> {
        let enrollment = self.get_enrollment(enrollment_id).await?;

        let (course_code, course_title) = sqlx::query_as::<_, (String, String)>(
            "SELECT code, title FROM courses WHERE id = $1",
        )
        .bind(enrollment.course_id)
        .fetch_one(&self.db)
        .await?;

        let lessons = sqlx::query_as::<_, LessonOutline>(
            r#"
            SELECT
                l.id AS lesson_id, m.id AS module_id, m.title AS module_title,
                l.title, l.lesson_type, l.duration_minutes, l.is_mandatory, l.is_offline_available,
                lp.id AS progress_id, lp.is_completed, lp.progress_percent,
                lp.time_spent_seconds, lp.last_position, lp.completed_at
            FROM lessons l
            JOIN course_modules m ON m.id = l.module_id
            LEFT JOIN lesson_progress lp ON lp.lesson_id = l.id AND lp.enrollment_id = $1
            WHERE m.course_id = $2
            ORDER BY m.sort_order, l.sort_order
            "#,
        )
        .bind(enrollment_id)
        .bind(enrollment.course_id)
        .fetch_all(&self.db)
        .await?;

        let total_time_spent_seconds = lessons
            .iter()
            .filter_map(|l| l.time_spent_seconds)
            .sum();

        Ok(EnrollmentDetail {
            enrollment,
            course_code,
            course_title,
            lessons,
            total_time_spent_seconds,
        })
    }
}
