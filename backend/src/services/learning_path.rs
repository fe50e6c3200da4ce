//! Learning paths: ordered course sequences assigned to workers

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{
    assignment_status, is_course_locked, path_progress, AssignmentStatus, EnrollmentStatus,
    NotificationChannel, NotificationPriority, NotificationType, PathStatus,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::enrollment::EnrollmentService;
use crate::services::notification::{NotificationService, SendNotification};
use crate::services::user::{normalize_profile, UserService};

/// Learning path service
#[derive(Clone)]
pub struct LearningPathService {
    db: PgPool,
}

/// Learning path record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct LearningPath {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub target_profiles: Vec<String>,
    pub status: PathStatus,
    pub is_mandatory: bool,
    pub estimated_duration_days: Option<i32>,
    pub created_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Course slot in a path
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PathCourse {
    pub id: Uuid,
    pub path_id: Uuid,
    pub course_id: Uuid,
    pub course_code: String,
    pub course_title: String,
    pub sort_order: i32,
    pub is_required: bool,
    pub unlock_after: Option<i32>,
}

/// Path with its courses
#[derive(Debug, Serialize)]
pub struct PathDetail {
    #[serde(flatten)]
    pub path: LearningPath,
    pub courses: Vec<PathCourse>,
    pub assigned_users: i64,
}

/// Path assignment
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PathAssignment {
    pub id: Uuid,
    pub path_id: Uuid,
    pub user_id: Uuid,
    pub status: AssignmentStatus,
    pub progress: Decimal,
    pub due_date: Option<DateTime<Utc>>,
    pub assigned_by: Option<Uuid>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Assignment joined with the path name
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssignmentSummary {
    pub id: Uuid,
    pub path_id: Uuid,
    pub path_name: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub status: AssignmentStatus,
    pub progress: Decimal,
    pub due_date: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Course as seen by an assigned learner
#[derive(Debug, Serialize)]
pub struct UserPathCourse {
    #[serde(flatten)]
    pub course: PathCourse,
    pub enrollment_id: Option<Uuid>,
    pub enrollment_status: Option<EnrollmentStatus>,
    pub progress: Decimal,
    pub is_completed: bool,
    pub is_locked: bool,
}

/// Learner view of a path
#[derive(Debug, Serialize)]
pub struct UserPathDetail {
    pub path: LearningPath,
    pub assignment: PathAssignment,
    pub courses: Vec<UserPathCourse>,
}

/// Outcome of a bulk assignment
#[derive(Debug, Serialize)]
pub struct BulkAssignResult {
    pub job_profile: String,
    pub assigned: usize,
}

/// Input for creating a path
#[derive(Debug, Deserialize, Validate)]
pub struct CreatePathInput {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub target_profiles: Vec<String>,
    #[serde(default)]
    pub is_mandatory: bool,
    #[validate(range(min = 1))]
    pub estimated_duration_days: Option<i32>,
}

/// Input for updating a path
#[derive(Debug, Deserialize, Validate)]
pub struct UpdatePathInput {
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub target_profiles: Option<Vec<String>>,
    pub is_mandatory: Option<bool>,
    #[validate(range(min = 1))]
    pub estimated_duration_days: Option<i32>,
}

/// Input for adding a course to a path
#[derive(Debug, Deserialize)]
pub struct PathCourseInput {
    pub course_id: Uuid,
    pub sort_order: Option<i32>,
    #[serde(default = "default_true")]
    pub is_required: bool,
    pub unlock_after: Option<i32>,
}

fn default_true() -> bool {
    true
}

/// Input for assigning a path
#[derive(Debug, Deserialize)]
pub struct AssignPathInput {
    pub user_id: Option<Uuid>,
    pub job_profile: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
}

const PATH_COLUMNS: &str = r#"
    id, name, description, target_profiles, status, is_mandatory, estimated_duration_days,
    created_by, created_at, updated_at
"#;

const ASSIGNMENT_COLUMNS: &str = r#"
    id, path_id, user_id, status, progress, due_date, assigned_by, started_at, completed_at,
    created_at, updated_at
"#;

const ASSIGNMENT_SUMMARY_SELECT: &str = r#"
    SELECT
        pa.id, pa.path_id, lp.name AS path_name, pa.user_id,
        u.first_name || ' ' || u.last_name AS user_name,
        pa.status, pa.progress, pa.due_date, pa.completed_at
    FROM path_assignments pa
    JOIN learning_paths lp ON lp.id = pa.path_id
    JOIN users u ON u.id = pa.user_id
"#;

impl LearningPathService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Paths
    // ========================================================================

    /// Get a path
    pub async fn get_path(&self, path_id: Uuid) -> AppResult<LearningPath> {
        sqlx::query_as::<_, LearningPath>(&format!(
            "SELECT {} FROM learning_paths WHERE id = $1",
            PATH_COLUMNS
        ))
        .bind(path_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Learning path".to_string()))
    }

    /// Paths, optionally filtered by status
    pub async fn list_paths(&self, status: Option<PathStatus>) -> AppResult<Vec<LearningPath>> {
        let paths = sqlx::query_as::<_, LearningPath>(&format!(
            r#"
            SELECT {} FROM learning_paths
            WHERE ($1::path_status IS NULL OR status = $1)
            ORDER BY name
            "#,
            PATH_COLUMNS
        ))
        .bind(status)
        .fetch_all(&self.db)
        .await?;
        Ok(paths)
    }

    /// Path with its ordered courses
    pub async fn get_detail(&self, path_id: Uuid) -> AppResult<PathDetail> {
        let path = self.get_path(path_id).await?;
        let courses = self.path_courses(path_id).await?;
        let assigned_users = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM path_assignments WHERE path_id = $1",
        )
        .bind(path_id)
        .fetch_one(&self.db)
        .await?;
        Ok(PathDetail {
            path,
            courses,
            assigned_users,
        })
    }

    async fn path_courses(&self, path_id: Uuid) -> AppResult<Vec<PathCourse>> {
        let courses = sqlx::query_as::<_, PathCourse>(
            r#"
            SELECT pc.id, pc.path_id, pc.course_id, c.code AS course_code, c.title AS course_title,
                   pc.sort_order, pc.is_required, pc.unlock_after
            FROM path_courses pc
            JOIN courses c ON c.id = pc.course_id
            WHERE pc.path_id = $1
            ORDER BY pc.sort_order
            "#,
        )
        .bind(path_id)
        .fetch_all(&self.db)
        .await?;
        Ok(courses)
    }

    /// Create a draft path
    pub async fn create_path(&self, created_by: Uuid, input: CreatePathInput) -> AppResult<LearningPath> {
        input.validate()?;
        let profiles: Vec<String> = input.target_profiles.iter().map(|p| normalize_profile(p)).collect();

        let path = sqlx::query_as::<_, LearningPath>(&format!(
            r#"
            INSERT INTO learning_paths (
                name, description, target_profiles, is_mandatory, estimated_duration_days, created_by
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PATH_COLUMNS
        ))
        .bind(input.name.trim())
        .bind(input.description.unwrap_or_default())
        .bind(&profiles)
        .bind(input.is_mandatory)
        .bind(input.estimated_duration_days)
        .bind(created_by)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(path_id = %path.id, name = %path.name, "Learning path created");
        Ok(path)
    }

    /// Update path attributes
    pub async fn update_path(&self, path_id: Uuid, input: UpdatePathInput) -> AppResult<LearningPath> {
        input.validate()?;
        let profiles = input
            .target_profiles
            .map(|ps| ps.iter().map(|p| normalize_profile(p)).collect::<Vec<_>>());

        sqlx::query_as::<_, LearningPath>(&format!(
            r#"
            UPDATE learning_paths SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                target_profiles = COALESCE($4, target_profiles),
                is_mandatory = COALESCE($5, is_mandatory),
                estimated_duration_days = COALESCE($6, estimated_duration_days),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PATH_COLUMNS
        ))
        .bind(path_id)
        .bind(&input.name)
        .bind(&input.description)
        .bind(&profiles)
        .bind(input.is_mandatory)
        .bind(input.estimated_duration_days)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Learning path".to_string()))
    }

    /// Move a path to a new status; activation requires at least one course
    pub async fn set_status(&self, path_id: Uuid, status: PathStatus) -> AppResult<LearningPath> {
        let path = self.get_path(path_id).await?;
        if path.status == status {
            return Err(AppError::InvalidStateTransition(
                "Learning path already has this status".to_string(),
            ));
        }
        if status == PathStatus::Active && self.path_courses(path_id).await?.is_empty() {
            return Err(AppError::rule("Learning path has no courses"));
        }

        let path = sqlx::query_as::<_, LearningPath>(&format!(
            "UPDATE learning_paths SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PATH_COLUMNS
        ))
        .bind(path_id)
        .bind(status)
        .fetch_one(&self.db)
        .await?;
        Ok(path)
    }

    /// Add a course at the given or next position
    pub async fn add_course(&self, path_id: Uuid, input: PathCourseInput) -> AppResult<PathCourse> {
        self.get_path(path_id).await?;
        if let (Some(unlock), Some(order)) = (input.unlock_after, input.sort_order) {
            if unlock >= order {
                return Err(AppError::validation(
                    "unlock_after",
                    "A course can only depend on an earlier position",
                    "Un curso solo puede depender de una posición anterior",
                ));
            }
        }

        let id = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO path_courses (path_id, course_id, sort_order, is_required, unlock_after)
            VALUES (
                $1, $2,
                COALESCE($3, (SELECT COALESCE(MAX(sort_order), 0) + 1 FROM path_courses WHERE path_id = $1)),
                $4, $5
            )
            RETURNING id
            "#,
        )
        .bind(path_id)
        .bind(input.course_id)
        .bind(input.sort_order)
        .bind(input.is_required)
        .bind(input.unlock_after)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => {
                AppError::DuplicateEntry("Course or position already in path".to_string())
            }
            _ => AppError::DatabaseError(e),
        })?;

        self.path_courses(path_id)
            .await?
            .into_iter()
            .find(|c| c.id == id)
            .ok_or_else(|| AppError::NotFound("Path course".to_string()))
    }

    /// Remove a course from a path
    pub async fn remove_course(&self, path_id: Uuid, course_id: Uuid) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM path_courses WHERE path_id = $1 AND course_id = $2")
            .bind(path_id)
            .bind(course_id)
            .execute(&self.db)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Path course".to_string()));
        }
        Ok(())
    }

    // ========================================================================
    // Assignments
    // ========================================================================

    async fn get_assignment(&self, assignment_id: Uuid) -> AppResult<PathAssignment> {
        sqlx::query_as::<_, PathAssignment>(&format!(
            "SELECT {} FROM path_assignments WHERE id = $1",
            ASSIGNMENT_COLUMNS
        ))
        .bind(assignment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Path assignment".to_string()))
    }

    /// Assign an active path to a user and enroll them in its required courses
    pub async fn assign(
        &self,
        path_id: Uuid,
        user_id: Uuid,
        due_date: Option<DateTime<Utc>>,
        assigned_by: Option<Uuid>,
    ) -> AppResult<PathAssignment> {
        let path = self.get_path(path_id).await?;
        if path.status != PathStatus::Active {
            return Err(AppError::rule("Learning path is not active"));
        }

        let existing = sqlx::query_as::<_, PathAssignment>(&format!(
            "SELECT {} FROM path_assignments WHERE path_id = $1 AND user_id = $2",
            ASSIGNMENT_COLUMNS
        ))
        .bind(path_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?;

        let assignment = match existing {
            Some(a) if a.status != AssignmentStatus::Completed => return Ok(a),
            Some(a) => {
                sqlx::query_as::<_, PathAssignment>(&format!(
                    r#"
                    UPDATE path_assignments SET
                        status = 'assigned', progress = 0, due_date = $2, assigned_by = $3,
                        started_at = NULL, completed_at = NULL, updated_at = NOW()
                    WHERE id = $1
                    RETURNING {}
                    "#,
                    ASSIGNMENT_COLUMNS
                ))
                .bind(a.id)
                .bind(due_date)
                .bind(assigned_by)
                .fetch_one(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, PathAssignment>(&format!(
                    r#"
                    INSERT INTO path_assignments (path_id, user_id, due_date, assigned_by)
                    VALUES ($1, $2, $3, $4)
                    RETURNING {}
                    "#,
                    ASSIGNMENT_COLUMNS
                ))
                .bind(path_id)
                .bind(user_id)
                .bind(due_date)
                .bind(assigned_by)
                .fetch_one(&self.db)
                .await?
            }
        };

        let enrollments = EnrollmentService::new(self.db.clone());
        for course in self.path_courses(path_id).await?.iter().filter(|c| c.is_required) {
            match enrollments
                .enroll(user_id, course.course_id, due_date, assigned_by)
                .await
            {
                Ok(_) => {}
                Err(e @ (AppError::PrerequisitesNotMet(_) | AppError::BusinessRule(_))) => {
                    tracing::warn!(
                        path_id = %path_id,
                        course_id = %course.course_id,
                        user_id = %user_id,
                        error = %e,
                        "Skipped path course enrollment"
                    );
                }
                Err(e) => return Err(e),
            }
        }

        NotificationService::new(self.db.clone())
            .send(
                SendNotification::new(user_id, NotificationType::PathAssigned, NotificationChannel::InApp)
                    .with("path_name", &path.name)
                    .action_url(format!("/learning-paths/{}", path_id)),
            )
            .await?;

        tracing::info!(assignment_id = %assignment.id, path_id = %path_id, user_id = %user_id, "Learning path assigned");

        self.recalculate_progress(assignment.id).await
    }

    /// Assign a path to every active user with a job profile
    pub async fn assign_by_profile(
        &self,
        path_id: Uuid,
        job_profile: &str,
        due_date: Option<DateTime<Utc>>,
        assigned_by: Option<Uuid>,
    ) -> AppResult<BulkAssignResult> {
        let profile = normalize_profile(job_profile);
        let users = UserService::new(self.db.clone())
            .active_users_by_profile(&profile)
            .await?;

        let mut assigned = 0;
        for user_id in users {
            self.assign(path_id, user_id, due_date, assigned_by).await?;
            assigned += 1;
        }

        tracing::info!(path_id = %path_id, job_profile = %profile, assigned, "Bulk path assignment");
        Ok(BulkAssignResult {
            job_profile: profile,
            assigned,
        })
    }

    /// Recompute progress over required courses and derive the status
    pub async fn recalculate_progress(&self, assignment_id: Uuid) -> AppResult<PathAssignment> {
        let assignment = self.get_assignment(assignment_id).await?;

        let (total, completed) = sqlx::query_as::<_, (i64, i64)>(
            r#"
            SELECT
                COUNT(*),
                COUNT(*) FILTER (WHERE e.status = 'completed')
            FROM path_courses pc
            LEFT JOIN enrollments e ON e.course_id = pc.course_id AND e.user_id = $2
            WHERE pc.path_id = $1 AND pc.is_required
            "#,
        )
        .bind(assignment.path_id)
        .bind(assignment.user_id)
        .fetch_one(&self.db)
        .await?;

        let progress = path_progress(completed, total);
        let status = assignment_status(progress, assignment.due_date, Utc::now());

        let updated = sqlx::query_as::<_, PathAssignment>(&format!(
            r#"
            UPDATE path_assignments SET
                progress = $2,
                status = $3,
                started_at = CASE WHEN $2 > 0 THEN COALESCE(started_at, NOW()) ELSE started_at END,
                completed_at = CASE WHEN $3 = 'completed'::assignment_status
                                    THEN COALESCE(completed_at, NOW()) ELSE NULL END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            ASSIGNMENT_COLUMNS
        ))
        .bind(assignment_id)
        .bind(progress)
        .bind(status)
        .fetch_one(&self.db)
        .await?;

        if updated.status == AssignmentStatus::Completed && assignment.status != AssignmentStatus::Completed {
            tracing::info!(assignment_id = %assignment_id, user_id = %updated.user_id, "Learning path completed");
        }
        Ok(updated)
    }

    /// Refresh every assignment of the user whose path includes the course
    pub async fn recalculate_for_course(&self, user_id: Uuid, course_id: Uuid) -> AppResult<()> {
        let assignment_ids = sqlx::query_scalar::<_, Uuid>(
            r#"
            SELECT pa.id
            FROM path_assignments pa
            JOIN path_courses pc ON pc.path_id = pa.path_id
            WHERE pa.user_id = $1 AND pc.course_id = $2
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;

        for id in assignment_ids {
            self.recalculate_progress(id).await?;
        }
        Ok(())
    }

    /// Courses of an assigned path with enrollment state and locks
    pub async fn user_path_detail(&self, path_id: Uuid, user_id: Uuid) -> AppResult<UserPathDetail> {
        let path = self.get_path(path_id).await?;
        let assignment = sqlx::query_as::<_, PathAssignment>(&format!(
            "SELECT {} FROM path_assignments WHERE path_id = $1 AND user_id = $2",
            ASSIGNMENT_COLUMNS
        ))
        .bind(path_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Path assignment".to_string()))?;

        let courses = self.path_courses(path_id).await?;
        let enrollments = sqlx::query_as::<_, (Uuid, Uuid, EnrollmentStatus, Decimal)>(
            r#"
            SELECT e.id, e.course_id, e.status, e.progress
            FROM enrollments e
            JOIN path_courses pc ON pc.course_id = e.course_id
            WHERE pc.path_id = $1 AND e.user_id = $2
            "#,
        )
        .bind(path_id)
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(UserPathDetail {
            path,
            assignment,
            courses: build_user_courses(courses, &enrollments),
        })
    }

    /// Assignments of a user
    pub async fn my_assignments(&self, user_id: Uuid) -> AppResult<Vec<AssignmentSummary>> {
        let assignments = sqlx::query_as::<_, AssignmentSummary>(&format!(
            "{} WHERE pa.user_id = $1 ORDER BY pa.due_date NULLS LAST, lp.name",
            ASSIGNMENT_SUMMARY_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(assignments)
    }

    /// Incomplete assignments due within `days`
    pub async fn expiring(&self, days: i64) -> AppResult<Vec<AssignmentSummary>> {
        let assignments = sqlx::query_as::<_, AssignmentSummary>(&format!(
            r#"
            {}
            WHERE pa.status IN ('assigned', 'in_progress')
              AND pa.due_date > NOW()
              AND pa.due_date <= NOW() + ($1 * INTERVAL '1 day')
            ORDER BY pa.due_date
            "#,
            ASSIGNMENT_SUMMARY_SELECT
        ))
        .bind(days.max(0) as f64)
        .fetch_all(&self.db)
        .await?;
        Ok(assignments)
    }

    /// Mark past-due incomplete assignments overdue and notify the learners
    pub async fn overdue_sweep(&self) -> AppResult<u64> {
        let overdue = sqlx::query_as::<_, (Uuid, Uuid, String)>(
            r#"
            UPDATE path_assignments pa SET status = 'overdue', updated_at = NOW()
            FROM learning_paths lp
            WHERE lp.id = pa.path_id
              AND pa.status IN ('assigned', 'in_progress')
              AND pa.due_date IS NOT NULL
              AND pa.due_date < NOW()
            RETURNING pa.user_id, pa.path_id, lp.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let notifications = NotificationService::new(self.db.clone());
        for (user_id, path_id, name) in &overdue {
            notifications
                .send(
                    SendNotification::new(*user_id, NotificationType::PathOverdue, NotificationChannel::InApp)
                        .with("path_name", name)
                        .priority(NotificationPriority::High)
                        .action_url(format!("/learning-paths/{}", path_id)),
                )
                .await?;
        }

        if !overdue.is_empty() {
            tracing::info!(count = overdue.len(), "Assignments marked overdue");
        }
        Ok(overdue.len() as u64)
    }
}

/// Join path courses with the learner's enrollments and compute locks
fn build_user_courses(
    courses: Vec<PathCourse>,
    enrollments: &[(Uuid, Uuid, EnrollmentStatus, Decimal)],
) -> Vec<UserPathCourse> {
    let completed_orders: Vec<i32> = courses
        .iter()
        .filter(|c| {
            enrollments
                .iter()
                .any(|(_, course_id, status, _)| *course_id == c.course_id && *status == EnrollmentStatus::Completed)
        })
        .map(|c| c.sort_order)
        .collect();

    courses
        .into_iter()
        .map(|course| {
            let enrollment = enrollments
                .iter()
                .find(|(_, course_id, _, _)| *course_id == course.course_id);
            let is_locked = is_course_locked(course.unlock_after, &completed_orders);
            UserPathCourse {
                enrollment_id: enrollment.map(|e| e.0),
                enrollment_status: enrollment.map(|e| e.2),
                progress: enrollment.map(|e| e.3).unwrap_or(Decimal::ZERO),
                is_completed: enrollment.is_some_and(|e| e.2 == EnrollmentStatus::Completed),
                is_locked,
                course,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course(order: i32, unlock_after: Option<i32>) -> PathCourse {
        PathCourse {
            id: Uuid::new_v4(),
            path_id: Uuid::nil(),
            course_id: Uuid::new_v4(),
            course_code: format!("SST-00{}", order),
            course_title: format!("Curso {}", order),
            sort_order: order,
            is_required: true,
            unlock_after,
        }
    }

    #[test]
    fn test_locks_follow_completed_positions() {
        let first = course(1, None);
        let second = course(2, Some(1));
        let third = course(3, Some(2));
        let enrollments = vec![
            (Uuid::new_v4(), first.course_id, EnrollmentStatus::Completed, Decimal::from(100)),
            (Uuid::new_v4(), second.course_id, EnrollmentStatus::InProgress, Decimal::from(40)),
        ];

        let view = build_user_courses(vec![first, second, third], &enrollments);
        assert!(!view[0].is_locked && view[0].is_completed);
        assert!(!view[1].is_locked && !view[1].is_completed);
        assert_eq!(view[1].progress, Decimal::from(40));
        assert!(view[2].is_locked);
        assert!(view[2].enrollment_id.is_none());
    }
}
