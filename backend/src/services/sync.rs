//! Offline sync service for the mobile client
//! Handles sync sessions, progress merge, conflict resolution and offline packages

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use shared::models::{
    check_resolution, completion_status, is_conflict, ConflictResolution, CourseStatus,
    LessonType, PackageStatus, ProgressSnapshot, SyncDirection, SyncStatus,
};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::enrollment::{Enrollment, EnrollmentService, LessonProgress};
use crate::services::notification::Notification;

/// Sync service for offline support
#[derive(Clone)]
pub struct SyncService {
    db: PgPool,
}

/// Sync session
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SyncLog {
    pub id: Uuid,
    pub user_id: Uuid,
    pub device_id: String,
    pub device_name: String,
    pub direction: SyncDirection,
    pub status: SyncStatus,
    pub records_uploaded: i32,
    pub records_downloaded: i32,
    pub bytes_transferred: i64,
    pub client_timestamp: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Conflict between a device change and the server row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct SyncConflict {
    pub id: Uuid,
    pub sync_log_id: Uuid,
    pub model_name: String,
    pub record_id: Uuid,
    pub server_data: serde_json::Value,
    pub client_data: serde_json::Value,
    pub resolution: ConflictResolution,
    pub resolved_data: Option<serde_json::Value>,
    pub resolved_by: Option<Uuid>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A change made on the device while offline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "model", rename_all = "snake_case")]
pub enum SyncRecord {
    LessonProgress {
        enrollment_id: Uuid,
        lesson_id: Uuid,
        progress_percent: Decimal,
        #[serde(default)]
        is_completed: bool,
        #[serde(default)]
        time_spent_seconds: i64,
        last_position: Option<String>,
        client_updated_at: DateTime<Utc>,
    },
    NotificationRead {
        notification_id: Uuid,
        client_updated_at: DateTime<Utc>,
    },
}

/// Input for opening a sync session
#[derive(Debug, Deserialize, Validate)]
pub struct StartSyncInput {
    #[validate(length(min = 1, max = 200))]
    pub device_id: String,
    #[validate(length(max = 200))]
    pub device_name: Option<String>,
    pub direction: SyncDirection,
    pub client_timestamp: Option<DateTime<Utc>>,
}

/// Batch of device changes
#[derive(Debug, Deserialize)]
pub struct UploadInput {
    pub records: Vec<SyncRecord>,
}

/// Upload outcome
#[derive(Debug, Serialize)]
pub struct UploadResult {
    pub applied: usize,
    pub skipped: usize,
    pub conflicts: Vec<SyncConflict>,
}

/// What happened to one uploaded record
#[derive(Debug)]
enum RecordOutcome {
    Applied,
    /// Not the uploader's record, or it no longer exists
    Skipped,
    Conflict(SyncConflict),
}

impl UploadResult {
    fn tally(&mut self, outcome: RecordOutcome) {
        match outcome {
            RecordOutcome::Applied => self.applied += 1,
            RecordOutcome::Skipped => self.skipped += 1,
            RecordOutcome::Conflict(conflict) => self.conflicts.push(conflict),
        }
    }
}

/// Lesson available offline
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OfflineLesson {
    pub id: Uuid,
    pub course_id: Uuid,
    pub module_id: Uuid,
    pub title: String,
    pub lesson_type: LessonType,
    pub content: String,
    pub content_url: Option<String>,
    pub duration_minutes: i32,
    pub sort_order: i32,
    pub updated_at: DateTime<Utc>,
}

/// Server changes for a device
#[derive(Debug, Serialize)]
pub struct DownloadPayload {
    pub server_time: DateTime<Utc>,
    pub enrollments: Vec<Enrollment>,
    pub lesson_progress: Vec<LessonProgress>,
    pub notifications: Vec<Notification>,
    pub lessons: Vec<OfflineLesson>,
}

impl DownloadPayload {
    pub fn record_count(&self) -> usize {
        self.enrollments.len()
            + self.lesson_progress.len()
            + self.notifications.len()
            + self.lessons.len()
    }
}

/// Input for settling a conflict
#[derive(Debug, Deserialize)]
pub struct ResolveConflictInput {
    pub resolution: ConflictResolution,
    pub resolved_data: Option<serde_json::Value>,
}

/// Offline content package for one course version
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct OfflinePackage {
    pub id: Uuid,
    pub course_id: Uuid,
    pub version: i32,
    pub status: PackageStatus,
    pub manifest: serde_json::Value,
    pub checksum: String,
    pub size_bytes: i64,
    pub error_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Manifest stored with a package
#[derive(Debug, Serialize, Deserialize)]
pub struct PackageManifest {
    pub course_id: Uuid,
    pub course_code: String,
    pub version: i32,
    pub lessons: Vec<OfflineLesson>,
}

const LOG_COLUMNS: &str = r#"
    id, user_id, device_id, device_name, direction, status, records_uploaded,
    records_downloaded, bytes_transferred, client_timestamp, error_message,
    started_at, completed_at
"#;

const CONFLICT_COLUMNS: &str = r#"
    id, sync_log_id, model_name, record_id, server_data, client_data, resolution,
    resolved_data, resolved_by, resolved_at, created_at
"#;

const PACKAGE_COLUMNS: &str = r#"
    id, course_id, version, status, manifest, checksum, size_bytes, error_message, created_at
"#;

const LESSON_PROGRESS_MODEL: &str = "lesson_progress";

/// Hex SHA-256 of the serialized manifest
pub fn manifest_checksum(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

fn snapshot_of(progress: &LessonProgress) -> ProgressSnapshot {
    ProgressSnapshot {
        progress_percent: progress.progress_percent,
        is_completed: progress.is_completed,
        time_spent_seconds: progress.time_spent_seconds,
        last_position: progress.last_position.clone(),
    }
}

fn parse_snapshot(data: &serde_json::Value) -> AppResult<ProgressSnapshot> {
    serde_json::from_value(data.clone()).map_err(|e| {
        AppError::ValidationError(format!("Invalid lesson progress data: {}", e))
    })
}

impl SyncService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    // ========================================================================
    // Sessions
    // ========================================================================

    /// Open a sync session for a device
    pub async fn start(&self, user_id: Uuid, input: StartSyncInput) -> AppResult<SyncLog> {
        input.validate()?;
        let log = sqlx::query_as::<_, SyncLog>(&format!(
            r#"
            INSERT INTO sync_logs (user_id, device_id, device_name, direction, status, client_timestamp)
            VALUES ($1, $2, $3, $4, 'in_progress', $5)
            RETURNING {}
            "#,
            LOG_COLUMNS
        ))
        .bind(user_id)
        .bind(input.device_id.trim())
        .bind(input.device_name.unwrap_or_default())
        .bind(input.direction)
        .bind(input.client_timestamp)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(sync_log_id = %log.id, user_id = %user_id, device_id = %log.device_id, "Sync started");
        Ok(log)
    }

    async fn get_log(&self, log_id: Uuid) -> AppResult<SyncLog> {
        sqlx::query_as::<_, SyncLog>(&format!(
            "SELECT {} FROM sync_logs WHERE id = $1",
            LOG_COLUMNS
        ))
        .bind(log_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Sync session".to_string()))
    }

    /// Session owned by the user and still open
    async fn open_log(&self, log_id: Uuid, user_id: Uuid) -> AppResult<SyncLog> {
        let log = self.get_log(log_id).await?;
        if log.user_id != user_id {
            return Err(AppError::NotFound("Sync session".to_string()));
        }
        if log.status != SyncStatus::InProgress {
            return Err(AppError::rule("Sync session is not in progress"));
        }
        Ok(log)
    }

    /// Time of the device's previous finished sync
    async fn last_sync_at(&self, log: &SyncLog) -> AppResult<Option<DateTime<Utc>>> {
        let last = sqlx::query_scalar::<_, Option<DateTime<Utc>>>(
            r#"
            SELECT MAX(completed_at) FROM sync_logs
            WHERE user_id = $1 AND device_id = $2 AND id <> $3
              AND status IN ('completed', 'partial')
            "#,
        )
        .bind(log.user_id)
        .bind(&log.device_id)
        .bind(log.id)
        .fetch_one(&self.db)
        .await?;
        Ok(last)
    }

    /// Apply device changes, recording conflicts instead of overwriting newer server data
    pub async fn upload(
        &self,
        log_id: Uuid,
        user_id: Uuid,
        input: UploadInput,
    ) -> AppResult<UploadResult> {
        let log = self.open_log(log_id, user_id).await?;
        if log.direction == SyncDirection::Download {
            return Err(AppError::rule("Sync session does not accept uploads"));
        }
        let last_sync = self.last_sync_at(&log).await?;
        let bytes = serde_json::to_vec(&input.records)
            .map(|b| b.len() as i64)
            .unwrap_or(0);

        let mut result = UploadResult {
            applied: 0,
            skipped: 0,
            conflicts: Vec::new(),
        };
        let mut failure = None;
        for record in &input.records {
            match self.apply_record(&log, record, last_sync).await {
                Ok(outcome) => result.tally(outcome),
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
        }

        // Counters always reflect what was written, even when the batch stopped early
        sqlx::query(
            r#"
            UPDATE sync_logs SET
                records_uploaded = records_uploaded + $2,
                bytes_transferred = bytes_transferred + $3
            WHERE id = $1
            "#,
        )
        .bind(log_id)
        .bind(result.applied as i32)
        .bind(bytes)
        .execute(&self.db)
        .await?;

        if let Some(e) = failure {
            tracing::warn!(
                sync_log_id = %log_id,
                applied = result.applied,
                error = %e,
                "Sync upload stopped early"
            );
            return Err(e);
        }

        tracing::info!(
            sync_log_id = %log_id,
            applied = result.applied,
            skipped = result.skipped,
            conflicts = result.conflicts.len(),
            "Sync upload processed"
        );
        Ok(result)
    }

    async fn apply_record(
        &self,
        log: &SyncLog,
        record: &SyncRecord,
        last_sync: Option<DateTime<Utc>>,
    ) -> AppResult<RecordOutcome> {
        match record {
            SyncRecord::LessonProgress {
                enrollment_id,
                lesson_id,
                progress_percent,
                is_completed,
                time_spent_seconds,
                last_position,
                client_updated_at,
            } => {
                let client = ProgressSnapshot {
                    progress_percent: *progress_percent,
                    is_completed: *is_completed,
                    time_spent_seconds: *time_spent_seconds,
                    last_position: last_position.clone(),
                };
                self.upload_progress(
                    log,
                    *enrollment_id,
                    *lesson_id,
                    client,
                    *client_updated_at,
                    last_sync,
                    record,
                )
                .await
            }
            SyncRecord::NotificationRead {
                notification_id,
                client_updated_at,
            } => {
                let updated = sqlx::query(
                    r#"
                    UPDATE notifications SET status = 'read', read_at = COALESCE(read_at, $3), updated_at = NOW()
                    WHERE id = $1 AND user_id = $2
                    "#,
                )
                .bind(notification_id)
                .bind(log.user_id)
                .bind(client_updated_at)
                .execute(&self.db)
                .await?;
                Ok(if updated.rows_affected() > 0 {
                    RecordOutcome::Applied
                } else {
                    RecordOutcome::Skipped
                })
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn upload_progress(
        &self,
        log: &SyncLog,
        enrollment_id: Uuid,
        lesson_id: Uuid,
        client: ProgressSnapshot,
        client_updated_at: DateTime<Utc>,
        last_sync: Option<DateTime<Utc>>,
        record: &SyncRecord,
    ) -> AppResult<RecordOutcome> {
        // The enrollment must be the uploader's and the lesson part of its course
        let owned = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*)
            FROM enrollments e
            JOIN course_modules m ON m.course_id = e.course_id
            JOIN lessons l ON l.module_id = m.id
            WHERE e.id = $1 AND e.user_id = $2 AND l.id = $3
            "#,
        )
        .bind(enrollment_id)
        .bind(log.user_id)
        .bind(lesson_id)
        .fetch_one(&self.db)
        .await?;
        if owned == 0 {
            tracing::debug!(enrollment_id = %enrollment_id, lesson_id = %lesson_id, "Skipping foreign progress record");
            return Ok(RecordOutcome::Skipped);
        }

        let server = sqlx::query_as::<_, LessonProgress>(
            r#"
            SELECT id, enrollment_id, lesson_id, is_completed, progress_percent, time_spent_seconds,
                   last_position, completed_at, created_at, updated_at
            FROM lesson_progress
            WHERE enrollment_id = $1 AND lesson_id = $2
            "#,
        )
        .bind(enrollment_id)
        .bind(lesson_id)
        .fetch_optional(&self.db)
        .await?;

        let merged = match &server {
            Some(row) => {
                let current = snapshot_of(row);
                if is_conflict(row.updated_at, last_sync, client_updated_at, current != client) {
                    let conflict = sqlx::query_as::<_, SyncConflict>(&format!(
                        r#"
                        INSERT INTO sync_conflicts (sync_log_id, model_name, record_id, server_data, client_data)
                        VALUES ($1, $2, $3, $4, $5)
                        RETURNING {}
                        "#,
                        CONFLICT_COLUMNS
                    ))
                    .bind(log.id)
                    .bind(LESSON_PROGRESS_MODEL)
                    .bind(row.id)
                    .bind(serde_json::to_value(&current).unwrap_or_default())
                    .bind(serde_json::to_value(record).unwrap_or_default())
                    .fetch_one(&self.db)
                    .await?;
                    tracing::debug!(conflict_id = %conflict.id, record_id = %row.id, "Sync conflict recorded");
                    return Ok(RecordOutcome::Conflict(conflict));
                }
                current.merge(&client)
            }
            None => client,
        };

        self.write_progress(enrollment_id, lesson_id, &merged).await?;
        Ok(RecordOutcome::Applied)
    }

    /// Store a merged snapshot and refresh the enrollment
    async fn write_progress(
        &self,
        enrollment_id: Uuid,
        lesson_id: Uuid,
        snapshot: &ProgressSnapshot,
    ) -> AppResult<()> {
        let percent = shared::models::clamp_percent(snapshot.progress_percent);
        let completed = shared::models::is_lesson_completed(snapshot.is_completed, percent);

        sqlx::query(
            r#"
            INSERT INTO lesson_progress (
                enrollment_id, lesson_id, is_completed, progress_percent,
                time_spent_seconds, last_position, completed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, CASE WHEN $3 THEN NOW() END)
            ON CONFLICT (enrollment_id, lesson_id) DO UPDATE SET
                is_completed = EXCLUDED.is_completed,
                progress_percent = EXCLUDED.progress_percent,
                time_spent_seconds = EXCLUDED.time_spent_seconds,
                last_position = EXCLUDED.last_position,
                completed_at = CASE WHEN EXCLUDED.is_completed
                                    THEN COALESCE(lesson_progress.completed_at, NOW()) END,
                updated_at = NOW()
            "#,
        )
        .bind(enrollment_id)
        .bind(lesson_id)
        .bind(completed)
        .bind(if completed { Decimal::from(100) } else { percent })
        .bind(snapshot.time_spent_seconds.max(0))
        .bind(&snapshot.last_position)
        .execute(&self.db)
        .await?;

        EnrollmentService::new(self.db.clone())
            .recalculate_progress(enrollment_id)
            .await?;
        Ok(())
    }

    /// Server changes for the user since a timestamp
    pub async fn download(
        &self,
        log_id: Uuid,
        user_id: Uuid,
        since: Option<DateTime<Utc>>,
    ) -> AppResult<DownloadPayload> {
        let log = self.open_log(log_id, user_id).await?;
        if log.direction == SyncDirection::Upload {
            return Err(AppError::rule("Sync session does not serve downloads"));
        }
        let server_time = Utc::now();

        let enrollments = sqlx::query_as::<_, Enrollment>(
            r#"
            SELECT id, user_id, course_id, status, progress, due_date, assigned_by,
                   started_at, completed_at, created_at, updated_at
            FROM enrollments
            WHERE user_id = $1 AND ($2::timestamptz IS NULL OR updated_at > $2)
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let lesson_progress = sqlx::query_as::<_, LessonProgress>(
            r#"
            SELECT lp.id, lp.enrollment_id, lp.lesson_id, lp.is_completed, lp.progress_percent,
                   lp.time_spent_seconds, lp.last_position, lp.completed_at, lp.created_at, lp.updated_at
            FROM lesson_progress lp
            JOIN enrollments e ON e.id = lp.enrollment_id
            WHERE e.user_id = $1 AND ($2::timestamptz IS NULL OR lp.updated_at > $2)
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, user_id, notification_type, channel, priority, status, title, message,
                   action_url, data, retry_count, error_message, sent_at, read_at, created_at, updated_at
            FROM notifications
            WHERE user_id = $1 AND channel = 'in_app' AND read_at IS NULL AND status = 'sent'
              AND ($2::timestamptz IS NULL OR created_at > $2)
            ORDER BY created_at DESC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let lessons = sqlx::query_as::<_, OfflineLesson>(
            r#"
            SELECT l.id, m.course_id, l.module_id, l.title, l.lesson_type, l.content, l.content_url,
                   l.duration_minutes, l.sort_order, l.updated_at
            FROM lessons l
            JOIN course_modules m ON m.id = l.module_id
            JOIN enrollments e ON e.course_id = m.course_id
            WHERE e.user_id = $1
              AND e.status IN ('enrolled', 'in_progress', 'completed')
              AND l.is_offline_available
              AND ($2::timestamptz IS NULL OR l.updated_at > $2)
            ORDER BY m.course_id, m.sort_order, l.sort_order
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.db)
        .await?;

        let payload = DownloadPayload {
            server_time,
            enrollments,
            lesson_progress,
            notifications,
            lessons,
        };

        let bytes = serde_json::to_vec(&payload).map(|b| b.len() as i64).unwrap_or(0);
        sqlx::query(
            r#"
            UPDATE sync_logs SET
                records_downloaded = records_downloaded + $2,
                bytes_transferred = bytes_transferred + $3
            WHERE id = $1
            "#,
        )
        .bind(log_id)
        .bind(payload.record_count() as i32)
        .bind(bytes)
        .execute(&self.db)
        .await?;

        Ok(payload)
    }

    /// Close a session; partial while conflicts are pending, failed when the device reports an error
    pub async fn complete(
        &self,
        log_id: Uuid,
        user_id: Uuid,
        error_message: Option<String>,
    ) -> AppResult<SyncLog> {
        self.open_log(log_id, user_id).await?;

        let status = match error_message {
            Some(_) => SyncStatus::Failed,
            None => completion_status(self.pending_conflicts(log_id).await?),
        };

        let log = sqlx::query_as::<_, SyncLog>(&format!(
            r#"
            UPDATE sync_logs SET status = $2, error_message = $3, completed_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            LOG_COLUMNS
        ))
        .bind(log_id)
        .bind(status)
        .bind(&error_message)
        .fetch_one(&self.db)
        .await?;

        tracing::info!(sync_log_id = %log_id, status = ?log.status, "Sync completed");
        Ok(log)
    }

    async fn pending_conflicts(&self, log_id: Uuid) -> AppResult<i64> {
        let pending = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM sync_conflicts WHERE sync_log_id = $1 AND resolution = 'pending'",
        )
        .bind(log_id)
        .fetch_one(&self.db)
        .await?;
        Ok(pending)
    }

    /// Most recent session of a device
    pub async fn last(&self, user_id: Uuid, device_id: &str) -> AppResult<Option<SyncLog>> {
        let log = sqlx::query_as::<_, SyncLog>(&format!(
            r#"
            SELECT {} FROM sync_logs
            WHERE user_id = $1 AND device_id = $2
            ORDER BY started_at DESC
            LIMIT 1
            "#,
            LOG_COLUMNS
        ))
        .bind(user_id)
        .bind(device_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(log)
    }

    // ========================================================================
    // Conflicts
    // ========================================================================

    /// Unresolved conflicts of a user
    pub async fn pending_for_user(&self, user_id: Uuid) -> AppResult<Vec<SyncConflict>> {
        let conflicts = sqlx::query_as::<_, SyncConflict>(
            r#"
            SELECT c.id, c.sync_log_id, c.model_name, c.record_id, c.server_data, c.client_data,
                   c.resolution, c.resolved_data, c.resolved_by, c.resolved_at, c.created_at
            FROM sync_conflicts c
            JOIN sync_logs l ON l.id = c.sync_log_id
            WHERE l.user_id = $1 AND c.resolution = 'pending'
            ORDER BY c.created_at
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(conflicts)
    }

    /// Settle a conflict and apply the winning data
    pub async fn resolve_conflict(
        &self,
        conflict_id: Uuid,
        user_id: Uuid,
        input: ResolveConflictInput,
    ) -> AppResult<SyncConflict> {
        let (record_id, current, client_data, model, owner) =
            sqlx::query_as::<_, (Uuid, ConflictResolution, serde_json::Value, String, Uuid)>(
                r#"
                SELECT c.record_id, c.resolution, c.client_data, c.model_name, l.user_id
                FROM sync_conflicts c
                JOIN sync_logs l ON l.id = c.sync_log_id
                WHERE c.id = $1
                "#,
            )
            .bind(conflict_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Sync conflict".to_string()))?;

        if owner != user_id {
            return Err(AppError::NotFound("Sync conflict".to_string()));
        }

        check_resolution(current, input.resolution, input.resolved_data.is_some())
            .map_err(AppError::rule)?;

        let winning = match input.resolution {
            ConflictResolution::ClientWins => Some(client_data),
            ConflictResolution::Merged | ConflictResolution::Manual => input.resolved_data.clone(),
            _ => None,
        };

        if let Some(data) = &winning {
            if model == LESSON_PROGRESS_MODEL {
                let snapshot = parse_snapshot(data)?;
                let (enrollment_id, lesson_id) = sqlx::query_as::<_, (Uuid, Uuid)>(
                    "SELECT enrollment_id, lesson_id FROM lesson_progress WHERE id = $1",
                )
                .bind(record_id)
                .fetch_optional(&self.db)
                .await?
                .ok_or_else(|| AppError::NotFound("Lesson progress".to_string()))?;
                self.write_progress(enrollment_id, lesson_id, &snapshot).await?;
            }
        }

        let resolved = sqlx::query_as::<_, SyncConflict>(&format!(
            r#"
            UPDATE sync_conflicts SET
                resolution = $2, resolved_data = $3, resolved_by = $4, resolved_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CONFLICT_COLUMNS
        ))
        .bind(conflict_id)
        .bind(input.resolution)
        .bind(&winning)
        .bind(user_id)
        .fetch_one(&self.db)
        .await?;

        // A partial session becomes complete once its last conflict is settled
        if self.pending_conflicts(resolved.sync_log_id).await? == 0 {
            sqlx::query("UPDATE sync_logs SET status = 'completed' WHERE id = $1 AND status = 'partial'")
                .bind(resolved.sync_log_id)
                .execute(&self.db)
                .await?;
        }

        tracing::info!(conflict_id = %conflict_id, resolution = ?input.resolution, "Sync conflict resolved");
        Ok(resolved)
    }

    // ========================================================================
    // Offline packages
    // ========================================================================

    /// Build the package for the course's current version
    pub async fn build_package(&self, course_id: Uuid) -> AppResult<OfflinePackage> {
        let (code, version, status) = sqlx::query_as::<_, (String, i32, CourseStatus)>(
            "SELECT code, version, status FROM courses WHERE id = $1",
        )
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Course".to_string()))?;

        if status != CourseStatus::Published {
            return Err(AppError::rule("Only published courses can be packaged"));
        }

        let lessons = sqlx::query_as::<_, OfflineLesson>(
            r#"
            SELECT l.id, m.course_id, l.module_id, l.title, l.lesson_type, l.content, l.content_url,
                   l.duration_minutes, l.sort_order, l.updated_at
            FROM lessons l
            JOIN course_modules m ON m.id = l.module_id
            WHERE m.course_id = $1 AND l.is_offline_available
            ORDER BY m.sort_order, l.sort_order
            "#,
        )
        .bind(course_id)
        .fetch_all(&self.db)
        .await?;

        let manifest = PackageManifest {
            course_id,
            course_code: code,
            version,
            lessons,
        };
        let bytes = serde_json::to_vec(&manifest)
            .map_err(|e| AppError::Internal(format!("Failed to serialize manifest: {}", e)))?;
        let checksum = manifest_checksum(&bytes);
        let manifest_value = serde_json::to_value(&manifest)
            .map_err(|e| AppError::Internal(format!("Failed to serialize manifest: {}", e)))?;

        let mut tx = self.db.begin().await?;
        sqlx::query(
            "UPDATE offline_packages SET status = 'outdated' WHERE course_id = $1 AND version < $2",
        )
        .bind(course_id)
        .bind(version)
        .execute(&mut *tx)
        .await?;

        let package = sqlx::query_as::<_, OfflinePackage>(&format!(
            r#"
            INSERT INTO offline_packages (course_id, version, status, manifest, checksum, size_bytes)
            VALUES ($1, $2, 'ready', $3, $4, $5)
            ON CONFLICT (course_id, version) DO UPDATE SET
                status = 'ready',
                manifest = EXCLUDED.manifest,
                checksum = EXCLUDED.checksum,
                size_bytes = EXCLUDED.size_bytes,
                error_message = NULL
            RETURNING {}
            "#,
            PACKAGE_COLUMNS
        ))
        .bind(course_id)
        .bind(version)
        .bind(&manifest_value)
        .bind(&checksum)
        .bind(bytes.len() as i64)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(course_id = %course_id, version, checksum = %checksum, "Offline package built");
        Ok(package)
    }

    /// Latest ready package of a course
    pub async fn latest_package(&self, course_id: Uuid) -> AppResult<OfflinePackage> {
        sqlx::query_as::<_, OfflinePackage>(&format!(
            r#"
            SELECT {} FROM offline_packages
            WHERE course_id = $1 AND status = 'ready'
            ORDER BY version DESC
            LIMIT 1
            "#,
            PACKAGE_COLUMNS
        ))
        .bind(course_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Offline package".to_string()))
    }

    /// Record that a device fetched a package
    pub async fn record_download(
        &self,
        package_id: Uuid,
        user_id: Uuid,
        device_id: &str,
    ) -> AppResult<()> {
        sqlx::query(
            "INSERT INTO package_downloads (package_id, user_id, device_id) VALUES ($1, $2, $3)",
        )
        .bind(package_id)
        .bind(user_id)
        .bind(device_id)
        .execute(&self.db)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_checksum_is_stable_hex() {
        let a = manifest_checksum(b"{\"lessons\":[]}");
        let b = manifest_checksum(b"{\"lessons\":[]}");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, manifest_checksum(b"{\"lessons\":[1]}"));
    }

    #[test]
    fn test_sync_record_tagging() {
        let json = serde_json::json!({
            "model": "lesson_progress",
            "enrollment_id": Uuid::nil(),
            "lesson_id": Uuid::nil(),
            "progress_percent": "55.5",
            "client_updated_at": "2025-01-01T10:00:00Z"
        });
        let record: SyncRecord = serde_json::from_value(json).unwrap();
        match record {
            SyncRecord::LessonProgress {
                is_completed,
                time_spent_seconds,
                progress_percent,
                ..
            } => {
                assert!(!is_completed);
                assert_eq!(time_spent_seconds, 0);
                assert_eq!(progress_percent, Decimal::new(555, 1));
            }
            _ => panic!("expected lesson progress"),
        }
    }

    #[test]
    fn test_mixed_batch_tally() {
        let conflict = SyncConflict {
            id: Uuid::new_v4(),
            sync_log_id: Uuid::new_v4(),
            model_name: LESSON_PROGRESS_MODEL.to_string(),
            record_id: Uuid::new_v4(),
            server_data: serde_json::json!({}),
            client_data: serde_json::json!({}),
            resolution: ConflictResolution::Pending,
            resolved_data: None,
            resolved_by: None,
            resolved_at: None,
            created_at: Utc::now(),
        };
        let mut result = UploadResult {
            applied: 0,
            skipped: 0,
            conflicts: Vec::new(),
        };
        // Own progress, another user's enrollment, a conflict, an unknown notification
        for outcome in [
            RecordOutcome::Applied,
            RecordOutcome::Skipped,
            RecordOutcome::Conflict(conflict),
            RecordOutcome::Skipped,
        ] {
            result.tally(outcome);
        }
        assert_eq!(result.applied, 1);
        assert_eq!(result.skipped, 2);
        assert_eq!(result.conflicts.len(), 1);
    }

    #[test]
    fn test_parse_snapshot_rejects_garbage() {
        assert!(parse_snapshot(&serde_json::json!({"foo": 1})).is_err());
        let snapshot = parse_snapshot(&serde_json::json!({
            "progress_percent": "100",
            "is_completed": true,
            "time_spent_seconds": 30,
            "last_position": null
        }))
        .unwrap();
        assert!(snapshot.is_completed);
    }
}
