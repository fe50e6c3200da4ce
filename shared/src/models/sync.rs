//! Offline sync models and merge rules

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Sync direction requested by a device
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "sync_direction", rename_all = "snake_case"))]
pub enum SyncDirection {
    Upload,
    Download,
    Bidirectional,
}

/// Sync session status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "sync_status", rename_all = "snake_case"))]
pub enum SyncStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Partial,
}

/// How a sync conflict was settled
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "conflict_resolution", rename_all = "snake_case"))]
pub enum ConflictResolution {
    Pending,
    ServerWins,
    ClientWins,
    Merged,
    Manual,
}

/// Offline package build status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "package_status", rename_all = "snake_case"))]
pub enum PackageStatus {
    Building,
    Ready,
    Outdated,
    Error,
}

/// Lesson progress as seen by one side of a sync
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressSnapshot {
    pub progress_percent: Decimal,
    pub is_completed: bool,
    pub time_spent_seconds: i64,
    pub last_position: Option<String>,
}

impl ProgressSnapshot {
    /// Merge two views of the same lesson without losing work from either side
    pub fn merge(&self, other: &ProgressSnapshot) -> ProgressSnapshot {
        let ahead = if other.progress_percent > self.progress_percent {
            other
        } else {
            self
        };
        ProgressSnapshot {
            progress_percent: self.progress_percent.max(other.progress_percent),
            is_completed: self.is_completed || other.is_completed,
            time_spent_seconds: self.time_spent_seconds.max(other.time_spent_seconds),
            last_position: ahead
                .last_position
                .clone()
                .or_else(|| self.last_position.clone())
                .or_else(|| other.last_position.clone()),
        }
    }
}

/// A server row conflicts with an uploaded change when it was modified after the
/// device last synced and its content differs from what the device sent.
pub fn is_conflict(
    server_updated_at: DateTime<Utc>,
    last_sync_at: Option<DateTime<Utc>>,
    client_updated_at: DateTime<Utc>,
    contents_differ: bool,
) -> bool {
    if !contents_differ {
        return false;
    }
    match last_sync_at {
        Some(base) => server_updated_at > base,
        None => server_updated_at > client_updated_at,
    }
}

/// Final status of a session given its pending conflicts
pub fn completion_status(pending_conflicts: i64) -> SyncStatus {
    if pending_conflicts > 0 {
        SyncStatus::Partial
    } else {
        SyncStatus::Completed
    }
}

/// Validate a conflict resolution request
pub fn check_resolution(
    current: ConflictResolution,
    requested: ConflictResolution,
    has_resolved_data: bool,
) -> Result<(), &'static str> {
    if current != ConflictResolution::Pending {
        return Err("Conflict has already been resolved");
    }
    match requested {
        ConflictResolution::Pending => Err("A resolution must be chosen"),
        ConflictResolution::Merged | ConflictResolution::Manual if !has_resolved_data => {
            Err("Merged resolutions require resolved data")
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snap(percent: i64, completed: bool, secs: i64, pos: Option<&str>) -> ProgressSnapshot {
        ProgressSnapshot {
            progress_percent: Decimal::from(percent),
            is_completed: completed,
            time_spent_seconds: secs,
            last_position: pos.map(String::from),
        }
    }

    #[test]
    fn test_merge_keeps_furthest_progress() {
        let server = snap(40, false, 300, Some("00:04:00"));
        let client = snap(70, false, 200, Some("00:07:00"));
        let merged = server.merge(&client);
        assert_eq!(merged.progress_percent, Decimal::from(70));
        assert_eq!(merged.time_spent_seconds, 300);
        assert_eq!(merged.last_position.as_deref(), Some("00:07:00"));
        assert!(!merged.is_completed);
    }

    #[test]
    fn test_merge_completion_is_sticky() {
        let merged = snap(100, true, 10, None).merge(&snap(20, false, 5, None));
        assert!(merged.is_completed);
    }

    #[test]
    fn test_conflict_detection() {
        let now = Utc::now();
        let last_sync = Some(now - Duration::hours(2));
        assert!(is_conflict(now - Duration::hours(1), last_sync, now, true));
        assert!(!is_conflict(now - Duration::hours(3), last_sync, now, true));
        assert!(!is_conflict(now - Duration::hours(1), last_sync, now, false));
        assert!(!is_conflict(now - Duration::hours(1), None, now, true));
        assert!(is_conflict(now, None, now - Duration::hours(1), true));
    }

    #[test]
    fn test_resolution_rules() {
        use ConflictResolution::*;
        assert!(check_resolution(Pending, ServerWins, false).is_ok());
        assert!(check_resolution(Pending, Merged, false).is_err());
        assert!(check_resolution(Pending, Merged, true).is_ok());
        assert!(check_resolution(ClientWins, ServerWins, false).is_err());
        assert!(check_resolution(Pending, Pending, true).is_err());
    }

    #[test]
    fn test_completion_status() {
        assert_eq!(completion_status(0), SyncStatus::Completed);
        assert_eq!(completion_status(2), SyncStatus::Partial);
    }
}
