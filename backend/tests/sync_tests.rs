//! Offline sync rule tests
//!
//! Property-based and unit tests for:
//! - Lesson progress merging
//! - Conflict detection
//! - Session completion and conflict resolution

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::models::{
    check_resolution, completion_status, is_conflict, ConflictResolution, ProgressSnapshot,
    SyncStatus,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn snapshot_strategy() -> impl Strategy<Value = ProgressSnapshot> {
    (
        0i64..=100,
        any::<bool>(),
        0i64..100_000,
        proptest::option::of("p[0-9]{1,3}"),
    )
        .prop_map(|(percent, completed, secs, position)| ProgressSnapshot {
            progress_percent: Decimal::from(percent),
            is_completed: completed,
            time_spent_seconds: secs,
            last_position: position,
        })
}

fn resolution_strategy() -> impl Strategy<Value = ConflictResolution> {
    prop_oneof![
        Just(ConflictResolution::ServerWins),
        Just(ConflictResolution::ClientWins),
        Just(ConflictResolution::Merged),
        Just(ConflictResolution::Manual),
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Merging never loses progress, completion or time from either side
    #[test]
    fn test_merge_keeps_maximum(a in snapshot_strategy(), b in snapshot_strategy()) {
        let merged = a.merge(&b);
        prop_assert_eq!(merged.progress_percent, a.progress_percent.max(b.progress_percent));
        prop_assert_eq!(merged.is_completed, a.is_completed || b.is_completed);
        prop_assert_eq!(
            merged.time_spent_seconds,
            a.time_spent_seconds.max(b.time_spent_seconds)
        );
    }

    /// The merged numbers do not depend on which side merges first
    #[test]
    fn test_merge_is_symmetric_on_numbers(a in snapshot_strategy(), b in snapshot_strategy()) {
        let ab = a.merge(&b);
        let ba = b.merge(&a);
        prop_assert_eq!(ab.progress_percent, ba.progress_percent);
        prop_assert_eq!(ab.is_completed, ba.is_completed);
        prop_assert_eq!(ab.time_spent_seconds, ba.time_spent_seconds);
    }

    /// Merging a snapshot with itself changes nothing
    #[test]
    fn test_merge_is_idempotent(a in snapshot_strategy()) {
        prop_assert_eq!(a.merge(&a), a);
    }

    /// Identical contents never conflict
    #[test]
    fn test_identical_contents_never_conflict(offset in -10_000i64..10_000) {
        let base = Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap();
        let server = base + Duration::seconds(offset);
        prop_assert!(!is_conflict(server, Some(base), base, false));
        prop_assert!(!is_conflict(server, None, base, false));
    }

    /// Any decided resolution closes a pending conflict when data accompanies it
    #[test]
    fn test_pending_conflict_accepts_resolution(requested in resolution_strategy()) {
        prop_assert!(check_resolution(ConflictResolution::Pending, requested, true).is_ok());
    }

    /// A settled conflict cannot be resolved again
    #[test]
    fn test_settled_conflict_is_final(
        current in resolution_strategy(),
        requested in resolution_strategy(),
    ) {
        prop_assert!(check_resolution(current, requested, true).is_err());
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_conflict_against_last_sync() {
    let last_sync = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
    let client = last_sync + Duration::hours(2);

    // Server row touched after the device last synced
    assert!(is_conflict(last_sync + Duration::hours(1), Some(last_sync), client, true));
    // Server row untouched since then
    assert!(!is_conflict(last_sync - Duration::hours(1), Some(last_sync), client, true));
}

#[test]
fn test_conflict_on_first_sync() {
    let client = Utc.with_ymd_and_hms(2025, 3, 1, 8, 0, 0).unwrap();
    assert!(is_conflict(client + Duration::minutes(5), None, client, true));
    assert!(!is_conflict(client - Duration::minutes(5), None, client, true));
}

#[test]
fn test_completion_status() {
    assert_eq!(completion_status(0), SyncStatus::Completed);
    assert_eq!(completion_status(3), SyncStatus::Partial);
}

#[test]
fn test_merged_resolution_needs_data() {
    assert!(check_resolution(ConflictResolution::Pending, ConflictResolution::Merged, false).is_err());
    assert!(check_resolution(ConflictResolution::Pending, ConflictResolution::Manual, false).is_err());
    assert!(check_resolution(ConflictResolution::Pending, ConflictResolution::ServerWins, false).is_ok());
    assert!(check_resolution(ConflictResolution::Pending, ConflictResolution::Pending, true).is_err());
}

#[test]
fn test_merge_takes_position_from_furthest_side() {
    let behind = ProgressSnapshot {
        progress_percent: Decimal::from(20),
        is_completed: false,
        time_spent_seconds: 300,
        last_position: Some("p2".to_string()),
    };
    let ahead = ProgressSnapshot {
        progress_percent: Decimal::from(70),
        is_completed: false,
        time_spent_seconds: 120,
        last_position: None,
    };
    let merged = behind.merge(&ahead);
    assert_eq!(merged.progress_percent, Decimal::from(70));
    assert_eq!(merged.time_spent_seconds, 300);
    // Furthest side has no position; fall back to the other one
    assert_eq!(merged.last_position.as_deref(), Some("p2"));
}
