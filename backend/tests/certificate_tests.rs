//! Certificate rule tests
//!
//! Property-based and unit tests for:
//! - Certificate number format
//! - Expiry from course validity
//! - Public verification outcomes

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use shared::models::{
    days_until_expiry, expiry_from_validity, format_certificate_number,
    is_valid_certificate_number, verification_outcome, CertificateStatus, VerificationOutcome,
    DAYS_PER_VALIDITY_MONTH,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn issue_date_strategy() -> impl Strategy<Value = DateTime<Utc>> {
    // 2020-01-01 .. 2035-01-01
    (1_577_836_800i64..2_051_222_400).prop_map(|secs| Utc.timestamp_opt(secs, 0).unwrap())
}

fn hex_strategy() -> impl Strategy<Value = String> {
    "[0-9a-fA-F]{8,12}"
}

fn status_strategy() -> impl Strategy<Value = CertificateStatus> {
    prop_oneof![
        Just(CertificateStatus::Issued),
        Just(CertificateStatus::Revoked),
        Just(CertificateStatus::Expired),
    ]
}

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Every generated number passes the format check and carries the issue period
    #[test]
    fn test_generated_numbers_are_valid(issued in issue_date_strategy(), hex in hex_strategy()) {
        let number = format_certificate_number(issued, &hex);
        prop_assert!(is_valid_certificate_number(&number));
        let period = issued.format("%Y%m").to_string();
        let prefix = format!("SD-{}-", period);
        prop_assert!(number.starts_with(&prefix));
        prop_assert_eq!(number.len(), "SD-YYYYMM-XXXXXXXX".len());
    }

    /// Arbitrary text almost never looks like a certificate number
    #[test]
    fn test_lowercase_numbers_rejected(hex in "[a-f]{8}") {
        let candidate = format!("SD-202501-{}", hex);
        prop_assert!(!is_valid_certificate_number(&candidate));
    }

    /// Positive validity always yields an expiry after the issue date
    #[test]
    fn test_expiry_follows_validity(issued in issue_date_strategy(), months in 1i32..=120) {
        let expires = expiry_from_validity(issued, Some(months));
        prop_assert_eq!(
            expires,
            Some(issued + Duration::days(i64::from(months) * DAYS_PER_VALIDITY_MONTH))
        );
    }

    /// Only issued, unexpired certificates verify as valid
    #[test]
    fn test_only_issued_unexpired_is_valid(
        status in status_strategy(),
        issued in issue_date_strategy(),
        offset_days in -400i64..400,
    ) {
        let expires = issued + Duration::days(offset_days);
        let outcome = verification_outcome(status, Some(expires), issued);
        let expected_valid = status == CertificateStatus::Issued && offset_days > 0;
        prop_assert_eq!(outcome.is_valid(), expected_valid);
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_number_shape() {
    assert!(is_valid_certificate_number("SD-202501-1A2B3C4D"));
    assert!(!is_valid_certificate_number("SD-202501-1A2B3C4"));
    assert!(!is_valid_certificate_number("XX-202501-1A2B3C4D"));
    assert!(!is_valid_certificate_number("SD-2025-01-1A2B3C4D"));
    assert!(!is_valid_certificate_number("SD-202501-1A2B3C4G"));
}

#[test]
fn test_no_validity_never_expires() {
    let issued = Utc.with_ymd_and_hms(2025, 1, 15, 8, 0, 0).unwrap();
    assert_eq!(expiry_from_validity(issued, None), None);
    assert_eq!(expiry_from_validity(issued, Some(0)), None);
    assert_eq!(
        verification_outcome(CertificateStatus::Issued, None, issued + Duration::days(10_000)),
        VerificationOutcome::Valid
    );
}

#[test]
fn test_revoked_wins_over_expiry() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    assert_eq!(
        verification_outcome(CertificateStatus::Revoked, Some(now + Duration::days(30)), now),
        VerificationOutcome::Revoked
    );
}

#[test]
fn test_expiry_at_boundary_is_expired() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
    assert_eq!(
        verification_outcome(CertificateStatus::Issued, Some(now), now),
        VerificationOutcome::Expired
    );
}

#[test]
fn test_days_until_expiry() {
    let now = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
    assert_eq!(days_until_expiry(now + Duration::days(30), now), 30);
    assert_eq!(days_until_expiry(now - Duration::days(2), now), -2);
}

#[test]
fn test_outcome_labels() {
    assert_eq!(VerificationOutcome::InvalidSignature.as_str(), "invalid_signature");
    assert_eq!(VerificationOutcome::NotFound.as_str(), "not_found");
    assert!(!VerificationOutcome::Expired.is_valid());
}
