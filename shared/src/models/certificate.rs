//! Certificate models and validity rules

use chrono::{DateTime, Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Prefix of every certificate number
pub const CERTIFICATE_PREFIX: &str = "SD";

/// Days counted per month of validity
pub const DAYS_PER_VALIDITY_MONTH: i64 = 30;

/// Certificate status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "certificate_status", rename_all = "snake_case"))]
pub enum CertificateStatus {
    Issued,
    Revoked,
    Expired,
}

/// Outcome of a public verification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Valid,
    Revoked,
    Expired,
    NotFound,
    InvalidSignature,
}

impl VerificationOutcome {
    pub fn is_valid(&self) -> bool {
        matches!(self, VerificationOutcome::Valid)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationOutcome::Valid => "valid",
            VerificationOutcome::Revoked => "revoked",
            VerificationOutcome::Expired => "expired",
            VerificationOutcome::NotFound => "not_found",
            VerificationOutcome::InvalidSignature => "invalid_signature",
        }
    }
}

/// Build a certificate number such as `SD-202501-1A2B3C4D`
pub fn format_certificate_number(issued_at: DateTime<Utc>, random_hex: &str) -> String {
    let suffix: String = random_hex
        .chars()
        .filter(|c| c.is_ascii_hexdigit())
        .take(8)
        .collect::<String>()
        .to_uppercase();
    format!(
        "{}-{:04}{:02}-{}",
        CERTIFICATE_PREFIX,
        issued_at.year(),
        issued_at.month(),
        suffix
    )
}

/// Check the shape of a certificate number before hitting the database
pub fn is_valid_certificate_number(number: &str) -> bool {
    let parts: Vec<&str> = number.split('-').collect();
    match parts.as_slice() {
        [prefix, period, code] => {
            *prefix == CERTIFICATE_PREFIX
                && period.len() == 6
                && period.chars().all(|c| c.is_ascii_digit())
                && code.len() == 8
                && code
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c))
        }
        _ => false,
    }
}

/// Expiry computed from the course validity; `None` means the certificate never expires
pub fn expiry_from_validity(
    issued_at: DateTime<Utc>,
    validity_months: Option<i32>,
) -> Option<DateTime<Utc>> {
    match validity_months {
        Some(months) if months > 0 => {
            Some(issued_at + Duration::days(i64::from(months) * DAYS_PER_VALIDITY_MONTH))
        }
        _ => None,
    }
}

/// Verification result for a stored certificate at `now`
pub fn verification_outcome(
    status: CertificateStatus,
    expires_at: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> VerificationOutcome {
    match status {
        CertificateStatus::Revoked => VerificationOutcome::Revoked,
        CertificateStatus::Expired => VerificationOutcome::Expired,
        CertificateStatus::Issued => match expires_at {
            Some(expiry) if expiry <= now => VerificationOutcome::Expired,
            _ => VerificationOutcome::Valid,
        },
    }
}

/// Whole days until expiry (negative when already expired)
pub fn days_until_expiry(expires_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (expires_at - now).num_days()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_certificate_number_format() {
        let issued = Utc.with_ymd_and_hms(2025, 3, 14, 10, 0, 0).unwrap();
        let number = format_certificate_number(issued, "1a2b3c4d9999");
        assert_eq!(number, "SD-202503-1A2B3C4D");
        assert!(is_valid_certificate_number(&number));
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(!is_valid_certificate_number("SD-2025-1A2B3C4D"));
        assert!(!is_valid_certificate_number("XX-202503-1A2B3C4D"));
        assert!(!is_valid_certificate_number("SD-202503-1a2b3c4d"));
        assert!(!is_valid_certificate_number("SD-202503-1A2B3C4G"));
        assert!(!is_valid_certificate_number(""));
    }

    #[test]
    fn test_expiry_from_validity() {
        let issued = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let expiry = expiry_from_validity(issued, Some(12)).unwrap();
        assert_eq!((expiry - issued).num_days(), 360);
        assert!(expiry_from_validity(issued, None).is_none());
        assert!(expiry_from_validity(issued, Some(0)).is_none());
    }

    #[test]
    fn test_verification_outcomes() {
        let now = Utc::now();
        assert_eq!(
            verification_outcome(CertificateStatus::Issued, None, now),
            VerificationOutcome::Valid
        );
        assert_eq!(
            verification_outcome(CertificateStatus::Issued, Some(now - Duration::days(1)), now),
            VerificationOutcome::Expired
        );
        assert_eq!(
            verification_outcome(CertificateStatus::Revoked, Some(now + Duration::days(10)), now),
            VerificationOutcome::Revoked
        );
        assert_eq!(
            verification_outcome(CertificateStatus::Expired, None, now),
            VerificationOutcome::Expired
        );
    }
}
