//! Validation utilities for the safety training LMS
//!
//! Includes identity document rules for Colombia, Panama and Peru.

use rust_decimal::Decimal;

use crate::models::DocumentType;

// ============================================================================
// Account Validations
// ============================================================================

/// Validate email format (basic check)
pub fn validate_email(email: &str) -> Result<(), &'static str> {
    let Some((local, domain)) = email.split_once('@') else {
        return Err("Invalid email format");
    };
    if local.is_empty() || !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.')
    {
        return Err("Invalid email format");
    }
    if email.chars().any(char::is_whitespace) {
        return Err("Invalid email format");
    }
    Ok(())
}

/// Validate password strength: at least 8 characters with a letter and a digit
pub fn validate_password(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters");
    }
    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain a letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain a digit");
    }
    Ok(())
}

/// Validate an identity document number for its type
pub fn validate_document_number(
    document_type: DocumentType,
    number: &str,
) -> Result<(), &'static str> {
    let number = number.trim();
    let len = number.len();
    match document_type {
        DocumentType::CitizenId => {
            if !(6..=10).contains(&len) || !number.chars().all(|c| c.is_ascii_digit()) {
                return Err("Citizen ID must be 6-10 digits");
            }
        }
        DocumentType::IdentityCard => {
            if !(10..=11).contains(&len) || !number.chars().all(|c| c.is_ascii_digit()) {
                return Err("Identity card must be 10-11 digits");
            }
        }
        DocumentType::ForeignerId | DocumentType::Passport => {
            if !(6..=12).contains(&len) || !number.chars().all(|c| c.is_ascii_alphanumeric()) {
                return Err("Document must be 6-12 alphanumeric characters");
            }
        }
    }
    Ok(())
}

/// Validate phone number: optional leading `+`, 7-15 digits, spaces and dashes allowed
pub fn validate_phone(phone: &str) -> Result<(), &'static str> {
    let trimmed = phone.trim();
    let body = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if !body
        .chars()
        .all(|c| c.is_ascii_digit() || c == ' ' || c == '-')
    {
        return Err("Invalid phone number format");
    }
    let digits = body.chars().filter(|c| c.is_ascii_digit()).count();
    if !(7..=15).contains(&digits) {
        return Err("Phone number must have 7-15 digits");
    }
    Ok(())
}

// ============================================================================
// Content Validations
// ============================================================================

/// Validate course code: 3-30 uppercase alphanumerics or dashes, e.g. `SEG-ALT-001`
pub fn validate_course_code(code: &str) -> Result<(), &'static str> {
    if code.len() < 3 {
        return Err("Course code must be at least 3 characters");
    }
    if code.len() > 30 {
        return Err("Course code must be at most 30 characters");
    }
    if !code
        .chars()
        .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Course code must be uppercase alphanumeric or dashes");
    }
    if code.starts_with('-') || code.ends_with('-') {
        return Err("Course code cannot start or end with a dash");
    }
    Ok(())
}

/// Validate a percentage value in 0..=100
pub fn validate_percentage(value: Decimal) -> Result<(), &'static str> {
    if value < Decimal::ZERO || value > Decimal::from(100) {
        return Err("Percentage must be between 0 and 100");
    }
    Ok(())
}

/// Validate a passing score in 0..=100
pub fn validate_passing_score(score: i32) -> Result<(), &'static str> {
    if !(0..=100).contains(&score) {
        return Err("Passing score must be between 0 and 100");
    }
    Ok(())
}

/// Validate a slug (lowercase letters, digits, dashes)
pub fn validate_slug(slug: &str) -> Result<(), &'static str> {
    if slug.is_empty()
        || !slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err("Slug must be lowercase letters, digits and dashes");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_emails() {
        assert!(validate_email("ana@empresa.com.co").is_ok());
        assert!(validate_email("a.b+c@x.pe").is_ok());
    }

    #[test]
    fn test_invalid_emails() {
        assert!(validate_email("ana").is_err());
        assert!(validate_email("@x.com").is_err());
        assert!(validate_email("ana@localhost").is_err());
        assert!(validate_email("ana @x.com").is_err());
        assert!(validate_email("ana@x.").is_err());
    }

    #[test]
    fn test_password_rules() {
        assert!(validate_password("seguro123").is_ok());
        assert!(validate_password("short1").is_err());
        assert!(validate_password("sinnumeros").is_err());
        assert!(validate_password("12345678").is_err());
    }

    #[test]
    fn test_document_numbers() {
        assert!(validate_document_number(DocumentType::CitizenId, "1020304050").is_ok());
        assert!(validate_document_number(DocumentType::CitizenId, "12345").is_err());
        assert!(validate_document_number(DocumentType::CitizenId, "12AB5678").is_err());
        assert!(validate_document_number(DocumentType::Passport, "PE123456").is_ok());
        assert!(validate_document_number(DocumentType::IdentityCard, "1002003004").is_ok());
        assert!(validate_document_number(DocumentType::ForeignerId, "E-12345").is_err());
    }

    #[test]
    fn test_phone_numbers() {
        assert!(validate_phone("+57 300 123 4567").is_ok());
        assert!(validate_phone("6123-4567").is_ok());
        assert!(validate_phone("123").is_err());
        assert!(validate_phone("+57 (300) 1234567").is_err());
    }

    #[test]
    fn test_course_codes() {
        assert!(validate_course_code("SEG-ALT-001").is_ok());
        assert!(validate_course_code("AB").is_err());
        assert!(validate_course_code("seg-001").is_err());
        assert!(validate_course_code("-SEG").is_err());
    }

    #[test]
    fn test_percentage_and_score() {
        assert!(validate_percentage(Decimal::from(100)).is_ok());
        assert!(validate_percentage(Decimal::from(-1)).is_err());
        assert!(validate_passing_score(80).is_ok());
        assert!(validate_passing_score(101).is_err());
    }

    #[test]
    fn test_slugs() {
        assert!(validate_slug("first-course").is_ok());
        assert!(validate_slug("First").is_err());
        assert!(validate_slug("").is_err());
    }
}
