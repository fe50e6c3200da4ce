//! WebAssembly module for the Safety Training LMS
//!
//! Provides client-side computation for the offline app:
//! - Objective question grading and attempt scoring
//! - Lesson and course progress
//! - Certificate number and validity checks
//! - Quiet hours and offline progress merging

use chrono::{DateTime, NaiveTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use uuid::Uuid;
use wasm_bindgen::prelude::*;

// Re-export shared types for use in JavaScript
pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("lms-wasm ready"));
}

fn js_error(context: &str, e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{}: {}", context, e))
}

fn parse_json<T: DeserializeOwned>(context: &str, json: &str) -> Result<T, JsValue> {
    serde_json::from_str(json).map_err(|e| js_error(context, e))
}

/// Parse a snake_case enum name such as `multiple_choice`
fn parse_enum<T: DeserializeOwned>(context: &str, name: &str) -> Result<T, JsValue> {
    serde_json::from_value(serde_json::Value::String(name.to_string()))
        .map_err(|e| js_error(context, e))
}

fn to_decimal(value: f64) -> Decimal {
    Decimal::try_from(value).unwrap_or(Decimal::ZERO)
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(0.0)
}

fn parse_time(value: &str) -> Option<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .ok()
}

#[cfg(target_arch = "wasm32")]
fn now() -> DateTime<Utc> {
    DateTime::from_timestamp_millis(js_sys::Date::now() as i64).unwrap_or_default()
}

#[cfg(not(target_arch = "wasm32"))]
fn now() -> DateTime<Utc> {
    Utc::now()
}

// ============================================================================
// Assessments
// ============================================================================

/// Grade an objective question; ids are JSON arrays of UUID strings
#[wasm_bindgen]
pub fn grade_question(
    question_type: &str,
    selected_json: &str,
    correct_json: &str,
) -> Result<bool, JsValue> {
    let question_type: QuestionType = parse_enum("Invalid question type", question_type)?;
    let selected: Vec<Uuid> = parse_json("Invalid selected answers", selected_json)?;
    let correct: Vec<Uuid> = parse_json("Invalid correct answers", correct_json)?;
    Ok(grade_objective(question_type, &selected, &correct))
}

/// Percentage score of an attempt
#[wasm_bindgen]
pub fn attempt_score(earned_points: f64, total_points: f64) -> f64 {
    let outcome = grade_attempt(to_decimal(earned_points), to_decimal(total_points), 0);
    to_f64(outcome.score)
}

/// Whether an attempt passes
#[wasm_bindgen]
pub fn attempt_passed(earned_points: f64, total_points: f64, passing_score: i32) -> bool {
    grade_attempt(to_decimal(earned_points), to_decimal(total_points), passing_score).passed
}

/// Attempts left; -1 when unlimited
#[wasm_bindgen]
pub fn remaining_attempts(max_attempts: i32, used_attempts: i32) -> i32 {
    attempts_remaining(max_attempts, i64::from(used_attempts))
        .map(|left| left as i32)
        .unwrap_or(-1)
}

/// Seconds left on a timed attempt; -1 when untimed
#[wasm_bindgen]
pub fn attempt_seconds_left(started_at: &str, time_limit_minutes: i32) -> Result<i64, JsValue> {
    if time_limit_minutes <= 0 {
        return Ok(-1);
    }
    let started: DateTime<Utc> = started_at
        .parse()
        .map_err(|e| js_error("Invalid start time", e))?;
    let current = now();
    if is_time_expired(started, Some(time_limit_minutes), current) {
        return Ok(0);
    }
    let deadline = started + chrono::Duration::minutes(i64::from(time_limit_minutes));
    Ok((deadline - current).num_seconds().max(0))
}

// ============================================================================
// Progress
// ============================================================================

/// Whether a lesson counts as complete
#[wasm_bindgen]
pub fn lesson_completed(flagged: bool, progress_percent: f64) -> bool {
    is_lesson_completed(flagged, to_decimal(progress_percent))
}

/// Course progress from mandatory lessons
#[wasm_bindgen]
pub fn course_progress(completed_mandatory: i32, total_mandatory: i32) -> f64 {
    to_f64(enrollment_progress(
        i64::from(completed_mandatory),
        i64::from(total_mandatory),
    ))
}

/// Learning path progress from required courses
#[wasm_bindgen]
pub fn learning_path_progress(completed_required: i32, total_required: i32) -> f64 {
    to_f64(path_progress(
        i64::from(completed_required),
        i64::from(total_required),
    ))
}

/// Whether a path course is still locked; `completed_orders` is a JSON array
#[wasm_bindgen]
pub fn path_course_locked(unlock_after: Option<i32>, completed_orders_json: &str) -> Result<bool, JsValue> {
    let completed: Vec<i32> = parse_json("Invalid completed orders", completed_orders_json)?;
    Ok(is_course_locked(unlock_after, &completed))
}

/// Merge local and server lesson progress snapshots (JSON) into one
#[wasm_bindgen]
pub fn merge_progress(local_json: &str, server_json: &str) -> Result<String, JsValue> {
    let local: ProgressSnapshot = parse_json("Invalid local progress", local_json)?;
    let server: ProgressSnapshot = parse_json("Invalid server progress", server_json)?;
    serde_json::to_string(&local.merge(&server)).map_err(|e| js_error("Serialization failed", e))
}

// ============================================================================
// Certificates
// ============================================================================

/// Shape check of a certificate number before going online
#[wasm_bindgen]
pub fn certificate_number_valid(number: &str) -> bool {
    is_valid_certificate_number(&number.trim().to_uppercase())
}

/// Validity of a cached certificate: `valid`, `expired` or `revoked`
#[wasm_bindgen]
pub fn certificate_validity(status: &str, expires_at: Option<String>) -> Result<String, JsValue> {
    let status: CertificateStatus = parse_enum("Invalid certificate status", status)?;
    let expires_at = expires_at
        .map(|e| e.parse::<DateTime<Utc>>())
        .transpose()
        .map_err(|e| js_error("Invalid expiry", e))?;
    Ok(verification_outcome(status, expires_at, now())
        .as_str()
        .to_string())
}

/// Whole days until a certificate expires (negative once expired)
#[wasm_bindgen]
pub fn certificate_days_left(expires_at: &str) -> Result<i64, JsValue> {
    let expires: DateTime<Utc> = expires_at
        .parse()
        .map_err(|e| js_error("Invalid expiry", e))?;
    Ok(days_until_expiry(expires, now()))
}

// ============================================================================
// Notifications
// ============================================================================

/// Whether `now` (HH:MM) falls inside the quiet window
#[wasm_bindgen]
pub fn quiet_hours_active(start: Option<String>, end: Option<String>, now: &str) -> bool {
    match parse_time(now) {
        Some(current) => in_quiet_hours(
            start.as_deref().and_then(parse_time),
            end.as_deref().and_then(parse_time),
            current,
        ),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_question_ignores_selection_order() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let selected = serde_json::to_string(&[b, a]).unwrap();
        let correct = serde_json::to_string(&[a, b]).unwrap();
        assert!(grade_question("multiple_choice", &selected, &correct).unwrap());
        assert!(!grade_question("ordering", &selected, &correct).unwrap());
    }

    #[test]
    fn test_attempt_scoring() {
        assert!((attempt_score(8.0, 10.0) - 80.0).abs() < 0.001);
        assert!(attempt_passed(8.0, 10.0, 80));
        assert!(!attempt_passed(7.5, 10.0, 80));
        assert_eq!(attempt_score(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_remaining_attempts() {
        assert_eq!(remaining_attempts(3, 1), 2);
        assert_eq!(remaining_attempts(3, 5), 0);
        assert_eq!(remaining_attempts(0, 9), -1);
    }

    #[test]
    fn test_untimed_attempt() {
        assert_eq!(attempt_seconds_left("2025-01-01T00:00:00Z", 0).unwrap(), -1);
        assert_eq!(attempt_seconds_left("2000-01-01T00:00:00Z", 30).unwrap(), 0);
    }

    #[test]
    fn test_progress() {
        assert!(lesson_completed(false, 100.0));
        assert!(!lesson_completed(false, 99.5));
        assert!((course_progress(1, 3) - 33.33).abs() < 0.001);
        assert_eq!(learning_path_progress(0, 0), 0.0);
    }

    #[test]
    fn test_path_course_locked() {
        assert!(path_course_locked(Some(2), "[1]").unwrap());
        assert!(!path_course_locked(Some(1), "[1]").unwrap());
        assert!(!path_course_locked(None, "[]").unwrap());
    }

    #[test]
    fn test_merge_keeps_furthest_progress() {
        let local = r#"{"progress_percent":"60","is_completed":false,"time_spent_seconds":900,"last_position":"p6"}"#;
        let server = r#"{"progress_percent":"40","is_completed":false,"time_spent_seconds":1200,"last_position":"p4"}"#;
        let merged: ProgressSnapshot =
            serde_json::from_str(&merge_progress(local, server).unwrap()).unwrap();
        assert_eq!(merged.progress_percent, Decimal::from(60));
        assert_eq!(merged.time_spent_seconds, 1200);
        assert_eq!(merged.last_position.as_deref(), Some("p6"));
    }

    #[test]
    fn test_certificate_checks() {
        assert!(certificate_number_valid(" sd-202501-1a2b3c4d "));
        assert!(!certificate_number_valid("SD-2025-1A2B3C4D"));
        assert_eq!(certificate_validity("revoked", None).unwrap(), "revoked");
        assert_eq!(
            certificate_validity("issued", Some("2000-01-01T00:00:00Z".to_string())).unwrap(),
            "expired"
        );
        assert_eq!(certificate_validity("issued", None).unwrap(), "valid");
    }

    #[test]
    fn test_quiet_hours_wrap_midnight() {
        let start = Some("22:00".to_string());
        let end = Some("06:00".to_string());
        assert!(quiet_hours_active(start.clone(), end.clone(), "23:30"));
        assert!(quiet_hours_active(start.clone(), end.clone(), "05:59"));
        assert!(!quiet_hours_active(start, end, "12:00"));
        assert!(!quiet_hours_active(None, None, "23:30"));
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    // Exercises the js_sys clock used by the offline client
    #[wasm_bindgen_test]
    fn test_clock_driven_checks() {
        let started = DateTime::from_timestamp_millis(js_sys::Date::now() as i64)
            .unwrap()
            .to_rfc3339();
        let left = attempt_seconds_left(&started, 30).unwrap();
        assert!(left > 29 * 60 && left <= 30 * 60);

        let expires = (now() + chrono::Duration::days(10)).to_rfc3339();
        let days = certificate_days_left(&expires).unwrap();
        assert!((9..=10).contains(&days));
        assert_eq!(certificate_validity("issued", Some(expires)).unwrap(), "valid");
    }
}
