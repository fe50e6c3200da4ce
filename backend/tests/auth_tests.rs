//! Authentication and authorization rule tests
//!
//! Property-based and unit tests for:
//! - Role grants and permission strings
//! - Supervisor detection and login eligibility
//! - Account and course field validation

use proptest::prelude::*;
use shared::models::{
    can_login, is_supervisor, Action, DocumentType, Resource, UserRole, UserStatus,
    SUPERVISOR_PROFILES,
};
use shared::validation::{
    validate_course_code, validate_document_number, validate_email, validate_password,
    validate_phone,
};

// ============================================================================
// Property Test Strategies
// ============================================================================

fn role_strategy() -> impl Strategy<Value = UserRole> {
    prop_oneof![
        Just(UserRole::Admin),
        Just(UserRole::Supervisor),
        Just(UserRole::Instructor),
        Just(UserRole::Worker),
        Just(UserRole::Auditor),
    ]
}

const RESOURCES: [&str; 8] = [
    "users",
    "courses",
    "enrollments",
    "assessments",
    "certificates",
    "learning_paths",
    "notifications",
    "reports",
];

const ACTIONS: [&str; 7] = ["view", "create", "edit", "delete", "assign", "grade", "export"];

// ============================================================================
// Property-Based Tests
// ============================================================================

proptest! {
    /// Every permission string is `resource:action` over known names
    #[test]
    fn test_permission_strings_well_formed(role in role_strategy()) {
        for permission in role.permissions() {
            let (resource, action) = permission.split_once(':').unwrap();
            prop_assert!(RESOURCES.contains(&resource), "unknown resource {}", resource);
            prop_assert!(ACTIONS.contains(&action), "unknown action {}", action);
        }
    }

    /// No role holds a permission the admin lacks
    #[test]
    fn test_admin_is_superset(role in role_strategy()) {
        let admin = UserRole::Admin.permissions();
        for permission in role.permissions() {
            prop_assert!(admin.contains(&permission));
        }
    }

    /// Supervisor roles are supervisors whatever their profile
    #[test]
    fn test_supervisor_roles(profile in proptest::option::of("[A-Z_]{3,12}")) {
        prop_assert!(is_supervisor(UserRole::Admin, profile.as_deref()));
        prop_assert!(is_supervisor(UserRole::Supervisor, profile.as_deref()));
    }

    /// Generated addresses of the usual shape validate
    #[test]
    fn test_valid_emails(local in "[a-z][a-z0-9.]{0,15}", domain in "[a-z]{2,10}\\.[a-z]{2,4}") {
        let email = format!("{}@{}", local, domain);
        prop_assert!(validate_email(&email).is_ok());
    }

    /// Citizen IDs are 6-10 digits
    #[test]
    fn test_citizen_id_lengths(number in "[0-9]{1,14}") {
        let ok = (6..=10).contains(&number.len());
        prop_assert_eq!(
            validate_document_number(DocumentType::CitizenId, &number).is_ok(),
            ok
        );
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[test]
fn test_admin_has_every_permission() {
    let admin = UserRole::Admin.permissions();
    assert_eq!(admin.len(), RESOURCES.len() * ACTIONS.len());
    assert!(admin.contains(&"certificates:delete".to_string()));
}

#[test]
fn test_worker_has_no_grants() {
    assert!(UserRole::Worker.permissions().is_empty());
}

#[test]
fn test_role_grants() {
    let instructor = UserRole::Instructor.permissions();
    assert!(instructor.contains(&"assessments:grade".to_string()));
    assert!(!instructor.contains(&"users:view".to_string()));

    let supervisor = UserRole::Supervisor.permissions();
    assert!(supervisor.contains(&"learning_paths:assign".to_string()));
    assert!(supervisor.contains(&"reports:export".to_string()));
    assert!(!supervisor.contains(&"courses:edit".to_string()));

    let auditor = UserRole::Auditor.permissions();
    assert!(auditor.contains(&"certificates:view".to_string()));
    assert!(!auditor.contains(&"enrollments:assign".to_string()));
}

#[test]
fn test_resource_and_action_names() {
    assert_eq!(Resource::LearningPath.as_str(), "learning_paths");
    assert_eq!(Action::Export.as_str(), "export");
}

#[test]
fn test_supervisor_by_job_profile() {
    for profile in SUPERVISOR_PROFILES {
        assert!(is_supervisor(UserRole::Worker, Some(profile)));
    }
    assert!(is_supervisor(UserRole::Worker, Some(" jefe_cuadrilla ")));
    assert!(!is_supervisor(UserRole::Worker, Some("OPERARIO")));
    assert!(!is_supervisor(UserRole::Instructor, None));
}

#[test]
fn test_only_active_users_login() {
    assert!(can_login(UserStatus::Active));
    assert!(!can_login(UserStatus::Inactive));
    assert!(!can_login(UserStatus::Suspended));
}

#[test]
fn test_email_validation() {
    assert!(validate_email("operario@empresa.co").is_ok());
    assert!(validate_email("sin-arroba.co").is_err());
    assert!(validate_email("@empresa.co").is_err());
    assert!(validate_email("a@empresa").is_err());
    assert!(validate_email("a b@empresa.co").is_err());
}

#[test]
fn test_password_validation() {
    assert!(validate_password("seguro123").is_ok());
    assert_eq!(
        validate_password("abc12"),
        Err("Password must be at least 8 characters")
    );
    assert_eq!(validate_password("12345678"), Err("Password must contain a letter"));
    assert_eq!(validate_password("abcdefgh"), Err("Password must contain a digit"));
}

#[test]
fn test_document_validation() {
    assert!(validate_document_number(DocumentType::IdentityCard, "1012345678").is_ok());
    assert!(validate_document_number(DocumentType::IdentityCard, "123456").is_err());
    assert!(validate_document_number(DocumentType::Passport, "AB123456").is_ok());
    assert!(validate_document_number(DocumentType::ForeignerId, "E-1234").is_err());
}

#[test]
fn test_phone_validation() {
    assert!(validate_phone("+57 300 123 4567").is_ok());
    assert!(validate_phone("300-1234").is_ok());
    assert!(validate_phone("12345").is_err());
    assert!(validate_phone("300 abc 4567").is_err());
}

#[test]
fn test_course_code_validation() {
    assert!(validate_course_code("SEG-ALT-001").is_ok());
    assert!(validate_course_code("AB").is_err());
    assert!(validate_course_code("seg-alt").is_err());
    assert!(validate_course_code("-SEG").is_err());
}
