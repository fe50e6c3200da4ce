//! User and role models

use serde::{Deserialize, Serialize};

/// Platform roles
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_role", rename_all = "snake_case"))]
pub enum UserRole {
    Admin,
    Supervisor,
    Instructor,
    Worker,
    Auditor,
}

/// Account status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "user_status", rename_all = "snake_case"))]
pub enum UserStatus {
    Active,
    Inactive,
    Suspended,
}

/// Identity document types accepted for workers
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(type_name = "document_type"))]
pub enum DocumentType {
    /// Cédula de ciudadanía
    #[serde(rename = "CC")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CC"))]
    CitizenId,
    /// Cédula de extranjería
    #[serde(rename = "CE")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "CE"))]
    ForeignerId,
    #[serde(rename = "PA")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "PA"))]
    Passport,
    /// Tarjeta de identidad
    #[serde(rename = "TI")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "TI"))]
    IdentityCard,
}

/// Resources that can be accessed
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Resource {
    User,
    Course,
    Enrollment,
    Assessment,
    Certificate,
    LearningPath,
    Notification,
    Report,
}

impl Resource {
    pub fn as_str(&self) -> &'static str {
        match self {
            Resource::User => "users",
            Resource::Course => "courses",
            Resource::Enrollment => "enrollments",
            Resource::Assessment => "assessments",
            Resource::Certificate => "certificates",
            Resource::LearningPath => "learning_paths",
            Resource::Notification => "notifications",
            Resource::Report => "reports",
        }
    }
}

/// Actions that can be performed on resources
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    View,
    Create,
    Edit,
    Delete,
    Assign,
    Grade,
    Export,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::View => "view",
            Action::Create => "create",
            Action::Edit => "edit",
            Action::Delete => "delete",
            Action::Assign => "assign",
            Action::Grade => "grade",
            Action::Export => "export",
        }
    }
}

/// Job profiles that carry supervisory duties regardless of role
pub const SUPERVISOR_PROFILES: &[&str] = &["JEFE_CUADRILLA", "SUPERVISOR", "COORDINADOR"];

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Supervisor => "supervisor",
            UserRole::Instructor => "instructor",
            UserRole::Worker => "worker",
            UserRole::Auditor => "auditor",
        }
    }

    /// Resource/action grants for this role
    pub fn grants(&self) -> Vec<(Resource, Vec<Action>)> {
        use Action::*;
        use Resource::*;

        match self {
            UserRole::Admin => [
                User,
                Course,
                Enrollment,
                Assessment,
                Certificate,
                LearningPath,
                Notification,
                Report,
            ]
            .into_iter()
            .map(|r| (r, vec![View, Create, Edit, Delete, Assign, Grade, Export]))
            .collect(),
            UserRole::Instructor => vec![
                (Course, vec![View, Create, Edit]),
                (Assessment, vec![View, Create, Edit, Grade]),
                (Enrollment, vec![View]),
                (Certificate, vec![View]),
                (LearningPath, vec![View]),
                (Report, vec![View]),
            ],
            UserRole::Supervisor => vec![
                (User, vec![View]),
                (Course, vec![View]),
                (Enrollment, vec![View, Assign]),
                (LearningPath, vec![View, Assign]),
                (Certificate, vec![View]),
                (Report, vec![View, Export]),
            ],
            UserRole::Auditor => vec![
                (Certificate, vec![View]),
                (Enrollment, vec![View]),
                (Report, vec![View, Export]),
            ],
            UserRole::Worker => vec![],
        }
    }

    /// Flattened `resource:action` permission strings carried in access tokens
    pub fn permissions(&self) -> Vec<String> {
        self.grants()
            .into_iter()
            .flat_map(|(resource, actions)| {
                actions
                    .into_iter()
                    .map(move |action| format!("{}:{}", resource.as_str(), action.as_str()))
            })
            .collect()
    }
}

impl std::fmt::Display for UserRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Whether a user supervises crews, either by role or by job profile
pub fn is_supervisor(role: UserRole, job_profile: Option<&str>) -> bool {
    if matches!(role, UserRole::Admin | UserRole::Supervisor) {
        return true;
    }
    job_profile
        .map(|p| SUPERVISOR_PROFILES.contains(&p.trim().to_uppercase().as_str()))
        .unwrap_or(false)
}

/// Only active accounts may authenticate
pub fn can_login(status: UserStatus) -> bool {
    status == UserStatus::Active
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_has_everything() {
        let perms = UserRole::Admin.permissions();
        assert!(perms.contains(&"users:create".to_string()));
        assert!(perms.contains(&"reports:export".to_string()));
        assert!(perms.contains(&"assessments:grade".to_string()));
    }

    #[test]
    fn test_worker_has_no_admin_permissions() {
        assert!(UserRole::Worker.permissions().is_empty());
    }

    #[test]
    fn test_instructor_cannot_manage_users() {
        let perms = UserRole::Instructor.permissions();
        assert!(!perms.iter().any(|p| p.starts_with("users:")));
        assert!(perms.contains(&"courses:edit".to_string()));
    }

    #[test]
    fn test_supervisor_by_profile() {
        assert!(is_supervisor(UserRole::Worker, Some("jefe_cuadrilla")));
        assert!(!is_supervisor(UserRole::Worker, Some("LINIERO")));
        assert!(!is_supervisor(UserRole::Worker, None));
        assert!(is_supervisor(UserRole::Supervisor, None));
    }

    #[test]
    fn test_only_active_can_login() {
        assert!(can_login(UserStatus::Active));
        assert!(!can_login(UserStatus::Inactive));
        assert!(!can_login(UserStatus::Suspended));
    }
}
