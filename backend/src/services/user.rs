//! User administration service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::models::{is_supervisor, DocumentType, UserRole, UserStatus};
use shared::types::{Country, Language, PaginatedResponse, Pagination};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::services::auth::hash_password;

/// User administration service
#[derive(Clone)]
pub struct UserService {
    db: PgPool,
}

/// User profile (never includes the password hash)
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub document_type: DocumentType,
    pub document_number: String,
    pub phone: Option<String>,
    pub job_position: Option<String>,
    pub job_profile: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub country: Country,
    pub preferred_language: String,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn is_supervisor(&self) -> bool {
        is_supervisor(self.role, self.job_profile.as_deref())
    }
}

/// User profile plus derived flags
#[derive(Debug, Serialize)]
pub struct UserProfile {
    #[serde(flatten)]
    pub user: User,
    pub full_name: String,
    pub is_supervisor: bool,
    pub permissions: Vec<String>,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            is_supervisor: user.is_supervisor(),
            permissions: user.role.permissions(),
            user,
        }
    }
}

/// Input for creating a user
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserInput {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    pub document_type: Option<DocumentType>,
    pub document_number: String,
    pub phone: Option<String>,
    pub job_position: Option<String>,
    pub job_profile: Option<String>,
    pub role: Option<UserRole>,
    pub country: Option<Country>,
    pub preferred_language: Option<String>,
}

/// Input for updating a user
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserInput {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub job_position: Option<String>,
    pub job_profile: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub country: Option<Country>,
    pub preferred_language: Option<String>,
}

/// Filters for listing users
#[derive(Debug, Default, Deserialize)]
pub struct UserFilters {
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub job_profile: Option<String>,
    pub search: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

const USER_COLUMNS: &str = r#"
    id, email, first_name, last_name, document_type, document_number, phone,
    job_position, job_profile, role, status, country, preferred_language,
    last_login_at, created_at, updated_at
"#;

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get a user by ID
    pub async fn get_user(&self, user_id: Uuid) -> AppResult<User> {
        sqlx::query_as::<_, User>(&format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS))
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Create a user account
    pub async fn create_user(&self, input: CreateUserInput) -> AppResult<User> {
        input.validate()?;

        shared::validate_password(&input.password).map_err(|msg| {
            AppError::validation(
                "password",
                msg,
                "La contraseña debe tener al menos 8 caracteres, una letra y un número",
            )
        })?;

        let document_type = input.document_type.unwrap_or(DocumentType::CitizenId);
        shared::validate_document_number(document_type, &input.document_number).map_err(
            |msg| AppError::validation("document_number", msg, "Número de documento inválido"),
        )?;

        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(|msg| {
                AppError::validation("phone", msg, "Número de teléfono inválido")
            })?;
        }

        let existing = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM users WHERE LOWER(email) = LOWER($1)",
        )
        .bind(&input.email)
        .fetch_one(&self.db)
        .await?;
        if existing > 0 {
            return Err(AppError::DuplicateEntry("email".to_string()));
        }

        let password_hash = hash_password(&input.password)?;

        let mut tx = self.db.begin().await?;

        let user = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (
                email, password_hash, first_name, last_name, document_type, document_number,
                phone, job_position, job_profile, role, country, preferred_language
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(input.email.trim().to_lowercase())
        .bind(&password_hash)
        .bind(input.first_name.trim())
        .bind(input.last_name.trim())
        .bind(document_type)
        .bind(input.document_number.trim())
        .bind(&input.phone)
        .bind(&input.job_position)
        .bind(input.job_profile.as_deref().map(normalize_profile))
        .bind(input.role.unwrap_or(UserRole::Worker))
        .bind(input.country.unwrap_or_default())
        .bind(
            input
                .preferred_language
                .as_deref()
                .map(Language::from_code)
                .unwrap_or_default()
                .code(),
        )
        .fetch_one(&mut *tx)
        .await?;

        // Every user gets default notification preferences and a points ledger
        sqlx::query("INSERT INTO notification_preferences (user_id) VALUES ($1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO user_points (user_id, level) VALUES ($1, 1)")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(user_id = %user.id, role = %user.role, "User created");

        Ok(user)
    }

    /// Update a user
    pub async fn update_user(&self, user_id: Uuid, input: UpdateUserInput) -> AppResult<User> {
        input.validate()?;

        if let Some(phone) = input.phone.as_deref() {
            shared::validate_phone(phone).map_err(|msg| {
                AppError::validation("phone", msg, "Número de teléfono inválido")
            })?;
        }

        sqlx::query_as::<_, User>(&format!(
            r#"
            UPDATE users SET
                first_name = COALESCE($2, first_name),
                last_name = COALESCE($3, last_name),
                phone = COALESCE($4, phone),
                job_position = COALESCE($5, job_position),
                job_profile = COALESCE($6, job_profile),
                role = COALESCE($7, role),
                status = COALESCE($8, status),
                country = COALESCE($9, country),
                preferred_language = COALESCE($10, preferred_language),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(user_id)
        .bind(&input.first_name)
        .bind(&input.last_name)
        .bind(&input.phone)
        .bind(&input.job_position)
        .bind(input.job_profile.as_deref().map(normalize_profile))
        .bind(input.role)
        .bind(input.status)
        .bind(input.country)
        .bind(
            input
                .preferred_language
                .as_deref()
                .map(|code| Language::from_code(code).code()),
        )
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("User".to_string()))
    }

    /// Deactivate a user and revoke their sessions
    pub async fn deactivate_user(&self, user_id: Uuid, acting_user: Uuid) -> AppResult<User> {
        if user_id == acting_user {
            return Err(AppError::rule("You cannot deactivate your own account"));
        }

        let mut tx = self.db.begin().await?;
        let updated = sqlx::query(
            "UPDATE users SET status = 'inactive', updated_at = NOW() WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound("User".to_string()));
        }
        sqlx::query(
            "UPDATE refresh_tokens SET revoked_at = NOW() WHERE user_id = $1 AND revoked_at IS NULL",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        self.get_user(user_id).await
    }

    /// List users with filters and pagination
    pub async fn list_users(&self, filters: UserFilters) -> AppResult<PaginatedResponse<User>> {
        let pagination = Pagination::from_query(filters.page, filters.per_page);
        let search = filters.search.as_ref().map(|s| format!("%{}%", s.trim()));
        let profile = filters.job_profile.as_deref().map(normalize_profile);

        const FILTER: &str = r#"
            WHERE ($1::user_role IS NULL OR role = $1)
              AND ($2::user_status IS NULL OR status = $2)
              AND ($3::text IS NULL OR job_profile = $3)
              AND ($4::text IS NULL OR first_name ILIKE $4 OR last_name ILIKE $4
                   OR email ILIKE $4 OR document_number ILIKE $4)
        "#;

        let total = sqlx::query_scalar::<_, i64>(&format!("SELECT COUNT(*) FROM users {}", FILTER))
            .bind(filters.role)
            .bind(filters.status)
            .bind(&profile)
            .bind(&search)
            .fetch_one(&self.db)
            .await?;

        let users = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users {} ORDER BY last_name, first_name LIMIT $5 OFFSET $6",
            USER_COLUMNS, FILTER
        ))
        .bind(filters.role)
        .bind(filters.status)
        .bind(&profile)
        .bind(&search)
        .bind(pagination.limit())
        .bind(pagination.offset())
        .fetch_all(&self.db)
        .await?;

        Ok(PaginatedResponse::new(users, &pagination, total.max(0) as u64))
    }

    /// Active users holding a job profile
    pub async fn active_users_by_profile(&self, job_profile: &str) -> AppResult<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT id FROM users WHERE job_profile = $1 AND status = 'active'",
        )
        .bind(normalize_profile(job_profile))
        .fetch_all(&self.db)
        .await?;
        Ok(ids)
    }
}

/// Job profiles are stored upper-case, e.g. `JEFE_CUADRILLA`
pub fn normalize_profile(profile: &str) -> String {
    profile.trim().to_uppercase().replace([' ', '-'], "_")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_profile() {
        assert_eq!(normalize_profile(" jefe cuadrilla "), "JEFE_CUADRILLA");
        assert_eq!(normalize_profile("liniero"), "LINIERO");
        assert_eq!(normalize_profile("jefe-cuadrilla"), "JEFE_CUADRILLA");
    }

    #[test]
    fn test_create_input_validation() {
        let input = CreateUserInput {
            email: "not-an-email".to_string(),
            password: "seguro123".to_string(),
            first_name: "Ana".to_string(),
            last_name: "Pérez".to_string(),
            document_type: None,
            document_number: "1020304050".to_string(),
            phone: None,
            job_position: None,
            job_profile: None,
            role: None,
            country: None,
            preferred_language: None,
        };
        assert!(input.validate().is_err());
    }
}
