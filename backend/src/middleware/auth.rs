//! Authentication middleware
//!
//! JWT authentication and role-based access control middleware

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use shared::models::{Action, Resource, UserRole};
use uuid::Uuid;

use crate::error::{AppError, AppResult, ErrorDetail, ErrorResponse};
use crate::services::auth::decode_access_token;
use crate::AppState;

/// Authenticated user information extracted from JWT
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub role: UserRole,
    pub job_profile: Option<String>,
    pub permissions: Vec<String>,
}

impl AuthUser {
    /// Check if user has a specific permission
    pub fn has_permission(&self, resource: Resource, action: Action) -> bool {
        let permission = format!("{}:{}", resource.as_str(), action.as_str());
        self.permissions.contains(&permission)
    }

    /// Check if user has any of the specified permissions
    pub fn has_any_permission(&self, perms: &[(Resource, Action)]) -> bool {
        perms.iter().any(|(r, a)| self.has_permission(*r, *a))
    }

    /// Fail with 403 unless the user holds the permission
    pub fn require(&self, resource: Resource, action: Action) -> AppResult<()> {
        if self.has_permission(resource, action) {
            Ok(())
        } else {
            Err(AppError::InsufficientPermissions)
        }
    }

    /// Users may always act on their own records; others need the view permission
    pub fn require_self_or(&self, user_id: Uuid, resource: Resource) -> AppResult<()> {
        if self.user_id == user_id {
            return Ok(());
        }
        self.require(resource, Action::View)
    }

    pub fn is_admin(&self) -> bool {
        self.role == UserRole::Admin
    }
}

/// Authentication middleware that validates JWT tokens
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_header = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let token = match auth_header.and_then(|h| h.strip_prefix("Bearer ")) {
        Some(token) => token,
        None => return unauthorized_response("Missing or invalid Authorization header"),
    };

    let claims = match decode_access_token(token, &state.config.jwt.secret) {
        Ok(claims) => claims,
        Err(AppError::TokenExpired) => return unauthorized_response("Token has expired"),
        Err(_) => return unauthorized_response("Invalid token"),
    };

    let user_id = match Uuid::parse_str(&claims.sub) {
        Ok(id) => id,
        Err(_) => return unauthorized_response("Invalid user ID in token"),
    };

    let auth_user = AuthUser {
        user_id,
        role: claims.role,
        job_profile: claims.job_profile,
        permissions: claims.permissions,
    };

    request.extensions_mut().insert(auth_user);

    next.run(request).await
}

/// Create unauthorized response
fn unauthorized_response(message: &str) -> Response {
    let error = ErrorResponse {
        error: ErrorDetail::new("UNAUTHORIZED", message, "No autorizado"),
    };

    (StatusCode::UNAUTHORIZED, Json(error)).into_response()
}

/// Extractor for authenticated user
/// Use this in handlers to get the current user
#[derive(Clone, Debug)]
pub struct CurrentUser(pub AuthUser);

#[axum::async_trait]
impl<S> axum::extract::FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, Json<ErrorResponse>);

    async fn from_request_parts(
        parts: &mut axum::http::request::Parts,
        _state: &S,
    ) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .map(CurrentUser)
            .ok_or_else(|| {
                let error = ErrorResponse {
                    error: ErrorDetail::new(
                        "UNAUTHORIZED",
                        "Authentication required",
                        "Debe iniciar sesión",
                    ),
                };
                (StatusCode::UNAUTHORIZED, Json(error))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(role: UserRole) -> AuthUser {
        AuthUser {
            user_id: Uuid::new_v4(),
            role,
            job_profile: None,
            permissions: role.permissions(),
        }
    }

    #[test]
    fn test_require_permission() {
        let instructor = user(UserRole::Instructor);
        assert!(instructor.require(Resource::Course, Action::Edit).is_ok());
        assert!(instructor.require(Resource::User, Action::Create).is_err());
    }

    #[test]
    fn test_self_access() {
        let worker = user(UserRole::Worker);
        assert!(worker
            .require_self_or(worker.user_id, Resource::Enrollment)
            .is_ok());
        assert!(worker
            .require_self_or(Uuid::new_v4(), Resource::Enrollment)
            .is_err());

        let auditor = user(UserRole::Auditor);
        assert!(auditor
            .require_self_or(Uuid::new_v4(), Resource::Enrollment)
            .is_ok());
    }
}
