//! HTTP handlers for certificates and public verification

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::Html,
    Json,
};
use axum_extra::{headers::UserAgent, TypedHeader};
use serde::{Deserialize, Serialize};
use shared::models::{Action, Resource};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::{AuthUser, CurrentUser};
use crate::services::certificate::{
    Certificate, CertificateService, CertificateStatistics, CertificateSummary,
    CertificateTemplate, CreateTemplateInput, IssueCertificateInput, RevokeInput,
    VerificationResult,
};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct VerifyQuery {
    pub sig: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct MyCertificatesQuery {
    #[serde(default)]
    pub include_expired: bool,
}

#[derive(Debug, Deserialize)]
pub struct ExpiringQuery {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct EligibilityResponse {
    pub eligible: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShareLinkResponse {
    pub certificate_number: String,
    pub url: String,
}

fn service(state: &AppState) -> CertificateService {
    CertificateService::new(state.db.clone(), state.config.certificates.clone())
}

fn ensure_holder_or_viewer(user: &AuthUser, certificate: &Certificate) -> AppResult<()> {
    if certificate.user_id == user.user_id {
        Ok(())
    } else {
        user.require(Resource::Certificate, Action::View)
    }
}

/// First hop of X-Forwarded-For, if the proxy set one
fn client_ip(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|ip| ip.trim().to_string())
        .filter(|ip| !ip.is_empty())
}

// ============================================================================
// Public verification
// ============================================================================

/// Verify a certificate by number; no authentication
pub async fn verify_certificate(
    State(state): State<AppState>,
    Path(number): Path<String>,
    Query(query): Query<VerifyQuery>,
    user_agent: Option<TypedHeader<UserAgent>>,
    headers: HeaderMap,
) -> AppResult<Json<VerificationResult>> {
    let ip = client_ip(&headers);
    let agent = user_agent.map(|TypedHeader(ua)| ua.to_string());
    let result = service(&state)
        .verify(&number, query.sig.as_deref(), ip.as_deref(), agent.as_deref())
        .await?;
    Ok(Json(result))
}

// ============================================================================
// Templates
// ============================================================================

pub async fn list_templates(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<Vec<CertificateTemplate>>> {
    current_user.0.require(Resource::Certificate, Action::View)?;
    let templates = service(&state).list_templates().await?;
    Ok(Json(templates))
}

pub async fn create_template(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<CreateTemplateInput>,
) -> AppResult<(StatusCode, Json<CertificateTemplate>)> {
    current_user.0.require(Resource::Certificate, Action::Create)?;
    let template = service(&state).create_template(input).await?;
    Ok((StatusCode::CREATED, Json(template)))
}

// ============================================================================
// Certificates
// ============================================================================

pub async fn my_certificates(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<MyCertificatesQuery>,
) -> AppResult<Json<Vec<CertificateSummary>>> {
    let certificates = service(&state)
        .my_certificates(current_user.0.user_id, query.include_expired)
        .await?;
    Ok(Json(certificates))
}

pub async fn expiring_certificates(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ExpiringQuery>,
) -> AppResult<Json<Vec<CertificateSummary>>> {
    current_user.0.require(Resource::Certificate, Action::View)?;
    let days = query
        .days
        .unwrap_or(state.config.certificates.expiry_warning_days);
    if days < 0 {
        return Err(AppError::validation(
            "days",
            "Must be zero or greater",
            "Debe ser cero o mayor",
        ));
    }
    let certificates = service(&state).expiring(days).await?;
    Ok(Json(certificates))
}

pub async fn certificate_statistics(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<CertificateStatistics>> {
    current_user.0.require(Resource::Report, Action::View)?;
    let stats = service(&state).statistics().await?;
    Ok(Json(stats))
}

/// Whether an enrollment currently qualifies for a certificate
pub async fn check_eligibility(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(enrollment_id): Path<Uuid>,
) -> AppResult<Json<EligibilityResponse>> {
    current_user.0.require(Resource::Certificate, Action::View)?;
    let response = match service(&state).can_issue(enrollment_id).await? {
        Ok(()) => EligibilityResponse {
            eligible: true,
            reason: None,
        },
        Err(reason) => EligibilityResponse {
            eligible: false,
            reason: Some(reason.to_string()),
        },
    };
    Ok(Json(response))
}

pub async fn issue_certificate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Json(input): Json<IssueCertificateInput>,
) -> AppResult<(StatusCode, Json<Certificate>)> {
    current_user.0.require(Resource::Certificate, Action::Create)?;
    let certificate = service(&state).issue(input).await?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

pub async fn get_certificate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(certificate_id): Path<Uuid>,
) -> AppResult<Json<Certificate>> {
    let certificate = service(&state).get_certificate(certificate_id).await?;
    ensure_holder_or_viewer(&current_user.0, &certificate)?;
    Ok(Json(certificate))
}

/// Printable HTML rendition
pub async fn render_certificate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(certificate_id): Path<Uuid>,
) -> AppResult<Html<String>> {
    let service = service(&state);
    let certificate = service.get_certificate(certificate_id).await?;
    ensure_holder_or_viewer(&current_user.0, &certificate)?;
    let html = service.render(certificate_id).await?;
    Ok(Html(html))
}

/// Signed verification link the holder can share
pub async fn share_link(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(certificate_id): Path<Uuid>,
) -> AppResult<Json<ShareLinkResponse>> {
    let service = service(&state);
    let certificate = service.get_certificate(certificate_id).await?;
    ensure_holder_or_viewer(&current_user.0, &certificate)?;
    let url = service.signed_url(&certificate)?;
    Ok(Json(ShareLinkResponse {
        certificate_number: certificate.certificate_number,
        url,
    }))
}

pub async fn revoke_certificate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(certificate_id): Path<Uuid>,
    Json(input): Json<RevokeInput>,
) -> AppResult<Json<Certificate>> {
    current_user.0.require(Resource::Certificate, Action::Delete)?;
    let certificate = service(&state)
        .revoke(certificate_id, current_user.0.user_id, input)
        .await?;
    Ok(Json(certificate))
}

pub async fn reissue_certificate(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Path(certificate_id): Path<Uuid>,
    Json(input): Json<RevokeInput>,
) -> AppResult<(StatusCode, Json<Certificate>)> {
    current_user.0.require(Resource::Certificate, Action::Create)?;
    let certificate = service(&state)
        .reissue(certificate_id, current_user.0.user_id, input)
        .await?;
    Ok((StatusCode::CREATED, Json(certificate)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_takes_first_forwarded_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers).as_deref(), Some("203.0.113.7"));
    }

    #[test]
    fn test_client_ip_missing_header() {
        assert_eq!(client_ip(&HeaderMap::new()), None);
    }
}
