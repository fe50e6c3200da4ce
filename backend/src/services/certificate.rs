//! Certificate issuance, public verification and expiry tracking

use std::collections::HashMap;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use shared::models::{
    days_until_expiry, expiry_from_validity, format_certificate_number,
    is_valid_certificate_number, verification_outcome, CertificateStatus, EnrollmentStatus,
    NotificationChannel, NotificationType, VerificationOutcome,
};
use shared::template::render_placeholders;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::config::CertificateConfig;
use crate::error::{AppError, AppResult};
use crate::services::gamification::GamificationService;
use crate::services::notification::{NotificationService, SendNotification};

type HmacSha256 = Hmac<Sha256>;

/// Certificate service
#[derive(Clone)]
pub struct CertificateService {
    db: PgPool,
    config: CertificateConfig,
}

/// Certificate template
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CertificateTemplate {
    pub id: Uuid,
    pub name: String,
    pub body_html: String,
    pub signer_name: String,
    pub signer_title: String,
    pub is_default: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// Issued certificate
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Certificate {
    pub id: Uuid,
    pub certificate_number: String,
    pub user_id: Uuid,
    pub course_id: Uuid,
    pub enrollment_id: Option<Uuid>,
    pub template_id: Option<Uuid>,
    pub score: Option<Decimal>,
    pub status: CertificateStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub verification_url: String,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by: Option<Uuid>,
    pub revoked_reason: Option<String>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Certificate with holder and course names
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CertificateSummary {
    pub id: Uuid,
    pub certificate_number: String,
    pub user_id: Uuid,
    pub user_name: String,
    pub course_id: Uuid,
    pub course_code: String,
    pub course_title: String,
    pub status: CertificateStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Public verification answer
#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub certificate_number: String,
    pub is_valid: bool,
    pub outcome: VerificationOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub holder_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub course_title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issued_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Certificate counts by status
#[derive(Debug, Serialize)]
pub struct CertificateStatistics {
    pub total: i64,
    pub issued: i64,
    pub revoked: i64,
    pub expired: i64,
    pub expiring_soon: i64,
    pub active_rate: Decimal,
}

/// Result of one expiry sweep
#[derive(Debug, Default, Serialize)]
pub struct ExpirySweep {
    pub expired: u64,
    pub enrollments_expired: u64,
    pub reminders_sent: u64,
}

/// Input for issuing a certificate
#[derive(Debug, Deserialize)]
pub struct IssueCertificateInput {
    pub enrollment_id: Uuid,
    pub template_id: Option<Uuid>,
    pub score: Option<Decimal>,
}

/// Input for revoking or reissuing
#[derive(Debug, Deserialize, Validate)]
pub struct RevokeInput {
    #[validate(length(min = 3, max = 500))]
    pub reason: String,
}

/// Input for creating a template
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTemplateInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(min = 1))]
    pub body_html: String,
    pub signer_name: Option<String>,
    pub signer_title: Option<String>,
    #[serde(default)]
    pub is_default: bool,
}

const CERTIFICATE_COLUMNS: &str = r#"
    id, certificate_number, user_id, course_id, enrollment_id, template_id, score, status,
    issued_at, expires_at, verification_url, revoked_at, revoked_by, revoked_reason,
    metadata, created_at
"#;

const SUMMARY_SELECT: &str = r#"
    SELECT
        c.id, c.certificate_number, c.user_id,
        u.first_name || ' ' || u.last_name AS user_name,
        c.course_id, co.code AS course_code, co.title AS course_title,
        c.status, c.issued_at, c.expires_at
    FROM certificates c
    JOIN users u ON u.id = c.user_id
    JOIN courses co ON co.id = c.course_id
"#;

/// base64url HMAC-SHA256 of a certificate number
pub fn sign_number(secret: &str, number: &str) -> AppResult<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(format!("Invalid signing key: {}", e)))?;
    mac.update(number.as_bytes());
    Ok(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
}

/// Constant-time check of a signature produced by [`sign_number`]
pub fn signature_matches(secret: &str, number: &str, signature: &str) -> bool {
    let Ok(expected) = URL_SAFE_NO_PAD.decode(signature.trim()) else {
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    mac.update(number.as_bytes());
    mac.verify_slice(&expected).is_ok()
}

fn random_hex() -> String {
    format!("{:08X}", rand::rng().random::<u32>())
}

impl CertificateService {
    pub fn new(db: PgPool, config: CertificateConfig) -> Self {
        Self { db, config }
    }

    // ========================================================================
    // Templates
    // ========================================================================

    /// Active templates
    pub async fn list_templates(&self) -> AppResult<Vec<CertificateTemplate>> {
        let templates = sqlx::query_as::<_, CertificateTemplate>(
            r#"
            SELECT id, name, body_html, signer_name, signer_title, is_default, is_active, created_at
            FROM certificate_templates
            WHERE is_active
            ORDER BY is_default DESC, name
            "#,
        )
        .fetch_all(&self.db)
        .await?;
        Ok(templates)
    }

    /// Create a template; a new default replaces the previous one
    pub async fn create_template(&self, input: CreateTemplateInput) -> AppResult<CertificateTemplate> {
        input.validate()?;

        let mut tx = self.db.begin().await?;
        if input.is_default {
            sqlx::query("UPDATE certificate_templates SET is_default = FALSE WHERE is_default")
                .execute(&mut *tx)
                .await?;
        }
        let template = sqlx::query_as::<_, CertificateTemplate>(
            r#"
            INSERT INTO certificate_templates (name, body_html, signer_name, signer_title, is_default)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, name, body_html, signer_name, signer_title, is_default, is_active, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.body_html)
        .bind(input.signer_name.unwrap_or_default())
        .bind(input.signer_title.unwrap_or_default())
        .bind(input.is_default)
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;
        Ok(template)
    }

    async fn template_for(&self, template_id: Option<Uuid>) -> AppResult<CertificateTemplate> {
        sqlx::query_as::<_, CertificateTemplate>(
            r#"
            SELECT id, name, body_html, signer_name, signer_title, is_default, is_active, created_at
            FROM certificate_templates
            WHERE is_active AND (id = $1 OR ($1::uuid IS NULL AND is_default))
            ORDER BY is_default DESC
            LIMIT 1
            "#,
        )
        .bind(template_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Certificate template".to_string()))
    }

    // ========================================================================
    // Issuance
    // ========================================================================

    /// Get a certificate
    pub async fn get_certificate(&self, certificate_id: Uuid) -> AppResult<Certificate> {
        sqlx::query_as::<_, Certificate>(&format!(
            "SELECT {} FROM certificates WHERE id = $1",
            CERTIFICATE_COLUMNS
        ))
        .bind(certificate_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Certificate".to_string()))
    }

    /// Whether the enrollment can receive a certificate
    pub async fn can_issue(&self, enrollment_id: Uuid) -> AppResult<Result<(), &'static str>> {
        let (user_id, course_id, status) = sqlx::query_as::<_, (Uuid, Uuid, EnrollmentStatus)>(
            "SELECT user_id, course_id, status FROM enrollments WHERE id = $1",
        )
        .bind(enrollment_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Enrollment".to_string()))?;

        if status != EnrollmentStatus::Completed {
            return Ok(Err("Course has not been completed"));
        }

        let current = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM certificates
            WHERE user_id = $1 AND course_id = $2 AND status = 'issued'
              AND (expires_at IS NULL OR expires_at > NOW())
            "#,
        )
        .bind(user_id)
        .bind(course_id)
        .fetch_one(&self.db)
        .await?;

        if current > 0 {
            return Ok(Err("A valid certificate already exists for this course"));
        }
        Ok(Ok(()))
    }

    /// Issue a certificate for a completed enrollment
    pub async fn issue(&self, input: IssueCertificateInput) -> AppResult<Certificate> {
        self.can_issue(input.enrollment_id)
            .await?
            .map_err(AppError::rule)?;
        let certificate = self
            .insert_certificate(input.enrollment_id, input.template_id, input.score, serde_json::json!({}))
            .await?;

        tracing::info!(
            certificate_id = %certificate.id,
            number = %certificate.certificate_number,
            user_id = %certificate.user_id,
            "Certificate issued"
        );

        GamificationService::new(self.db.clone())
            .on_certificate_issued(certificate.user_id, certificate.id)
            .await?;

        let course_title = sqlx::query_scalar::<_, String>("SELECT title FROM courses WHERE id = $1")
            .bind(certificate.course_id)
            .fetch_one(&self.db)
            .await?;

        NotificationService::new(self.db.clone())
            .send(
                SendNotification::new(
                    certificate.user_id,
                    NotificationType::CertificateIssued,
                    NotificationChannel::InApp,
                )
                .with("certificate_number", &certificate.certificate_number)
                .with("course_title", course_title)
                .action_url(format!("/certificates/{}", certificate.id)),
            )
            .await?;

        Ok(certificate)
    }

    async fn insert_certificate(
        &self,
        enrollment_id: Uuid,
        template_id: Option<Uuid>,
        score: Option<Decimal>,
        metadata: serde_json::Value,
    ) -> AppResult<Certificate> {
        let (user_id, course_id, progress, validity_months) =
            sqlx::query_as::<_, (Uuid, Uuid, Decimal, Option<i32>)>(
                r#"
                SELECT e.user_id, e.course_id, e.progress, c.validity_months
                FROM enrollments e
                JOIN courses c ON c.id = e.course_id
                WHERE e.id = $1
                "#,
            )
            .bind(enrollment_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Enrollment".to_string()))?;

        let template = self.template_for(template_id).await?;
        let issued_at = Utc::now();
        let expires_at = expiry_from_validity(issued_at, validity_months);

        // Numbers are random; retry on the rare collision
        for _ in 0..5 {
            let number = format_certificate_number(issued_at, &random_hex());
            let url = format!(
                "{}/certificates/verify/{}",
                self.config.site_url.trim_end_matches('/'),
                number
            );
            let inserted = sqlx::query_as::<_, Certificate>(&format!(
                r#"
                INSERT INTO certificates (
                    certificate_number, user_id, course_id, enrollment_id, template_id, score,
                    issued_at, expires_at, verification_url, metadata
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (certificate_number) DO NOTHING
                RETURNING {}
                "#,
                CERTIFICATE_COLUMNS
            ))
            .bind(&number)
            .bind(user_id)
            .bind(course_id)
            .bind(enrollment_id)
            .bind(template.id)
            .bind(score.unwrap_or(progress))
            .bind(issued_at)
            .bind(expires_at)
            .bind(&url)
            .bind(&metadata)
            .fetch_optional(&self.db)
            .await?;

            if let Some(certificate) = inserted {
                return Ok(certificate);
            }
        }

        Err(AppError::Internal(
            "Could not allocate a certificate number".to_string(),
        ))
    }

    /// Revoke an issued certificate
    pub async fn revoke(
        &self,
        certificate_id: Uuid,
        revoked_by: Uuid,
        input: RevokeInput,
    ) -> AppResult<Certificate> {
        input.validate()?;
        let certificate = self.get_certificate(certificate_id).await?;
        if certificate.status == CertificateStatus::Revoked {
            return Err(AppError::rule("Certificate is already revoked"));
        }

        let revoked = sqlx::query_as::<_, Certificate>(&format!(
            r#"
            UPDATE certificates SET
                status = 'revoked', revoked_at = NOW(), revoked_by = $2, revoked_reason = $3
            WHERE id = $1
            RETURNING {}
            "#,
            CERTIFICATE_COLUMNS
        ))
        .bind(certificate_id)
        .bind(revoked_by)
        .bind(input.reason.trim())
        .fetch_one(&self.db)
        .await?;

        tracing::warn!(certificate_id = %certificate_id, revoked_by = %revoked_by, "Certificate revoked");
        Ok(revoked)
    }

    /// Replace a certificate with a freshly numbered one
    pub async fn reissue(
        &self,
        certificate_id: Uuid,
        reissued_by: Uuid,
        input: RevokeInput,
    ) -> AppResult<Certificate> {
        input.validate()?;
        let old = self.get_certificate(certificate_id).await?;
        if old.status == CertificateStatus::Revoked {
            return Err(AppError::rule("Certificate is already revoked"));
        }
        let enrollment_id = old
            .enrollment_id
            .ok_or_else(|| AppError::rule("Certificate has no enrollment to reissue from"))?;

        let new = self
            .insert_certificate(
                enrollment_id,
                old.template_id,
                old.score,
                serde_json::json!({ "reissued_from": old.certificate_number }),
            )
            .await?;

        sqlx::query(
            r#"
            UPDATE certificates SET
                status = 'revoked', revoked_at = NOW(), revoked_by = $2, revoked_reason = $3
            WHERE id = $1
            "#,
        )
        .bind(old.id)
        .bind(reissued_by)
        .bind(format!(
            "Reissued as {}: {}",
            new.certificate_number,
            input.reason.trim()
        ))
        .execute(&self.db)
        .await?;

        tracing::info!(old = %old.certificate_number, new = %new.certificate_number, "Certificate reissued");
        Ok(new)
    }

    // ========================================================================
    // Verification
    // ========================================================================

    /// Public verification; every lookup is logged
    pub async fn verify(
        &self,
        number: &str,
        signature: Option<&str>,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> AppResult<VerificationResult> {
        let number = number.trim().to_uppercase();

        let found = if is_valid_certificate_number(&number) {
            sqlx::query_as::<_, (Uuid, CertificateStatus, Option<DateTime<Utc>>, DateTime<Utc>, String, String)>(
                r#"
                SELECT c.id, c.status, c.expires_at, c.issued_at,
                       u.first_name || ' ' || u.last_name, co.title
                FROM certificates c
                JOIN users u ON u.id = c.user_id
                JOIN courses co ON co.id = c.course_id
                WHERE c.certificate_number = $1
                "#,
            )
            .bind(&number)
            .fetch_optional(&self.db)
            .await?
        } else {
            None
        };

        let now = Utc::now();
        let (certificate_id, outcome, details) = match found {
            None => (None, VerificationOutcome::NotFound, None),
            Some((id, status, expires_at, issued_at, holder, course)) => {
                let mut outcome = verification_outcome(status, expires_at, now);
                if outcome == VerificationOutcome::Expired && status == CertificateStatus::Issued {
                    sqlx::query("UPDATE certificates SET status = 'expired' WHERE id = $1")
                        .bind(id)
                        .execute(&self.db)
                        .await?;
                }
                if outcome.is_valid() {
                    if let Some(sig) = signature {
                        if !signature_matches(&self.config.signing_secret, &number, sig) {
                            outcome = VerificationOutcome::InvalidSignature;
                        }
                    }
                }
                (Some(id), outcome, Some((holder, course, issued_at, expires_at)))
            }
        };

        sqlx::query(
            r#"
            INSERT INTO certificate_verifications (
                certificate_number, certificate_id, ip_address, user_agent, outcome
            )
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(&number)
        .bind(certificate_id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(outcome.as_str())
        .execute(&self.db)
        .await?;

        tracing::info!(number = %number, outcome = outcome.as_str(), "Certificate verification");

        let (holder_name, course_title, issued_at, expires_at) = match details {
            Some((holder, course, issued, expires)) => {
                (Some(holder), Some(course), Some(issued), expires)
            }
            None => (None, None, None, None),
        };

        Ok(VerificationResult {
            certificate_number: number,
            is_valid: outcome.is_valid(),
            outcome,
            holder_name,
            course_title,
            issued_at,
            expires_at,
        })
    }

    /// Signed verification link for sharing
    pub fn signed_url(&self, certificate: &Certificate) -> AppResult<String> {
        let signature = sign_number(&self.config.signing_secret, &certificate.certificate_number)?;
        Ok(format!("{}?sig={}", certificate.verification_url, signature))
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render a certificate to HTML through its template
    pub async fn render(&self, certificate_id: Uuid) -> AppResult<String> {
        let certificate = self.get_certificate(certificate_id).await?;
        let template = self.template_for(certificate.template_id).await?;

        let (user_name, document_number, course_title, course_code) =
            sqlx::query_as::<_, (String, String, String, String)>(
                r#"
                SELECT u.first_name || ' ' || u.last_name, u.document_number, c.title, c.code
                FROM users u, courses c
                WHERE u.id = $1 AND c.id = $2
                "#,
            )
            .bind(certificate.user_id)
            .bind(certificate.course_id)
            .fetch_one(&self.db)
            .await?;

        let vars = certificate_vars(
            &certificate,
            &template,
            &user_name,
            &document_number,
            &course_title,
            &course_code,
        );
        Ok(render_placeholders(&template.body_html, &vars))
    }

    // ========================================================================
    // Listings
    // ========================================================================

    /// Certificates of a user
    pub async fn my_certificates(
        &self,
        user_id: Uuid,
        include_expired: bool,
    ) -> AppResult<Vec<CertificateSummary>> {
        let certificates = sqlx::query_as::<_, CertificateSummary>(&format!(
            r#"
            {}
            WHERE c.user_id = $1
              AND ($2 OR (c.status = 'issued' AND (c.expires_at IS NULL OR c.expires_at > NOW())))
            ORDER BY c.issued_at DESC
            "#,
            SUMMARY_SELECT
        ))
        .bind(user_id)
        .bind(include_expired)
        .fetch_all(&self.db)
        .await?;
        Ok(certificates)
    }

    /// Issued certificates expiring within `days`
    pub async fn expiring(&self, days: i64) -> AppResult<Vec<CertificateSummary>> {
        let certificates = sqlx::query_as::<_, CertificateSummary>(&format!(
            r#"
            {}
            WHERE c.status = 'issued'
              AND c.expires_at > NOW()
              AND c.expires_at <= NOW() + ($1 * INTERVAL '1 day')
            ORDER BY c.expires_at
            "#,
            SUMMARY_SELECT
        ))
        .bind(days.max(0) as f64)
        .fetch_all(&self.db)
        .await?;
        Ok(certificates)
    }

    /// Counts by status
    pub async fn statistics(&self) -> AppResult<CertificateStatistics> {
        let (total, issued, revoked, expired, expiring_soon) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(
                r#"
                SELECT
                    COUNT(*),
                    COUNT(*) FILTER (WHERE status = 'issued'),
                    COUNT(*) FILTER (WHERE status = 'revoked'),
                    COUNT(*) FILTER (WHERE status = 'expired'),
                    COUNT(*) FILTER (
                        WHERE status = 'issued'
                          AND expires_at > NOW()
                          AND expires_at <= NOW() + ($1 * INTERVAL '1 day')
                    )
                FROM certificates
                "#,
            )
            .bind(self.config.expiry_warning_days as f64)
            .fetch_one(&self.db)
            .await?;

        Ok(CertificateStatistics {
            total,
            issued,
            revoked,
            expired,
            expiring_soon,
            active_rate: shared::models::completion_rate(issued, total),
        })
    }

    // ========================================================================
    // Expiry sweep
    // ========================================================================

    /// Expire lapsed certificates with their enrollments and remind holders of upcoming expiries
    pub async fn expire_sweep(&self) -> AppResult<ExpirySweep> {
        let mut sweep = ExpirySweep::default();

        let mut tx = self.db.begin().await?;
        let expired_enrollments = sqlx::query_scalar::<_, Option<Uuid>>(
            r#"
            UPDATE certificates SET status = 'expired'
            WHERE status = 'issued' AND expires_at IS NOT NULL AND expires_at <= NOW()
            RETURNING enrollment_id
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;
        sweep.expired = expired_enrollments.len() as u64;

        let enrollment_ids: Vec<Uuid> = expired_enrollments.into_iter().flatten().collect();
        if !enrollment_ids.is_empty() {
            sweep.enrollments_expired = sqlx::query(
                r#"
                UPDATE enrollments SET status = 'expired', updated_at = NOW()
                WHERE id = ANY($1) AND status = 'completed'
                "#,
            )
            .bind(&enrollment_ids)
            .execute(&mut *tx)
            .await?
            .rows_affected();
        }
        tx.commit().await?;

        // One reminder per certificate, flagged in metadata
        let upcoming = sqlx::query_as::<_, (Uuid, Uuid, String, DateTime<Utc>, String)>(
            r#"
            SELECT c.id, c.user_id, c.certificate_number, c.expires_at, u.first_name || ' ' || u.last_name
            FROM certificates c
            JOIN users u ON u.id = c.user_id
            WHERE c.status = 'issued'
              AND c.expires_at > NOW()
              AND c.expires_at <= NOW() + ($1 * INTERVAL '1 day')
              AND NOT (c.metadata ? 'expiry_reminder_at')
            "#,
        )
        .bind(self.config.expiry_warning_days as f64)
        .fetch_all(&self.db)
        .await?;

        let notifications = NotificationService::new(self.db.clone());
        let now = Utc::now();
        for (id, user_id, number, expires_at, user_name) in upcoming {
            notifications
                .send(
                    SendNotification::new(
                        user_id,
                        NotificationType::CertificateExpiring,
                        NotificationChannel::InApp,
                    )
                    .with("certificate_number", &number)
                    .with("days", days_until_expiry(expires_at, now))
                    .with("expiry_date", expires_at.format("%Y-%m-%d"))
                    .with("user_name", &user_name)
                    .action_url(format!("/certificates/{}", id)),
                )
                .await?;
            sqlx::query(
                r#"
                UPDATE certificates
                SET metadata = metadata || jsonb_build_object('expiry_reminder_at', NOW())
                WHERE id = $1
                "#,
            )
            .bind(id)
            .execute(&self.db)
            .await?;
            sweep.reminders_sent += 1;
        }

        if sweep.expired > 0 || sweep.reminders_sent > 0 {
            tracing::info!(
                expired = sweep.expired,
                enrollments_expired = sweep.enrollments_expired,
                reminders = sweep.reminders_sent,
                "Certificate expiry sweep"
            );
        }
        Ok(sweep)
    }
}

/// Placeholder values for certificate templates
fn certificate_vars(
    certificate: &Certificate,
    template: &CertificateTemplate,
    user_name: &str,
    document_number: &str,
    course_title: &str,
    course_code: &str,
) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    vars.insert("user_name".to_string(), user_name.to_string());
    vars.insert("document_number".to_string(), document_number.to_string());
    vars.insert("course_title".to_string(), course_title.to_string());
    vars.insert("course_code".to_string(), course_code.to_string());
    vars.insert(
        "certificate_number".to_string(),
        certificate.certificate_number.clone(),
    );
    vars.insert(
        "issued_date".to_string(),
        certificate.issued_at.format("%Y-%m-%d").to_string(),
    );
    vars.insert(
        "expiry_date".to_string(),
        certificate
            .expires_at
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| "Sin vencimiento".to_string()),
    );
    vars.insert(
        "score".to_string(),
        certificate
            .score
            .map(|s| s.round_dp(2).to_string())
            .unwrap_or_default(),
    );
    vars.insert("signer_name".to_string(), template.signer_name.clone());
    vars.insert("signer_title".to_string(), template.signer_title.clone());
    vars.insert(
        "verification_url".to_string(),
        certificate.verification_url.clone(),
    );
    vars
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_roundtrip() {
        let sig = sign_number("secret", "SD-202501-1A2B3C4D").unwrap();
        assert!(!sig.contains('='));
        assert!(signature_matches("secret", "SD-202501-1A2B3C4D", &sig));
        assert!(!signature_matches("other", "SD-202501-1A2B3C4D", &sig));
        assert!(!signature_matches("secret", "SD-202501-FFFFFFFF", &sig));
        assert!(!signature_matches("secret", "SD-202501-1A2B3C4D", "not base64!"));
    }

    #[test]
    fn test_random_hex_shape() {
        let hex = random_hex();
        assert_eq!(hex.len(), 8);
        let number = format_certificate_number(Utc::now(), &hex);
        assert!(is_valid_certificate_number(&number));
    }

    #[test]
    fn test_certificate_vars_render() {
        let now = Utc::now();
        let certificate = Certificate {
            id: Uuid::new_v4(),
            certificate_number: "SD-202501-1A2B3C4D".to_string(),
            user_id: Uuid::new_v4(),
            course_id: Uuid::new_v4(),
            enrollment_id: None,
            template_id: None,
            score: Some(Decimal::new(9550, 2)),
            status: CertificateStatus::Issued,
            issued_at: now,
            expires_at: None,
            verification_url: "https://lms.local/certificates/verify/SD-202501-1A2B3C4D".to_string(),
            revoked_at: None,
            revoked_by: None,
            revoked_reason: None,
            metadata: serde_json::json!({}),
            created_at: now,
        };
        let template = CertificateTemplate {
            id: Uuid::new_v4(),
            name: "Base".to_string(),
            body_html: "{{user_name}} - {{course_code}} - {{expiry_date}} - {{score}}".to_string(),
            signer_name: "HSE".to_string(),
            signer_title: "Director".to_string(),
            is_default: true,
            is_active: true,
            created_at: now,
        };
        let vars = certificate_vars(&certificate, &template, "Ana Ruiz", "123", "Alturas", "SST-001");
        let html = render_placeholders(&template.body_html, &vars);
        assert_eq!(html, "Ana Ruiz - SST-001 - Sin vencimiento - 95.50");
    }
}
