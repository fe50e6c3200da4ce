//! Reporting service for dashboards, compliance and CSV export

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::models::{completion_rate, CertificateStatus};
use sqlx::PgPool;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::services::user::normalize_profile;

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
}

/// Enrollment count per status
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct StatusCount {
    pub status: String,
    pub count: i64,
}

/// Dashboard metrics
#[derive(Debug, Serialize)]
pub struct DashboardMetrics {
    pub active_users: i64,
    pub courses_published: i64,
    pub enrollments_by_status: Vec<StatusCount>,
    pub total_enrollments: i64,
    pub completion_rate: Decimal,
    pub certificates_active: i64,
    pub certificates_expiring: i64,
}

/// Mandatory-course compliance of one worker
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct ComplianceRow {
    pub user_id: Uuid,
    pub user_name: String,
    pub document_number: String,
    pub job_profile: Option<String>,
    pub mandatory_courses: i64,
    pub completed_courses: i64,
    #[sqlx(skip)]
    pub compliance_rate: Decimal,
}

/// Compliance report
#[derive(Debug, Serialize)]
pub struct ComplianceReport {
    pub job_profile: Option<String>,
    pub users: Vec<ComplianceRow>,
    pub fully_compliant: usize,
    pub overall_rate: Decimal,
}

/// Certificate register row
#[derive(Debug, Serialize, sqlx::FromRow)]
pub struct CertificateRow {
    pub certificate_number: String,
    pub user_name: String,
    pub document_number: String,
    pub course_code: String,
    pub course_title: String,
    pub status: CertificateStatus,
    pub issued_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Report filter parameters
#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub job_profile: Option<String>,
    pub status: Option<CertificateStatus>,
}

/// Expiry window used by the dashboard
const DASHBOARD_EXPIRY_DAYS: f64 = 30.0;

impl ReportingService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Get dashboard metrics
    pub async fn dashboard(&self) -> AppResult<DashboardMetrics> {
        let (active_users, courses_published, certificates_active, certificates_expiring) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM users WHERE status = 'active'),
                    (SELECT COUNT(*) FROM courses WHERE status = 'published'),
                    (SELECT COUNT(*) FROM certificates
                        WHERE status = 'issued' AND (expires_at IS NULL OR expires_at > NOW())),
                    (SELECT COUNT(*) FROM certificates
                        WHERE status = 'issued'
                          AND expires_at > NOW()
                          AND expires_at <= NOW() + ($1 * INTERVAL '1 day'))
                "#,
            )
            .bind(DASHBOARD_EXPIRY_DAYS)
            .fetch_one(&self.db)
            .await?;

        let enrollments_by_status = sqlx::query_as::<_, StatusCount>(
            r#"
            SELECT status::text AS status, COUNT(*) AS count
            FROM enrollments
            GROUP BY status
            ORDER BY status
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        let total_enrollments: i64 = enrollments_by_status.iter().map(|s| s.count).sum();
        let completed = enrollments_by_status
            .iter()
            .find(|s| s.status == "completed")
            .map(|s| s.count)
            .unwrap_or(0);

        Ok(DashboardMetrics {
            active_users,
            courses_published,
            total_enrollments,
            completion_rate: completion_rate(completed, total_enrollments),
            enrollments_by_status,
            certificates_active,
            certificates_expiring,
        })
    }

    /// Mandatory-course completion per active worker
    pub async fn compliance(&self, job_profile: Option<&str>) -> AppResult<ComplianceReport> {
        let profile = job_profile.map(normalize_profile).filter(|p| !p.is_empty());

        // Mandatory courses are the published ones targeting the worker's profile, or everyone
        let mut users = sqlx::query_as::<_, ComplianceRow>(
            r#"
            SELECT
                u.id AS user_id,
                u.first_name || ' ' || u.last_name AS user_name,
                u.document_number,
                u.job_profile,
                COUNT(c.id) AS mandatory_courses,
                COUNT(e.id) FILTER (WHERE e.status = 'completed') AS completed_courses
            FROM users u
            LEFT JOIN courses c
                ON c.status = 'published'
               AND c.course_type = 'mandatory'
               AND (cardinality(c.target_profiles) = 0 OR u.job_profile = ANY(c.target_profiles))
            LEFT JOIN enrollments e ON e.course_id = c.id AND e.user_id = u.id
            WHERE u.status = 'active'
              AND ($1::text IS NULL OR u.job_profile = $1)
            GROUP BY u.id, u.first_name, u.last_name, u.document_number, u.job_profile
            ORDER BY u.last_name, u.first_name
            "#,
        )
        .bind(&profile)
        .fetch_all(&self.db)
        .await?;

        for row in &mut users {
            row.compliance_rate = if row.mandatory_courses == 0 {
                Decimal::from(100)
            } else {
                completion_rate(row.completed_courses, row.mandatory_courses)
            };
        }

        let fully_compliant = users
            .iter()
            .filter(|u| u.completed_courses >= u.mandatory_courses)
            .count();
        let required: i64 = users.iter().map(|u| u.mandatory_courses).sum();
        let done: i64 = users.iter().map(|u| u.completed_courses).sum();

        Ok(ComplianceReport {
            job_profile: profile,
            overall_rate: if required == 0 {
                Decimal::from(100)
            } else {
                completion_rate(done, required)
            },
            fully_compliant,
            users,
        })
    }

    /// Certificate register
    pub async fn certificates(&self, status: Option<CertificateStatus>) -> AppResult<Vec<CertificateRow>> {
        let rows = sqlx::query_as::<_, CertificateRow>(
            r#"
            SELECT
                c.certificate_number,
                u.first_name || ' ' || u.last_name AS user_name,
                u.document_number,
                co.code AS course_code,
                co.title AS course_title,
                c.status,
                c.issued_at,
                c.expires_at
            FROM certificates c
            JOIN users u ON u.id = c.user_id
            JOIN courses co ON co.id = c.course_id
            WHERE ($1::certificate_status IS NULL OR c.status = $1)
            ORDER BY c.issued_at DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }

    /// Compliance report as CSV
    pub async fn compliance_csv(&self, job_profile: Option<&str>) -> AppResult<String> {
        let report = self.compliance(job_profile).await?;
        compliance_to_csv(&report.users)
    }

    /// Certificate register as CSV
    pub async fn certificates_csv(&self, status: Option<CertificateStatus>) -> AppResult<String> {
        let rows = self.certificates(status).await?;
        certificates_to_csv(&rows)
    }
}

fn csv_error(e: impl std::fmt::Display) -> AppError {
    AppError::Internal(format!("CSV export failed: {}", e))
}

fn compliance_to_csv(rows: &[ComplianceRow]) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "document_number",
            "name",
            "job_profile",
            "mandatory_courses",
            "completed_courses",
            "compliance_rate",
        ])
        .map_err(csv_error)?;
    for row in rows {
        writer
            .write_record([
                row.document_number.clone(),
                row.user_name.clone(),
                row.job_profile.clone().unwrap_or_default(),
                row.mandatory_courses.to_string(),
                row.completed_courses.to_string(),
                row.compliance_rate.to_string(),
            ])
            .map_err(csv_error)?;
    }
    let bytes = writer.into_inner().map_err(csv_error)?;
    String::from_utf8(bytes).map_err(csv_error)
}

fn certificates_to_csv(rows: &[CertificateRow]) -> AppResult<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record([
            "certificate_number",
            "name",
            "document_number",
            "course_code",
            "course_title",
            "status",
            "issued_at",
            "expires_at",
        ])
        .map_err(csv_error)?;
    for row in rows {
        let status = match row.status {
            CertificateStatus::Issued => "issued",
            CertificateStatus::Revoked => "revoked",
            CertificateStatus::Expired => "expired",
        };
        writer
            .write_record([
                row.certificate_number.clone(),
                row.user_name.clone(),
                row.document_number.clone(),
                row.course_code.clone(),
                row.course_title.clone(),
                status.to_string(),
                row.issued_at.format("%Y-%m-%d").to_string(),
                row.expires_at
                    .map(|d| d.format("%Y-%m-%d").to_string())
                    .unwrap_or_default(),
            ])
            .map_err(csv_error)?;
    }
    let bytes = writer.into_inner().map_err(csv_error)?;
    String::from_utf8(bytes).map_err(csv_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compliance_csv_quotes_fields() {
        let rows = vec![ComplianceRow {
            user_id: Uuid::nil(),
            user_name: "Pérez, Juan".to_string(),
            document_number: "1020304050".to_string(),
            job_profile: Some("OPERARIO".to_string()),
            mandatory_courses: 4,
            completed_courses: 3,
            compliance_rate: Decimal::from(75),
        }];
        let csv = compliance_to_csv(&rows).unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("document_number,name,job_profile,mandatory_courses,completed_courses,compliance_rate")
        );
        assert_eq!(lines.next(), Some("1020304050,\"Pérez, Juan\",OPERARIO,4,3,75"));
    }

    #[test]
    fn test_certificates_csv_blank_expiry() {
        let rows = vec![CertificateRow {
            certificate_number: "SD-202501-1A2B3C4D".to_string(),
            user_name: "Ana Ruiz".to_string(),
            document_number: "123".to_string(),
            course_code: "SST-001".to_string(),
            course_title: "Alturas".to_string(),
            status: CertificateStatus::Issued,
            issued_at: "2025-01-15T08:00:00Z".parse().unwrap(),
            expires_at: None,
        }];
        let csv = certificates_to_csv(&rows).unwrap();
        assert!(csv.ends_with("SD-202501-1A2B3C4D,Ana Ruiz,123,SST-001,Alturas,issued,2025-01-15,\n"));
    }
}
