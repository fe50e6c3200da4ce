//! Reporting handlers for dashboards and data export

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::models::{Action, Resource};

use crate::error::AppResult;
use crate::middleware::CurrentUser;
use crate::services::reporting::{DashboardMetrics, ReportFilter, ReportingService};
use crate::AppState;

#[derive(Deserialize)]
pub struct ReportQuery {
    #[serde(flatten)]
    pub filter: ReportFilter,
    pub format: Option<String>, // "json" or "csv"
}

fn wants_csv(query: &ReportQuery) -> bool {
    query
        .format
        .as_deref()
        .is_some_and(|f| f.eq_ignore_ascii_case("csv"))
}

fn csv_response(filename: &str, body: String) -> axum::response::Response {
    let disposition = format!("attachment; filename=\"{}\"", filename);
    (
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response()
}

/// Get dashboard metrics
pub async fn get_dashboard(
    State(state): State<AppState>,
    current_user: CurrentUser,
) -> AppResult<Json<DashboardMetrics>> {
    current_user.0.require(Resource::Report, Action::View)?;
    let metrics = ReportingService::new(state.db).dashboard().await?;
    Ok(Json(metrics))
}

/// Mandatory training compliance, optionally per job profile
pub async fn get_compliance_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<impl IntoResponse> {
    current_user.0.require(Resource::Report, Action::View)?;
    let service = ReportingService::new(state.db);
    let profile = query.filter.job_profile.as_deref();

    if wants_csv(&query) {
        current_user.0.require(Resource::Report, Action::Export)?;
        let csv = service.compliance_csv(profile).await?;
        Ok(csv_response("compliance.csv", csv))
    } else {
        let report = service.compliance(profile).await?;
        Ok(Json(report).into_response())
    }
}

/// Certificate register
pub async fn get_certificate_report(
    State(state): State<AppState>,
    current_user: CurrentUser,
    Query(query): Query<ReportQuery>,
) -> AppResult<impl IntoResponse> {
    current_user.0.require(Resource::Report, Action::View)?;
    let service = ReportingService::new(state.db);

    if wants_csv(&query) {
        current_user.0.require(Resource::Report, Action::Export)?;
        let csv = service.certificates_csv(query.filter.status).await?;
        Ok(csv_response("certificates.csv", csv))
    } else {
        let rows = service.certificates(query.filter.status).await?;
        Ok(Json(rows).into_response())
    }
}
