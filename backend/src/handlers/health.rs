//! Liveness and readiness probes

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;

use crate::AppState;

#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub environment: String,
    pub database: &'static str,
}

/// Process is up
pub async fn liveness() -> &'static str {
    "OK"
}

/// Ready to serve traffic; 503 while the database is unreachable
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database_ok = sqlx::query("SELECT 1").execute(&state.db).await.is_ok();
    if !database_ok {
        tracing::warn!("Readiness probe failed: database unreachable");
    }

    let status = if database_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if database_ok { "healthy" } else { "degraded" },
            version: env!("CARGO_PKG_VERSION"),
            environment: state.config.environment.clone(),
            database: if database_ok { "connected" } else { "disconnected" },
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_liveness() {
        assert_eq!(tokio_test::block_on(liveness()), "OK");
    }
}
