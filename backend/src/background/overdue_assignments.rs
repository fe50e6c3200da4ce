//! Periodic sweep flagging learning path assignments past their due date.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::services::LearningPathService;

pub async fn run(pool: PgPool, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Overdue assignment job started");

    let service = LearningPathService::new(pool);
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Overdue assignment job stopping");
                break;
            }
            _ = interval.tick() => {
                match service.overdue_sweep().await {
                    Ok(0) => tracing::debug!("Overdue sweep: no assignments past due"),
                    Ok(marked) => tracing::info!(marked, "Overdue sweep: assignments marked overdue"),
                    Err(e) => tracing::error!(error = %e, "Overdue sweep failed"),
                }
            }
        }
    }
}
