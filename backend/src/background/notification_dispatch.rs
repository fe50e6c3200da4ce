//! Outbound notification dispatcher.
//!
//! Each tick delivers pending notifications whose quiet hours are over,
//! retries failed deliveries within the retry budget, and purges read
//! notifications past retention.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::NotificationConfig;
use crate::external::MessagingClient;
use crate::services::NotificationService;

/// Pending notifications handled per tick
const DISPATCH_BATCH: i64 = 200;

pub async fn run(pool: PgPool, config: NotificationConfig, period: Duration, cancel: CancellationToken) {
    let gateway = MessagingClient::from_config(&config);
    if gateway.is_none() {
        tracing::warn!("No messaging gateway configured; external channels will fail");
    }
    tracing::info!(interval_secs = period.as_secs(), "Notification dispatch job started");

    let service = NotificationService::with_gateway(pool, gateway);
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Notification dispatch job stopping");
                break;
            }
            _ = interval.tick() => {
                match service.dispatch_pending(DISPATCH_BATCH).await {
                    Ok(0) => {}
                    Ok(sent) => tracing::info!(sent, "Dispatched pending notifications"),
                    Err(e) => tracing::error!(error = %e, "Notification dispatch failed"),
                }
                match service.retry_failed(config.max_retries).await {
                    Ok(0) => {}
                    Ok(sent) => tracing::info!(sent, "Retried failed notifications"),
                    Err(e) => tracing::error!(error = %e, "Notification retry failed"),
                }
                match service.delete_old(config.retention_days).await {
                    Ok(0) => {}
                    Ok(deleted) => tracing::info!(deleted, "Purged old notifications"),
                    Err(e) => tracing::error!(error = %e, "Notification purge failed"),
                }
            }
        }
    }
}
