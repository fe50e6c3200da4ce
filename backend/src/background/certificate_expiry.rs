//! Periodic certificate expiry sweep.
//!
//! Marks lapsed certificates expired, expires their enrollments so the
//! worker can retrain, and sends one reminder per certificate entering
//! the warning window.

use std::time::Duration;

use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::config::CertificateConfig;
use crate::services::CertificateService;

/// Run the sweep loop until `cancel` is triggered
pub async fn run(pool: PgPool, config: CertificateConfig, period: Duration, cancel: CancellationToken) {
    tracing::info!(interval_secs = period.as_secs(), "Certificate expiry job started");

    let service = CertificateService::new(pool, config);
    let mut interval = tokio::time::interval(period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Certificate expiry job stopping");
                break;
            }
            _ = interval.tick() => {
                match service.expire_sweep().await {
                    Ok(sweep) if sweep.expired > 0 || sweep.reminders_sent > 0 => {
                        tracing::info!(
                            expired = sweep.expired,
                            enrollments_expired = sweep.enrollments_expired,
                            reminders_sent = sweep.reminders_sent,
                            "Certificate expiry sweep"
                        );
                    }
                    Ok(_) => tracing::debug!("Certificate expiry sweep: nothing to do"),
                    Err(e) => tracing::error!(error = %e, "Certificate expiry sweep failed"),
                }
            }
        }
    }
}
