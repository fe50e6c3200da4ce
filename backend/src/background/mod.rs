//! Background tasks and scheduled jobs.
//!
//! Each submodule provides a long-running async function meant to be
//! spawned with `tokio::spawn`. Every task stops when its
//! [`CancellationToken`] is cancelled.

use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::AppState;

pub mod certificate_expiry;
pub mod notification_dispatch;
pub mod overdue_assignments;
pub mod points_reset;

/// Spawn every periodic job configured for this process
pub fn spawn_all(state: &AppState, cancel: &CancellationToken) -> Vec<JoinHandle<()>> {
    let jobs = &state.config.jobs;
    if !jobs.enabled {
        tracing::info!("Background jobs disabled");
        return Vec::new();
    }

    vec![
        tokio::spawn(certificate_expiry::run(
            state.db.clone(),
            state.config.certificates.clone(),
            every(jobs.certificate_sweep_secs),
            cancel.clone(),
        )),
        tokio::spawn(overdue_assignments::run(
            state.db.clone(),
            every(jobs.overdue_sweep_secs),
            cancel.clone(),
        )),
        tokio::spawn(notification_dispatch::run(
            state.db.clone(),
            state.config.notifications.clone(),
            every(jobs.notification_dispatch_secs),
            cancel.clone(),
        )),
        tokio::spawn(points_reset::run(state.db.clone(), cancel.clone())),
    ]
}

/// Zero-second intervals would spin; clamp to one second
fn every(secs: u64) -> Duration {
    Duration::from_secs(secs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_clamps_zero() {
        assert_eq!(every(0), Duration::from_secs(1));
        assert_eq!(every(60), Duration::from_secs(60));
    }
}
