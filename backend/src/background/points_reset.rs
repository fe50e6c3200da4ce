//! Weekly and monthly leaderboard counter resets.
//!
//! The job checks hourly and resets when the calendar week (ISO, Monday
//! start) or month has changed since the previous check.

use std::time::Duration;

use chrono::{Datelike, Local, NaiveDate};
use sqlx::PgPool;
use tokio_util::sync::CancellationToken;

use crate::services::GamificationService;

const CHECK_INTERVAL: Duration = Duration::from_secs(3600);

/// Which counters roll over between two check dates
#[derive(Debug, PartialEq, Eq)]
pub struct Rollover {
    pub weekly: bool,
    pub monthly: bool,
}

pub fn rollover(previous: NaiveDate, today: NaiveDate) -> Rollover {
    Rollover {
        weekly: previous.iso_week() != today.iso_week(),
        monthly: (previous.year(), previous.month()) != (today.year(), today.month()),
    }
}

pub async fn run(pool: PgPool, cancel: CancellationToken) {
    tracing::info!("Points reset job started");

    let service = GamificationService::new(pool);
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    let mut weekly_checked = Local::now().date_naive();
    let mut monthly_checked = weekly_checked;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Points reset job stopping");
                break;
            }
            _ = interval.tick() => {
                let today = Local::now().date_naive();

                if rollover(weekly_checked, today).weekly {
                    match service.reset_weekly().await {
                        Ok(reset) => {
                            tracing::info!(reset, "Weekly points reset");
                            weekly_checked = today;
                        }
                        Err(e) => tracing::error!(error = %e, "Weekly points reset failed"),
                    }
                } else {
                    weekly_checked = today;
                }

                if rollover(monthly_checked, today).monthly {
                    match service.reset_monthly().await {
                        Ok(reset) => {
                            tracing::info!(reset, "Monthly points reset");
                            monthly_checked = today;
                        }
                        Err(e) => tracing::error!(error = %e, "Monthly points reset failed"),
                    }
                } else {
                    monthly_checked = today;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_same_day_no_rollover() {
        let d = date(2025, 3, 12);
        assert_eq!(rollover(d, d), Rollover { weekly: false, monthly: false });
    }

    #[test]
    fn test_sunday_to_monday_rolls_week() {
        // 2025-03-16 is a Sunday
        let r = rollover(date(2025, 3, 16), date(2025, 3, 17));
        assert!(r.weekly);
        assert!(!r.monthly);
    }

    #[test]
    fn test_month_boundary_mid_week() {
        // Both dates fall in ISO week 14 of 2025
        let r = rollover(date(2025, 3, 31), date(2025, 4, 1));
        assert!(!r.weekly);
        assert!(r.monthly);
    }
}
