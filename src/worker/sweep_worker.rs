use std::sync::Arc;

use chrono::{DateTime, Duration as ChronoDuration, Timelike, Utc};
use tokio::sync::watch;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

use crate::api::apply::ApplyService;

const TICK: Duration = Duration::from_secs(30);

/// First daily-run instant at `hour_utc` strictly after `now`.
pub fn next_daily_run(now: DateTime<Utc>, hour_utc: u32) -> DateTime<Utc> {
    let today = now
        .with_hour(hour_utc)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(now);
    if today > now {
        today
    } else {
        today + ChronoDuration::days(1)
    }
}

/// Background scheduler: one daily all-users sweep plus a periodic
/// categorize pass, both strictly sequential. Exits on the shutdown signal
/// between ticks; an in-flight run finishes first.
pub struct SweepWorker {
    service: Arc<ApplyService>,
    sweep_hour_utc: u32,
    categorize_interval: ChronoDuration,
}

impl SweepWorker {
    pub fn new(service: Arc<ApplyService>, sweep_hour_utc: u32, categorize_interval_hours: u32) -> Self {
        Self {
            service,
            sweep_hour_utc,
            categorize_interval: ChronoDuration::hours(i64::from(categorize_interval_hours)),
        }
    }

    pub async fn run(&self, mut shutdown_rx: watch::Receiver<bool>) {
        let mut next_sweep = next_daily_run(Utc::now(), self.sweep_hour_utc);
        let mut next_categorize = Utc::now() + self.categorize_interval;
        info!(
            "Sweep worker started (next sweep {}, next categorize {})",
            next_sweep, next_categorize
        );

        loop {
            tokio::select! {
                _ = sleep(TICK) => {}
                _ = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        info!("Sweep worker received shutdown signal");
                        break;
                    }
                }
            }

            let now = Utc::now();
            if now >= next_categorize {
                match self.service.categorize(None).await {
                    Ok(updated) => info!("Scheduled categorize pass tagged {} postings", updated),
                    Err(e) => error!("Scheduled categorize pass failed: {}", e),
                }
                next_categorize = Utc::now() + self.categorize_interval;
            }
            if now >= next_sweep {
                match self.service.sweep().await {
                    Ok(summary) => info!(
                        "Daily sweep done: {} users, {} applications attempted",
                        summary.users, summary.attempted
                    ),
                    Err(e) => error!("Daily sweep failed: {}", e),
                }
                next_sweep = next_daily_run(Utc::now(), self.sweep_hour_utc);
            }
        }

        info!("Sweep worker stopped");
    }
}
