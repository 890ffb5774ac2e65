//! Scheduled Snapshot Task

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use cron::Schedule;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::snapshot::SnapshotManager;

/// Spawns a task that saves a snapshot at every time `schedule` fires.
///
/// Failures are logged and the loop waits for the next firing.
pub fn spawn_snapshot_task(manager: Arc<SnapshotManager>, schedule: Schedule) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(schedule = %schedule, "Starting snapshot scheduler");

        loop {
            let Some(next) = schedule.upcoming(Utc).next() else {
                warn!("Snapshot schedule has no upcoming runs, stopping scheduler");
                return;
            };
            tokio::time::sleep(delay_until(next, Utc::now())).await;

            match manager.save_snapshot().await {
                Ok(keys) => info!(keys, "Scheduled snapshot complete"),
                Err(e) => error!(error = %e, "Scheduled snapshot failed"),
            }
        }
    })
}

fn delay_until(next: DateTime<Utc>, now: DateTime<Utc>) -> Duration {
    (next - now).to_std().unwrap_or(Duration::ZERO)
}
