//! Remote Health Probe Task

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::remote::{Availability, RemoteAdapter};

/// Spawns a task that probes the remote tier every `interval`.
///
/// A successful probe is the only way a failed remote tier is used again.
pub fn spawn_probe_task(remote: Arc<RemoteAdapter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs_f64(), "Starting remote health probe");

        loop {
            tokio::time::sleep(interval).await;

            let before = remote.availability();
            let after = remote.probe().await;
            if before != Availability::Available && after == Availability::Available {
                info!("Remote tier recovered");
            } else {
                debug!(availability = ?after, "Remote health probe");
            }
        }
    })
}
