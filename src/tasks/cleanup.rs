//! Expiry Sweep Task
//!
//! Background task that periodically removes expired entries from the local store.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::LocalStore;

/// Spawns a background task that periodically sweeps expired local entries.
///
/// The task sleeps for `interval` between runs and holds the write lock only
/// for the sweep itself. Abort the returned handle to stop it.
///
/// # Example
/// ```ignore
/// let store = Arc::new(RwLock::new(LocalStore::new(1024, Arc::new(SystemClock))));
/// let cleanup_handle = spawn_cleanup_task(store.clone(), Duration::from_secs(60));
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(store: Arc<RwLock<LocalStore>>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(interval_secs = interval.as_secs_f64(), "Starting expiry sweep task");

        loop {
            tokio::time::sleep(interval).await;

            let removed = {
                let mut guard = store.write().await;
                guard.cleanup_expired()
            };

            if removed > 0 {
                info!(removed, "Expiry sweep removed entries");
            } else {
                debug!("Expiry sweep found nothing to remove");
            }
        }
    })
}
