//! Background Tasks Module
//!
//! Contains background tasks that run periodically during server operation.
//!
//! # Tasks
//! - Expiry sweep: Removes expired local entries at configured intervals
//! - Health probe: Reopens a failed remote tier once it answers again
//! - Snapshot scheduler: Saves remote snapshots on a cron schedule

mod cleanup;
mod probe;
mod snapshot;

pub use cleanup::spawn_cleanup_task;
pub use probe::spawn_probe_task;
pub use snapshot::spawn_snapshot_task;
