//! Snapshot Module
//!
//! Periodic point-in-time copies of the remote tier, restored on start.

mod manager;
mod storage;

pub use manager::{
    RestoreTtl, Snapshot, SnapshotDocument, SnapshotManager, SnapshotPolicy, ENVELOPE_FORMAT,
};
pub use storage::{
    snapshot_file_name, LocalSnapshotStorage, S3Location, S3SnapshotStorage, SnapshotStorage,
    LATEST_NAME,
};
