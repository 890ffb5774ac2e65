//! Snapshot Storage
//!
//! Destinations for snapshot documents: a local directory with a `latest.json`
//! symlink, or an S3-compatible bucket with a fixed `latest.json` object.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Builder as S3ConfigBuilder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{CacheError, Result};

/// Name of the pointer to the newest snapshot
pub const LATEST_NAME: &str = "latest.json";

const SNAPSHOT_FILE_PREFIX: &str = "snapshot-";
const SNAPSHOT_FILE_SUFFIX: &str = ".json";

/// Where snapshot documents are kept.
#[async_trait]
pub trait SnapshotStorage: Send + Sync {
    /// Human-readable destination for logs.
    fn describe(&self) -> String;

    /// Writes a snapshot document under `name`, returning its location.
    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String>;

    /// Makes `name` the snapshot returned by `read_latest`.
    async fn point_latest(&self, name: &str, bytes: &[u8]) -> Result<()>;

    /// Reads the newest snapshot, or `None` if none has been written.
    async fn read_latest(&self) -> Result<Option<Vec<u8>>>;

    /// Deletes all but the newest `keep` snapshots. Returns how many were removed.
    async fn prune(&self, _keep: usize) -> Result<usize> {
        Ok(0)
    }
}

/// File name for a snapshot taken at `timestamp` (already formatted).
pub fn snapshot_file_name(timestamp: &str) -> String {
    format!("{SNAPSHOT_FILE_PREFIX}{timestamp}{SNAPSHOT_FILE_SUFFIX}")
}

fn is_snapshot_file(name: &str) -> bool {
    name.starts_with(SNAPSHOT_FILE_PREFIX) && name.ends_with(SNAPSHOT_FILE_SUFFIX)
}

// == Local Directory ==
/// Snapshots in a local directory.
#[derive(Debug, Clone)]
pub struct LocalSnapshotStorage {
    dir: PathBuf,
}

impl LocalSnapshotStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn latest_path(&self) -> PathBuf {
        self.dir.join(LATEST_NAME)
    }

    /// Writes through a temp file and renames it into place.
    async fn write_atomically(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        fs::create_dir_all(&self.dir).await?;

        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| CacheError::Snapshot(format!("invalid path {}", path.display())))?;
        let temp_path = self.dir.join(format!(".{file_name}.tmp"));

        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);

        fs::rename(&temp_path, path).await?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStorage for LocalSnapshotStorage {
    fn describe(&self) -> String {
        format!("dir:{}", self.dir.display())
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let path = self.dir.join(name);
        self.write_atomically(&path, bytes).await?;
        Ok(path.display().to_string())
    }

    #[cfg(unix)]
    async fn point_latest(&self, name: &str, _bytes: &[u8]) -> Result<()> {
        let temp_link = self.dir.join(format!(".{LATEST_NAME}.tmp"));
        match fs::remove_file(&temp_link).await {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        // Relative target keeps the directory relocatable
        fs::symlink(name, &temp_link).await?;
        fs::rename(&temp_link, self.latest_path()).await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn point_latest(&self, _name: &str, bytes: &[u8]) -> Result<()> {
        self.write_atomically(&self.latest_path(), bytes).await
    }

    async fn read_latest(&self) -> Result<Option<Vec<u8>>> {
        match fs::read(self.latest_path()).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn prune(&self, keep: usize) -> Result<usize> {
        if keep == 0 {
            return Ok(0);
        }

        let mut names = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                if is_snapshot_file(name) {
                    names.push(name.to_string());
                }
            }
        }

        // Timestamped names sort chronologically
        names.sort_unstable_by(|a, b| b.cmp(a));

        let mut removed = 0;
        for name in names.into_iter().skip(keep) {
            fs::remove_file(self.dir.join(&name)).await?;
            debug!(snapshot = %name, "Pruned old snapshot");
            removed += 1;
        }
        Ok(removed)
    }
}

// == S3 Bucket ==
/// Connection details for an S3-compatible bucket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Location {
    pub bucket: String,
    /// Key prefix, e.g. `snapshots/`
    pub prefix: String,
    pub region: String,
    /// Custom endpoint for MinIO and other self-hosted stores
    pub endpoint: Option<String>,
}

impl S3Location {
    fn object_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

/// Snapshots in an S3-compatible bucket.
#[derive(Debug, Clone)]
pub struct S3SnapshotStorage {
    client: S3Client,
    location: S3Location,
}

impl S3SnapshotStorage {
    /// Builds a client from the ambient AWS credential chain.
    pub async fn connect(location: S3Location) -> Self {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(location.region.clone()))
            .load()
            .await;

        let mut s3_config = S3ConfigBuilder::from(&sdk_config);
        if let Some(endpoint) = &location.endpoint {
            // Self-hosted stores expect path-style addressing
            s3_config = s3_config.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(s3_config.build()),
            location,
        }
    }

    async fn put_object(&self, key: &str, bytes: &[u8]) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.location.bucket)
            .key(key)
            .content_type("application/json")
            .body(ByteStream::from(bytes.to_vec()))
            .send()
            .await
            .map_err(|e| CacheError::Snapshot(format!("Failed to write {key}: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl SnapshotStorage for S3SnapshotStorage {
    fn describe(&self) -> String {
        format!("s3://{}/{}", self.location.bucket, self.location.prefix)
    }

    async fn put(&self, name: &str, bytes: &[u8]) -> Result<String> {
        let key = self.location.object_key(name);
        self.put_object(&key, bytes).await?;
        Ok(format!("s3://{}/{}", self.location.bucket, key))
    }

    async fn point_latest(&self, _name: &str, bytes: &[u8]) -> Result<()> {
        // A single PUT replaces the well-known key atomically for readers
        let key = self.location.object_key(LATEST_NAME);
        self.put_object(&key, bytes).await
    }

    async fn read_latest(&self) -> Result<Option<Vec<u8>>> {
        let key = self.location.object_key(LATEST_NAME);
        let output = match self
            .client
            .get_object()
            .bucket(&self.location.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) => {
                let missing = e
                    .as_service_error()
                    .map(|se| se.is_no_such_key())
                    .unwrap_or(false);
                if missing {
                    return Ok(None);
                }
                return Err(CacheError::Snapshot(format!("Failed to read {key}: {e}")));
            }
        };

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| CacheError::Snapshot(format!("Failed to read {key} body: {e}")))?;
        Ok(Some(data.into_bytes().to_vec()))
    }
}
