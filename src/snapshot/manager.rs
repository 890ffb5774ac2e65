//! Snapshot Manager
//!
//! Captures the remote tier's keyspace into a JSON document and replays the
//! latest document back into the remote tier on start.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::cache::SharedClock;
use crate::error::{CacheError, Result};
use crate::remote::{Outcome, RemoteAdapter, RemoteEnvelope};
use crate::snapshot::storage::{snapshot_file_name, SnapshotStorage};

/// Point-in-time copy of the remote keyspace: `{ key: value }`.
pub type Snapshot = BTreeMap<String, Value>;

/// Marker identifying a snapshot document that carries expiries.
pub const ENVELOPE_FORMAT: &str = "stock-cache/envelopes-v1";

// == Restore TTL Policy ==
/// TTL given to entries replayed from a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RestoreTtl {
    /// Values only; restored keys get a fresh default-TTL window
    #[default]
    Fresh,
    /// Values stored with their `{value, expiry}` envelope; restored keys keep
    /// the expiry they had when the snapshot was taken
    Remaining,
}

impl FromStr for RestoreTtl {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fresh" => Ok(RestoreTtl::Fresh),
            "remaining" => Ok(RestoreTtl::Remaining),
            other => Err(format!("Unknown restore TTL policy: {}", other)),
        }
    }
}

impl fmt::Display for RestoreTtl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RestoreTtl::Fresh => write!(f, "fresh"),
            RestoreTtl::Remaining => write!(f, "remaining"),
        }
    }
}

// == Snapshot Document ==
/// Stored form of a snapshot.
///
/// The shape is recognised on load, so a document restores correctly no
/// matter which policy wrote it.
#[derive(Debug, Clone, PartialEq)]
pub enum SnapshotDocument {
    /// Flat `{ key: value }` object
    Values(Snapshot),
    /// `{ "format": ENVELOPE_FORMAT, "entries": { key: {value, expiry} } }`
    Envelopes(BTreeMap<String, RemoteEnvelope>),
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct EnvelopeFile<M> {
    format: String,
    entries: M,
}

impl SnapshotDocument {
    pub fn len(&self) -> usize {
        match self {
            SnapshotDocument::Values(values) => values.len(),
            SnapshotDocument::Envelopes(envelopes) => envelopes.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = match self {
            SnapshotDocument::Values(values) => serde_json::to_vec(values)?,
            SnapshotDocument::Envelopes(envelopes) => serde_json::to_vec(&EnvelopeFile {
                format: ENVELOPE_FORMAT.to_string(),
                entries: envelopes,
            })?,
        };
        Ok(bytes)
    }

    /// Decodes either shape. Envelope entries that fail to decode are skipped.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if let Ok(file) = serde_json::from_slice::<EnvelopeFile<BTreeMap<String, Value>>>(bytes) {
            if file.format == ENVELOPE_FORMAT {
                let mut envelopes = BTreeMap::new();
                for (key, raw) in file.entries {
                    match serde_json::from_value::<RemoteEnvelope>(raw) {
                        Ok(envelope) => {
                            envelopes.insert(key, envelope);
                        }
                        Err(e) => {
                            warn!(key = %key, error = %e, "Skipping malformed snapshot entry")
                        }
                    }
                }
                return Ok(SnapshotDocument::Envelopes(envelopes));
            }
        }
        Ok(SnapshotDocument::Values(serde_json::from_slice(bytes)?))
    }
}

/// TTL applied to one replayed entry.
enum Window {
    Default,
    Until(Option<u64>),
}

/// Snapshot behavior knobs.
#[derive(Debug, Clone)]
pub struct SnapshotPolicy {
    /// Chooses the document shape on save and the TTL on restore
    pub restore_ttl: RestoreTtl,
    /// TTL in seconds for entries restored without a kept expiry
    pub default_ttl: i64,
    /// Timestamped snapshots to keep; 0 keeps all
    pub retain: usize,
}

// == Snapshot Manager ==
pub struct SnapshotManager {
    remote: Arc<RemoteAdapter>,
    storage: Arc<dyn SnapshotStorage>,
    policy: SnapshotPolicy,
    clock: SharedClock,
}

impl fmt::Debug for SnapshotManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SnapshotManager")
            .field("storage", &self.storage.describe())
            .field("policy", &self.policy)
            .finish()
    }
}

impl SnapshotManager {
    pub fn new(
        remote: Arc<RemoteAdapter>,
        storage: Arc<dyn SnapshotStorage>,
        policy: SnapshotPolicy,
        clock: SharedClock,
    ) -> Self {
        Self {
            remote,
            storage,
            policy,
            clock,
        }
    }

    // == Create ==
    /// Reads every key of the remote tier.
    ///
    /// A key that fails to read or decode is skipped. Keys written while the
    /// scan runs may or may not be captured.
    pub async fn create_snapshot(&self) -> Result<SnapshotDocument> {
        let keys = self.remote.keys().await?;
        let mut envelopes = BTreeMap::new();

        for key in keys {
            match self.remote.fetch_envelope(&key).await {
                Ok(Some(envelope)) => {
                    envelopes.insert(key, envelope);
                }
                Ok(None) => {}
                Err(e) => warn!(key = %key, error = %e, "Skipping key in snapshot"),
            }
        }

        Ok(match self.policy.restore_ttl {
            RestoreTtl::Fresh => SnapshotDocument::Values(
                envelopes
                    .into_iter()
                    .map(|(key, envelope)| (key, envelope.value))
                    .collect(),
            ),
            RestoreTtl::Remaining => SnapshotDocument::Envelopes(envelopes),
        })
    }

    // == Save ==
    /// Writes a new snapshot and points `latest` at it. Returns the key count.
    pub async fn save_snapshot(&self) -> Result<usize> {
        let document = self.create_snapshot().await?;
        let bytes = document.to_bytes()?;
        let name = snapshot_file_name(&self.timestamp());

        let location = self.storage.put(&name, &bytes).await?;
        self.storage.point_latest(&name, &bytes).await?;

        if self.policy.retain > 0 {
            match self.storage.prune(self.policy.retain).await {
                Ok(removed) if removed > 0 => info!(removed, "Pruned old snapshots"),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Failed to prune old snapshots"),
            }
        }

        info!(
            keys = document.len(),
            bytes = bytes.len(),
            location = %location,
            "Snapshot saved"
        );
        Ok(document.len())
    }

    // == Load ==
    /// Replays the latest snapshot into the remote tier. Returns keys restored.
    ///
    /// Kept expiries are honoured only when the document has them and the
    /// policy is `Remaining`; everything else gets the default TTL.
    pub async fn load_snapshot(&self) -> Result<usize> {
        let Some(bytes) = self.storage.read_latest().await? else {
            info!(storage = %self.storage.describe(), "No snapshot to restore");
            return Ok(0);
        };

        let now = self.clock.now_ms();
        let document = SnapshotDocument::from_bytes(&bytes)?;
        let entries: Vec<(String, Value, Window)> = match document {
            SnapshotDocument::Values(values) => {
                if self.policy.restore_ttl == RestoreTtl::Remaining && !values.is_empty() {
                    info!("Snapshot carries no expiries, restoring with the default TTL");
                }
                values
                    .into_iter()
                    .map(|(key, value)| (key, value, Window::Default))
                    .collect()
            }
            SnapshotDocument::Envelopes(envelopes) => envelopes
                .into_iter()
                .filter_map(|(key, envelope)| match self.policy.restore_ttl {
                    RestoreTtl::Fresh => Some((key, envelope.value, Window::Default)),
                    RestoreTtl::Remaining if envelope.is_expired_at(now) => None,
                    RestoreTtl::Remaining => {
                        Some((key, envelope.value, Window::Until(envelope.expiry)))
                    }
                })
                .collect(),
        };

        let mut restored = 0;
        for (key, value, window) in entries {
            let outcome = match window {
                Window::Default => self.remote.set(&key, &value, self.policy.default_ttl).await,
                Window::Until(expiry) => self.remote.set_until(&key, &value, expiry).await,
            };

            if outcome == Outcome::Bypassed {
                warn!(restored, "Remote tier unavailable during restore");
                return Err(CacheError::RemoteUnavailable);
            }
            restored += 1;
        }

        info!(
            restored,
            policy = %self.policy.restore_ttl,
            storage = %self.storage.describe(),
            "Snapshot restored"
        );
        Ok(restored)
    }

    fn timestamp(&self) -> String {
        let now = DateTime::<Utc>::from_timestamp_millis(self.clock.now_ms() as i64)
            .unwrap_or_default();
        now.format("%Y%m%dT%H%M%S%3fZ").to_string()
    }
}
