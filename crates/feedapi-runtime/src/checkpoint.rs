//! Durable per-partition cursors for `feedapi follow`.
//!
//! The file is rewritten whole (temp file + rename) after every page that
//! moved a cursor, so a crash leaves either the previous or the next state.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use feedapi_core::{Cursor, FeedInfo, PartitionId};

/// On-disk layout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointFile {
    /// Feed token the cursors belong to.
    #[serde(default)]
    pub token: String,
    #[serde(default)]
    pub cursors: BTreeMap<PartitionId, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug)]
pub struct CheckpointStore {
    path: PathBuf,
    state: Mutex<CheckpointFile>,
}

impl CheckpointStore {
    /// Load `path`, or start empty when it does not exist yet.
    pub fn open(path: impl Into<PathBuf>) -> anyhow::Result<Self> {
        let path = path.into();
        let state = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes)
                .with_context(|| format!("corrupt checkpoint file {}", path.display()))?,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => CheckpointFile::default(),
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("cannot read checkpoint file {}", path.display()));
            }
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshot(&self) -> CheckpointFile {
        self.lock().clone()
    }

    /// Align stored cursors with freshly discovered feed metadata.
    ///
    /// A different token invalidates every stored cursor; the partition set
    /// is re-derived from `info`. Returns `true` when cursors were dropped.
    pub fn reconcile(&self, info: &FeedInfo) -> anyhow::Result<bool> {
        let mut state = self.lock();
        if state.token == info.token {
            return Ok(false);
        }
        let reset = !state.cursors.is_empty();
        if !state.token.is_empty() {
            tracing::warn!(
                previous = %state.token,
                current = %info.token,
                partitions = ?info.partition_ids().collect::<Vec<_>>(),
                "feed token changed, restarting all partitions"
            );
        }
        state.token.clone_from(&info.token);
        state.cursors.clear();
        self.persist(&mut state)?;
        Ok(reset)
    }

    /// Stored resume cursor for `partition`, if any.
    pub fn cursor(&self, partition: PartitionId) -> Option<Cursor> {
        let state = self.lock();
        let raw = state.cursors.get(&partition)?;
        match Cursor::parse(raw, false) {
            Ok(cursor) => Some(cursor),
            Err(err) => {
                tracing::warn!(partition, cursor = %raw, error = %err, "ignoring stored cursor");
                None
            }
        }
    }

    /// Persist `cursor` for `partition`. Only concrete positions are stored.
    pub fn record(&self, partition: PartitionId, cursor: Cursor) -> anyhow::Result<()> {
        let Cursor::At(position) = cursor else {
            return Ok(());
        };
        let mut state = self.lock();
        let value = position.to_string();
        if state.cursors.get(&partition) == Some(&value) {
            return Ok(());
        }
        state.cursors.insert(partition, value);
        self.persist(&mut state)
    }

    fn lock(&self) -> MutexGuard<'_, CheckpointFile> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn persist(&self, state: &mut CheckpointFile) -> anyhow::Result<()> {
        state.updated_at = Some(Utc::now());
        let json = serde_json::to_vec_pretty(&*state)?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, json)
            .with_context(|| format!("cannot write checkpoint file {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("cannot replace checkpoint file {}", self.path.display()))?;
        Ok(())
    }
}
