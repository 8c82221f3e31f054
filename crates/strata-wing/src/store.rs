//! Instance record stores
//!
//! Each instance is the only writer of its own record, so stores need no
//! cross-writer locking beyond what keeps a single save atomic.

use crate::error::WingError;
use dashmap::DashMap;
use std::path::{Path, PathBuf};
use strata_api::InstanceState;

/// Durable home of instance convergence records
#[async_trait::async_trait]
pub trait InstanceStore: Send + Sync {
    /// `Ok(None)` for an instance that never reported
    async fn load(&self, instance_id: &str) -> Result<Option<InstanceState>, WingError>;

    /// Replace the record keyed by its `instance_id`
    async fn save(&self, record: &InstanceState) -> Result<(), WingError>;
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<String, InstanceState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait::async_trait]
impl InstanceStore for MemoryStore {
    async fn load(&self, instance_id: &str) -> Result<Option<InstanceState>, WingError> {
        Ok(self.records.get(instance_id).map(|r| r.value().clone()))
    }

    async fn save(&self, record: &InstanceState) -> Result<(), WingError> {
        self.records
            .insert(record.instance_id.clone(), record.clone());
        Ok(())
    }
}

/// One JSON document per instance under a directory
///
/// Saves write a temporary sibling and rename it over the record, so a
/// reader never sees a partial document.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// # Errors
    /// Returns `WingError::Store` for an id that is not a plain file name
    pub fn record_path(&self, instance_id: &str) -> Result<PathBuf, WingError> {
        let valid = !instance_id.is_empty()
            && !instance_id.starts_with('.')
            && !instance_id.contains(['/', '\\']);
        if !valid {
            return Err(WingError::store(instance_id, "invalid instance id"));
        }
        Ok(self.dir.join(format!("{instance_id}.json")))
    }
}

#[async_trait::async_trait]
impl InstanceStore for FileStore {
    async fn load(&self, instance_id: &str) -> Result<Option<InstanceState>, WingError> {
        let path = self.record_path(instance_id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(WingError::io(&path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| WingError::store(instance_id, format!("{}: {e}", path.display())))
    }

    async fn save(&self, record: &InstanceState) -> Result<(), WingError> {
        let path = self.record_path(&record.instance_id)?;
        let tmp = self.dir.join(format!(".{}.json.tmp", record.instance_id));
        let json = serde_json::to_vec_pretty(record)
            .map_err(|e| WingError::store(&record.instance_id, e))?;

        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| WingError::io(&self.dir, e))?;
        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| WingError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| WingError::io(&path, e))?;
        tracing::trace!(path = %path.display(), "saved instance record");
        Ok(())
    }
}
