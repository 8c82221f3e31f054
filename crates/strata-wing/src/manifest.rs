//! Desired manifests and where they come from

use crate::error::WingError;
use std::path::{Path, PathBuf};
use strata_api::ManifestHash;

/// Desired configuration for this instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    content: Vec<u8>,
    hash: ManifestHash,
    path: Option<PathBuf>,
}

impl Manifest {
    /// Fingerprints `content` with [`ManifestHash`]
    #[must_use]
    pub fn new(content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        let hash = ManifestHash::compute(&content);
        Self {
            content,
            hash,
            path: None,
        }
    }

    #[must_use]
    pub fn at_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    #[must_use]
    pub fn content(&self) -> &[u8] {
        &self.content
    }

    #[must_use]
    pub fn hash(&self) -> &ManifestHash {
        &self.hash
    }

    /// File the manifest was read from, if any
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

/// Supplies the current desired manifest
#[async_trait::async_trait]
pub trait ManifestSource: Send + Sync {
    /// `Ok(None)` when nothing has been published yet
    async fn fetch(&self) -> Result<Option<Manifest>, WingError>;
}

/// Reads the manifest from a local file
#[derive(Debug, Clone)]
pub struct FileManifestSource {
    path: PathBuf,
}

impl FileManifestSource {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl ManifestSource for FileManifestSource {
    async fn fetch(&self) -> Result<Option<Manifest>, WingError> {
        match tokio::fs::read(&self.path).await {
            Ok(content) => Ok(Some(Manifest::new(content).at_path(&self.path))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no manifest published yet");
                Ok(None)
            }
            Err(e) => Err(WingError::io(&self.path, e)),
        }
    }
}
