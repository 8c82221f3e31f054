//! Convergence engine
//!
//! Decides from hashes alone whether an instance needs work, runs the
//! applier and records every step on the instance's record:
//!
//! - converged on the desired hash: nothing happens
//! - otherwise: `converging` (persisted before the apply starts), then
//!   `converged` or `error`, both carrying the attempted hash
//!
//! The dry-run track follows the same rules on its own status slot and
//! never touches the converge track.

use crate::applier::{Applier, ApplyMode, ApplyReport};
use crate::error::{ApplyError, Track, WingError};
use crate::manifest::Manifest;
use crate::store::InstanceStore;
use crate::transition::validate_transition;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_api::{
    InstanceState, InstanceStateStatusManifest, ManifestHash, ManifestState, PoolType,
};

/// Result of one pass over a track
#[derive(Debug)]
pub enum Outcome {
    /// Already converged on this hash
    Unchanged,
    Converged,
    /// Apply failed; recorded as `error`
    Failed(ApplyError),
}

impl Outcome {
    #[must_use]
    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }
}

/// Drives the convergence record of one instance
pub struct ConvergeEngine {
    instance_id: String,
    pool: PoolType,
    store: Arc<dyn InstanceStore>,
    applier: Arc<dyn Applier>,
    dry_run_dir: PathBuf,
}

impl ConvergeEngine {
    #[must_use]
    pub fn new(
        instance_id: impl Into<String>,
        pool: PoolType,
        store: Arc<dyn InstanceStore>,
        applier: Arc<dyn Applier>,
        dry_run_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            instance_id: instance_id.into(),
            pool,
            store,
            applier,
            dry_run_dir: dry_run_dir.into(),
        }
    }

    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Stored record, if the instance has reported before
    ///
    /// # Errors
    /// Store failures
    pub async fn record(&self) -> Result<Option<InstanceState>, WingError> {
        self.store.load(&self.instance_id).await
    }

    /// Where the dry-run output for `hash` is written
    ///
    /// Only the log of the latest dry run is kept.
    #[must_use]
    pub fn dry_run_path(&self, hash: &ManifestHash) -> PathBuf {
        self.dry_run_dir.join(format!("{hash}.log"))
    }

    /// Bring the instance to `manifest`
    ///
    /// # Errors
    /// Store failures and illegal transitions; a failed apply is
    /// `Ok(Outcome::Failed)`
    #[tracing::instrument(skip_all, fields(instance = %self.instance_id, hash = %manifest.hash().short()))]
    pub async fn converge(&self, manifest: &Manifest) -> Result<Outcome, WingError> {
        let hash = manifest.hash().to_string();
        let mut record = self.load_or_create().await?;
        record.spec.converge_hash.clone_from(&hash);
        if !record.needs_converge() {
            tracing::debug!("already converged");
            return Ok(Outcome::Unchanged);
        }

        self.enter(&mut record, Track::Converge, &hash).await?;
        let result = self.applier.apply(manifest, ApplyMode::Converge).await;
        self.finish(&mut record, Track::Converge, &hash, result)
            .await
    }

    /// Validate `manifest` without changing the instance
    ///
    /// Output is written to [`Self::dry_run_path`] and recorded as
    /// `spec.dryRunPath`.
    ///
    /// # Errors
    /// Store and file failures and illegal transitions; a failed apply is
    /// `Ok(Outcome::Failed)`
    #[tracing::instrument(skip_all, fields(instance = %self.instance_id, hash = %manifest.hash().short()))]
    pub async fn dry_run(&self, manifest: &Manifest) -> Result<Outcome, WingError> {
        let hash = manifest.hash().to_string();
        let mut record = self.load_or_create().await?;
        record.spec.dry_run_hash.clone_from(&hash);
        if !record.needs_dry_run() {
            tracing::debug!("dry run already passed");
            return Ok(Outcome::Unchanged);
        }

        self.enter(&mut record, Track::DryRun, &hash).await?;
        let result = self.applier.apply(manifest, ApplyMode::DryRun).await;
        let output = match &result {
            Ok(report) => Some(report.output.clone()),
            Err(e) => e.output().map(<[u8]>::to_vec),
        };

        if let Some(output) = output {
            let path = self.dry_run_path(manifest.hash());
            if let Err(e) = write_output(&path, &output).await {
                let failed = Err(ApplyError::Failed(e.to_string()));
                self.finish(&mut record, Track::DryRun, &hash, failed)
                    .await?;
                return Err(e);
            }
            let previous =
                std::mem::replace(&mut record.spec.dry_run_path, path.display().to_string());
            self.remove_superseded(Path::new(&previous), &path).await;
        }

        self.finish(&mut record, Track::DryRun, &hash, result)
            .await
    }

    async fn remove_superseded(&self, previous: &Path, current: &Path) {
        if previous.as_os_str().is_empty()
            || previous == current
            || previous.parent() != Some(self.dry_run_dir.as_path())
        {
            return;
        }
        match tokio::fs::remove_file(previous).await {
            Ok(()) => tracing::debug!(path = %previous.display(), "removed superseded dry-run log"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %previous.display(), error = %e, "could not remove dry-run log");
            }
        }
    }

    async fn load_or_create(&self) -> Result<InstanceState, WingError> {
        Ok(self
            .store
            .load(&self.instance_id)
            .await?
            .unwrap_or_else(|| InstanceState::new(self.instance_id.clone(), self.pool)))
    }

    async fn enter(
        &self,
        record: &mut InstanceState,
        track: Track,
        hash: &str,
    ) -> Result<(), WingError> {
        transition(record, track, ManifestState::Converging, hash)?;
        self.store.save(record).await?;
        tracing::info!(%track, "converging");
        Ok(())
    }

    async fn finish(
        &self,
        record: &mut InstanceState,
        track: Track,
        hash: &str,
        result: Result<ApplyReport, ApplyError>,
    ) -> Result<Outcome, WingError> {
        let (state, outcome) = match result {
            Ok(_) => (ManifestState::Converged, Outcome::Converged),
            Err(e) => {
                tracing::warn!(%track, error = %e, "apply failed");
                (ManifestState::Error, Outcome::Failed(e))
            }
        };
        transition(record, track, state, hash)?;
        self.store.save(record).await?;
        tracing::info!(%track, %state, "cycle finished");
        Ok(outcome)
    }
}

fn transition(
    record: &mut InstanceState,
    track: Track,
    to: ManifestState,
    hash: &str,
) -> Result<(), WingError> {
    let slot = slot(record, track);
    validate_transition(track, slot.as_ref().map(|m| m.state), to)?;
    *slot = Some(InstanceStateStatusManifest::new(to, hash));
    Ok(())
}

fn slot(record: &mut InstanceState, track: Track) -> &mut Option<InstanceStateStatusManifest> {
    match track {
        Track::Converge => &mut record.status.converge,
        Track::DryRun => &mut record.status.dry_run,
    }
}

async fn write_output(path: &Path, output: &[u8]) -> Result<(), WingError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| WingError::io(parent, e))?;
    }
    tokio::fs::write(path, output)
        .await
        .map_err(|e| WingError::io(path, e))
}
