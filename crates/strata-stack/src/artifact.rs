//! Packaged configuration artifact hooks
//!
//! The kubernetes stack ships its configuration-management code as a
//! tarball at a fixed path under the root path. Deploy rewrites it fully;
//! destroy truncates it to zero bytes but leaves it in place, so the next
//! plan always finds a well-formed file and repeated destroys never fail on
//! a missing one.

use crate::collaborator::ConfigPackager;
use crate::error::{HookError, IoOp};
use crate::hook::{Hook, HookContext};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

const ARTIFACT_MODE: u32 = 0o600;

/// Pre-deploy hook writing the packaged configuration
pub struct EnsurePuppetTarGz {
    path: PathBuf,
    packager: Arc<dyn ConfigPackager>,
}

impl EnsurePuppetTarGz {
    pub const NAME: &'static str = "ensure_puppet_tar_gz";

    #[must_use]
    pub fn new(path: impl Into<PathBuf>, packager: Arc<dyn ConfigPackager>) -> Self {
        Self {
            path: path.into(),
            packager,
        }
    }
}

#[async_trait::async_trait]
impl Hook for EnsurePuppetTarGz {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        let path = self.path.clone();
        let packager = Arc::clone(&self.packager);
        tokio::task::spawn_blocking(move || write_archive(&path, packager.as_ref()))
            .await
            .map_err(|e| HookError::io(IoOp::Write, &self.path, std::io::Error::other(e)))??;
        tracing::info!(path = %self.path.display(), "wrote packaged configuration");
        Ok(())
    }
}

/// Pre-destroy hook truncating the packaged configuration
pub struct EmptyPuppetTarGz {
    path: PathBuf,
}

impl EmptyPuppetTarGz {
    pub const NAME: &'static str = "empty_puppet_tar_gz";

    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl Hook for EmptyPuppetTarGz {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        let mut options = tokio::fs::OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        options.mode(ARTIFACT_MODE);

        let file = options
            .open(&self.path)
            .await
            .map_err(|e| HookError::io(IoOp::Create, &self.path, e))?;
        file.sync_all()
            .await
            .map_err(|e| HookError::io(IoOp::Close, &self.path, e))?;
        tracing::info!(path = %self.path.display(), "emptied packaged configuration");
        Ok(())
    }
}

fn write_archive(path: &Path, packager: &dyn ConfigPackager) -> Result<(), HookError> {
    let mut options = File::options();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(ARTIFACT_MODE);
    }

    let file = options
        .open(path)
        .map_err(|e| HookError::io(IoOp::Create, path, e))?;

    let mut writer = BufWriter::new(file);
    packager
        .tar_gz(&mut writer)
        .map_err(|e| HookError::io(IoOp::Write, path, e))?;
    writer
        .flush()
        .map_err(|e| HookError::io(IoOp::Write, path, e))?;

    let file = writer
        .into_inner()
        .map_err(|e| HookError::io(IoOp::Write, path, e.into_error()))?;
    file.sync_all()
        .map_err(|e| HookError::io(IoOp::Close, path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stack::{StackName, Variables};

    struct StaticPackager(&'static [u8]);

    impl ConfigPackager for StaticPackager {
        fn tar_gz(&self, writer: &mut dyn Write) -> std::io::Result<()> {
            writer.write_all(self.0)
        }
    }

    struct BrokenPackager;

    impl ConfigPackager for BrokenPackager {
        fn tar_gz(&self, _writer: &mut dyn Write) -> std::io::Result<()> {
            Err(std::io::Error::other("tar failed"))
        }
    }

    async fn run(hook: &dyn Hook) -> Result<(), HookError> {
        let mut vars = Variables::new();
        let mut ctx = HookContext::new(StackName::Kubernetes, &mut vars, &mut []);
        hook.run(&mut ctx).await
    }

    #[tokio::test]
    async fn ensure_overwrites_fully() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puppet.tar.gz");

        run(&EnsurePuppetTarGz::new(&path, Arc::new(StaticPackager(b"a much longer archive"))))
            .await
            .unwrap();
        run(&EnsurePuppetTarGz::new(&path, Arc::new(StaticPackager(b"short"))))
            .await
            .unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"short");
    }

    #[tokio::test]
    async fn empty_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puppet.tar.gz");
        std::fs::write(&path, b"previous archive").unwrap();

        let hook = EmptyPuppetTarGz::new(&path);
        for _ in 0..2 {
            run(&hook).await.unwrap();
            let meta = std::fs::metadata(&path).unwrap();
            assert!(meta.is_file());
            assert_eq!(meta.len(), 0);
        }
    }

    #[tokio::test]
    async fn empty_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puppet.tar.gz");
        run(&EmptyPuppetTarGz::new(&path)).await.unwrap();
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 0);
    }

    #[tokio::test]
    async fn write_failure_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puppet.tar.gz");

        let err = run(&EnsurePuppetTarGz::new(&path, Arc::new(BrokenPackager)))
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Io { op: IoOp::Write, .. }));
        assert!(err.to_string().contains("puppet.tar.gz"));
        assert!(err.to_string().starts_with("error writing to"));
    }

    #[tokio::test]
    async fn create_failure_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("puppet.tar.gz");

        let err = run(&EnsurePuppetTarGz::new(&path, Arc::new(StaticPackager(b"x"))))
            .await
            .unwrap_err();
        assert!(matches!(err, HookError::Io { op: IoOp::Create, .. }));

        let err = run(&EmptyPuppetTarGz::new(&path)).await.unwrap_err();
        assert!(err.to_string().starts_with("error creating"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn artifact_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("puppet.tar.gz");
        run(&EmptyPuppetTarGz::new(&path)).await.unwrap();
        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, ARTIFACT_MODE);
    }
}
