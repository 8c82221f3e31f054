//! Configuration management appliers

use crate::config::ApplyConfig;
use crate::error::ApplyError;
use crate::manifest::Manifest;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

/// Placeholder in command arguments replaced by the manifest path
pub const MANIFEST_PLACEHOLDER: &str = "{manifest}";

/// Real run or validation only
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplyMode {
    Converge,
    DryRun,
}

/// Output of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub exit_code: Option<i32>,
    /// Combined stdout and stderr
    pub output: Vec<u8>,
}

/// Applies a manifest to the local instance
#[async_trait::async_trait]
pub trait Applier: Send + Sync {
    /// In `DryRun` mode nothing on the instance may change
    async fn apply(&self, manifest: &Manifest, mode: ApplyMode) -> Result<ApplyReport, ApplyError>;
}

/// Runs an external command, feeding the manifest on stdin
///
/// Arguments equal to `{manifest}` are replaced with the manifest's path.
/// The child is killed when the timeout expires.
#[derive(Debug, Clone)]
pub struct CommandApplier {
    program: String,
    args: Vec<String>,
    dry_run_args: Vec<String>,
    success_codes: Vec<i32>,
    timeout: Duration,
}

impl CommandApplier {
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self::from_config(&ApplyConfig {
            program: program.into(),
            args: Vec::new(),
            dry_run_args: Vec::new(),
            ..ApplyConfig::default()
        })
    }

    #[must_use]
    pub fn from_config(config: &ApplyConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
            dry_run_args: config.dry_run_args.clone(),
            success_codes: config.success_codes.clone(),
            timeout: config.timeout(),
        }
    }

    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_dry_run_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dry_run_args = args.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_success_codes(mut self, codes: impl Into<Vec<i32>>) -> Self {
        self.success_codes = codes.into();
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_args(&self, manifest: &Manifest, mode: ApplyMode) -> Vec<String> {
        let extra = match mode {
            ApplyMode::Converge => &[][..],
            ApplyMode::DryRun => &self.dry_run_args[..],
        };
        let path = manifest.path().map(|p| p.display().to_string());
        self.args
            .iter()
            .chain(extra)
            .map(|arg| match (&path, arg.as_str()) {
                (Some(path), MANIFEST_PLACEHOLDER) => path.clone(),
                _ => arg.clone(),
            })
            .collect()
    }

    async fn run(&self, manifest: &Manifest, mode: ApplyMode) -> Result<ApplyReport, ApplyError> {
        let mut child = Command::new(&self.program)
            .args(self.command_args(manifest, mode))
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ApplyError::Spawn {
                program: self.program.clone(),
                source,
            })?;

        // The child may fill its output pipes before it has read all of stdin,
        // so feeding and draining run together.
        let stdin = child.stdin.take();
        let feed = async move {
            let Some(mut stdin) = stdin else {
                return Ok(());
            };
            match stdin.write_all(manifest.content()).await {
                Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e),
                _ => Ok(()),
            }
        };
        let (fed, out) = tokio::join!(feed, child.wait_with_output());

        let out = out
            .map_err(|e| ApplyError::Failed(format!("waiting for {}: {e}", self.program)))?;
        fed.map_err(|e| ApplyError::Failed(format!("writing manifest: {e}")))?;

        let mut output = out.stdout;
        output.extend_from_slice(&out.stderr);
        let code = out.status.code();
        if code.is_some_and(|c| self.success_codes.contains(&c)) {
            Ok(ApplyReport {
                exit_code: code,
                output,
            })
        } else {
            Err(ApplyError::Exit {
                program: self.program.clone(),
                code,
                output,
            })
        }
    }
}

#[async_trait::async_trait]
impl Applier for CommandApplier {
    async fn apply(&self, manifest: &Manifest, mode: ApplyMode) -> Result<ApplyReport, ApplyError> {
        tracing::debug!(program = %self.program, ?mode, hash = %manifest.hash().short(), "running applier");
        tokio::time::timeout(self.timeout, self.run(manifest, mode))
            .await
            .map_err(|_| ApplyError::Timeout {
                program: self.program.clone(),
                timeout: self.timeout,
            })?
    }
}
