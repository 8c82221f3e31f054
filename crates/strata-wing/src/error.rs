//! Error types for the node agent
//!
//! [`WingError`] covers everything that stops a convergence cycle from being
//! recorded: the record store, the manifest source, local files and illegal
//! state transitions. A failed apply is not one of them; it is an
//! [`ApplyError`], which the engine records as `error` state and hands back
//! inside its outcome.

use std::path::PathBuf;
use std::time::Duration;
use strata_api::ManifestState;

/// Which record track a transition belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Track {
    Converge,
    DryRun,
}

impl Track {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Track::Converge => "converge",
            Track::DryRun => "dryRun",
        }
    }
}

impl std::fmt::Display for Track {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Node agent errors
#[derive(Debug, thiserror::Error)]
pub enum WingError {
    /// Record could not be loaded or saved
    #[error("instance store error for {instance}: {reason}")]
    Store { instance: String, reason: String },

    /// Desired manifest could not be read
    #[error("manifest source error: {0}")]
    Source(String),

    #[error("error accessing {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Record mutation outside the transition table
    #[error(
        "illegal {track} transition from {} to {to}",
        .from.map_or("initial", ManifestState::as_str)
    )]
    Transition {
        track: Track,
        from: Option<ManifestState>,
        to: ManifestState,
    },

    #[error("configuration error: {0}")]
    Config(String),
}

impl WingError {
    #[must_use]
    pub fn store(instance: &str, reason: impl std::fmt::Display) -> Self {
        Self::Store {
            instance: instance.to_string(),
            reason: reason.to_string(),
        }
    }

    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Configuration management run failure
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    /// Command could not be started
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Command exited outside the success codes
    #[error("{program} exited with {}", .code.map_or_else(|| "a signal".to_string(), |c| format!("status {c}")))]
    Exit {
        program: String,
        code: Option<i32>,
        output: Vec<u8>,
    },

    #[error("{program} did not finish within {timeout:?}")]
    Timeout { program: String, timeout: Duration },

    /// Applier specific failure
    #[error("apply failed: {0}")]
    Failed(String),
}

impl ApplyError {
    /// Captured command output, if the command ran to completion
    #[must_use]
    pub fn output(&self) -> Option<&[u8]> {
        match self {
            ApplyError::Exit { output, .. } => Some(output),
            _ => None,
        }
    }
}
