//! Error types for stack orchestration
//!
//! Two layers:
//! - [`HookError`] is what a single hook returns: configuration, connection,
//!   type mismatch, file I/O or secret-service failures
//! - [`StackError`] is what the stack and the manager return; a failed hook
//!   is wrapped with the stack, the phase and the hook name so the failure
//!   can be traced back to the exact operation

use crate::collaborator::{SecretError, TerraformError};
use crate::stack::StackName;
use std::fmt;
use std::path::PathBuf;

/// Which hook chain was running
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPhase {
    PreDeploy,
    PreDestroy,
}

impl fmt::Display for HookPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookPhase::PreDeploy => f.write_str("pre-deploy"),
            HookPhase::PreDestroy => f.write_str("pre-destroy"),
        }
    }
}

/// File operation that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoOp {
    Create,
    Write,
    Close,
}

impl fmt::Display for IoOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IoOp::Create => f.write_str("creating"),
            IoOp::Write => f.write_str("writing to"),
            IoOp::Close => f.write_str("closing"),
        }
    }
}

/// Failure of a single hook
#[derive(Debug, thiserror::Error)]
pub enum HookError {
    /// Malformed or missing stack input
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Tunnel or network failure
    #[error("connection to {target} failed: {reason}")]
    Connection { target: String, reason: String },

    /// A cross-stack reference resolved to the wrong kind of stack
    #[error("unexpected kind for stack {stack}: expected {expected}, found {found}")]
    TypeMismatch {
        stack: StackName,
        expected: &'static str,
        found: &'static str,
    },

    /// Artifact open/write/close failure
    #[error("error {op} {}: {source}", .path.display())]
    Io {
        op: IoOp,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Authentication or token issuance failure
    #[error("secret service error: {0}")]
    Secret(#[source] SecretError),

    /// Infrastructure output or apply failure
    #[error(transparent)]
    Terraform(#[from] TerraformError),
}

impl HookError {
    #[must_use]
    pub fn io(op: IoOp, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            op,
            path: path.into(),
            source,
        }
    }

    /// Worth retrying the whole deploy without changing inputs
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}

impl From<SecretError> for HookError {
    fn from(value: SecretError) -> Self {
        match value {
            SecretError::Tunnel(reason) => HookError::Connection {
                target: "secret service".into(),
                reason,
            },
            other => HookError::Secret(other),
        }
    }
}

/// Stack and manager level errors
#[derive(Debug, thiserror::Error)]
pub enum StackError {
    /// A hook failed; the remaining chain was not run
    #[error("stack {stack}: {phase} hook {hook:?} failed: {source}")]
    Hook {
        stack: StackName,
        phase: HookPhase,
        hook: String,
        #[source]
        source: HookError,
    },

    /// No stack registered under that name
    #[error("stack {0} not found")]
    NotFound(StackName),

    /// Stack registered twice
    #[error("stack {0} already registered")]
    Duplicate(StackName),

    /// Role is missing its name or prefix, or collides with another role
    #[error("invalid role in stack {stack}: {reason}")]
    InvalidRole { stack: StackName, reason: String },

    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(String),

    /// Infrastructure apply/destroy failure
    #[error(transparent)]
    Terraform(#[from] TerraformError),
}

impl StackError {
    /// Name of the failing hook, if a hook failed
    #[must_use]
    pub fn hook_name(&self) -> Option<&str> {
        match self {
            Self::Hook { hook, .. } => Some(hook),
            _ => None,
        }
    }

    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Hook { source, .. } => source.is_retryable(),
            _ => false,
        }
    }
}
