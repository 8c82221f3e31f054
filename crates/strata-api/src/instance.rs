//! Instance convergence records
//!
//! One [`InstanceState`] exists per instance. It is written only by that
//! instance's own agent and read by the control plane. Field names are the
//! wire contract:
//!
//! ```json
//! {"instanceID": "i-1", "instancePool": "master",
//!  "spec": {"convergeHash": "..", "dryRunPath": "..", "dryRunHash": ".."},
//!  "status": {"converge": {"state": "converged", "hash": ".."},
//!             "dryRun": {"state": "error", "hash": ".."}}}
//! ```

use crate::meta::{ObjectMeta, TypeMeta};
use crate::pool::PoolType;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Observed state of one manifest application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ManifestState {
    Converging,
    Converged,
    Error,
}

impl ManifestState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            ManifestState::Converging => "converging",
            ManifestState::Converged => "converged",
            ManifestState::Error => "error",
        }
    }

    /// `converged` and `error` end a cycle
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, ManifestState::Converged | ManifestState::Error)
    }
}

impl fmt::Display for ManifestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-instance record of desired versus applied configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceState {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(rename = "instanceID")]
    pub instance_id: String,
    #[serde(rename = "instancePool")]
    pub instance_pool: PoolType,

    #[serde(default)]
    pub spec: InstanceStateSpec,
    #[serde(default)]
    pub status: InstanceStateStatus,
}

/// Desired state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStateSpec {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub converge_hash: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dry_run_path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub dry_run_hash: String,
}

/// Observed state for the real and the dry-run pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceStateStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub converge: Option<InstanceStateStatusManifest>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dry_run: Option<InstanceStateStatusManifest>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceStateStatusManifest {
    pub state: ManifestState,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub hash: String,
}

impl InstanceStateStatusManifest {
    #[must_use]
    pub fn new(state: ManifestState, hash: impl Into<String>) -> Self {
        Self {
            state,
            hash: hash.into(),
        }
    }

    /// Converged on exactly this hash
    #[must_use]
    pub fn is_converged_on(&self, hash: &str) -> bool {
        self.state == ManifestState::Converged && self.hash == hash
    }
}

impl InstanceState {
    /// Fresh record for an instance reporting in for the first time
    #[must_use]
    pub fn new(instance_id: impl Into<String>, instance_pool: PoolType) -> Self {
        let instance_id = instance_id.into();
        Self {
            type_meta: TypeMeta::new("InstanceState"),
            metadata: ObjectMeta::named(instance_id.clone()),
            instance_id,
            instance_pool,
            spec: InstanceStateSpec::default(),
            status: InstanceStateStatus::default(),
        }
    }

    /// Whether the applied configuration differs from the desired one
    ///
    /// True when there is no converge status, the status is not `converged`,
    /// or the converged hash differs from `spec.convergeHash`.
    #[must_use]
    pub fn needs_converge(&self) -> bool {
        !self
            .status
            .converge
            .as_ref()
            .is_some_and(|m| m.is_converged_on(&self.spec.converge_hash))
    }

    /// Whether the last dry-run validated `spec.dryRunHash`
    #[must_use]
    pub fn needs_dry_run(&self) -> bool {
        !self
            .status
            .dry_run
            .as_ref()
            .is_some_and(|m| m.is_converged_on(&self.spec.dry_run_hash))
    }

    #[must_use]
    pub fn converge_state(&self) -> Option<ManifestState> {
        self.status.converge.as_ref().map(|m| m.state)
    }

    #[must_use]
    pub fn dry_run_state(&self) -> Option<ManifestState> {
        self.status.dry_run.as_ref().map(|m| m.state)
    }
}
