//! Node agent configuration
//!
//! Loaded from YAML; every field except the instance identity has a default.
//!
//! ```yaml
//! instanceId: i-0abc
//! instancePool: master
//! manifestPath: /etc/strata/site.pp
//! apply:
//!   program: puppet
//!   args: [apply, --detailed-exitcodes]
//!   dryRunArgs: [--noop]
//! ```

use crate::error::WingError;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use strata_api::PoolType;

/// Configuration management command
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ApplyConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Appended to `args` for a dry run
    pub dry_run_args: Vec<String>,
    /// Exit codes meaning the run succeeded
    pub success_codes: Vec<i32>,
    pub timeout_secs: u64,
}

impl Default for ApplyConfig {
    fn default() -> Self {
        Self {
            program: "puppet".into(),
            args: vec!["apply".into(), "--detailed-exitcodes".into()],
            dry_run_args: vec!["--noop".into()],
            success_codes: vec![0, 2],
            timeout_secs: 1800,
        }
    }
}

impl ApplyConfig {
    #[inline]
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Agent settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WingConfig {
    #[serde(rename = "instanceID", alias = "instanceId")]
    pub instance_id: String,
    pub instance_pool: PoolType,
    #[serde(default = "defaults::manifest_path")]
    pub manifest_path: PathBuf,
    #[serde(default = "defaults::state_dir")]
    pub state_dir: PathBuf,
    #[serde(default = "defaults::dry_run_dir")]
    pub dry_run_dir: PathBuf,
    #[serde(default = "defaults::interval_secs")]
    pub interval_secs: u64,
    /// Validate each new manifest with a dry run before applying it
    #[serde(default)]
    pub dry_run_first: bool,
    #[serde(default)]
    pub apply: ApplyConfig,
}

mod defaults {
    use std::path::PathBuf;

    pub(super) fn manifest_path() -> PathBuf {
        PathBuf::from("/etc/strata/manifest.pp")
    }

    pub(super) fn state_dir() -> PathBuf {
        PathBuf::from("/var/lib/strata/instances")
    }

    pub(super) fn dry_run_dir() -> PathBuf {
        PathBuf::from("/var/lib/strata/dry-run")
    }

    pub(super) const fn interval_secs() -> u64 {
        60
    }
}

impl WingConfig {
    #[must_use]
    pub fn new(instance_id: impl Into<String>, instance_pool: PoolType) -> Self {
        Self {
            instance_id: instance_id.into(),
            instance_pool,
            manifest_path: defaults::manifest_path(),
            state_dir: defaults::state_dir(),
            dry_run_dir: defaults::dry_run_dir(),
            interval_secs: defaults::interval_secs(),
            dry_run_first: false,
            apply: ApplyConfig::default(),
        }
    }

    #[must_use]
    pub fn with_manifest_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.manifest_path = path.into();
        self
    }

    #[must_use]
    pub fn with_state_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.state_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_dry_run_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.dry_run_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval_secs = interval.as_secs();
        self
    }

    #[must_use]
    pub fn with_dry_run_first(mut self, enabled: bool) -> Self {
        self.dry_run_first = enabled;
        self
    }

    #[must_use]
    pub fn with_apply(mut self, apply: ApplyConfig) -> Self {
        self.apply = apply;
        self
    }

    #[inline]
    #[must_use]
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// # Errors
    /// Returns `WingError::Config` for malformed YAML or invalid values
    pub fn from_yaml(input: &str) -> Result<Self, WingError> {
        let config: Self =
            serde_yaml::from_str(input).map_err(|e| WingError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `WingError::Config` naming the first invalid field
    pub fn validate(&self) -> Result<(), WingError> {
        let fail = |msg: &str| Err(WingError::Config(msg.to_string()));
        if self.instance_id.trim().is_empty() {
            return fail("instanceID must not be empty");
        }
        if self.interval_secs == 0 {
            return fail("intervalSecs must be greater than zero");
        }
        if self.apply.program.is_empty() {
            return fail("apply.program must not be empty");
        }
        if self.apply.success_codes.is_empty() {
            return fail("apply.successCodes must list at least one exit code");
        }
        if self.apply.timeout_secs == 0 {
            return fail("apply.timeoutSecs must be greater than zero");
        }
        Ok(())
    }
}
