//! Orchestrator configuration and the per-deployment context
//!
//! [`Deployment`] is built once by the top-level driver and handed to
//! [`crate::StackManager::for_deployment`]; there is no process-wide registry.

use crate::collaborator::{ConfigPackager, RootTokenSource, SecretService, Terraform};
use crate::error::StackError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

/// Default location of the packaged configuration, relative to the root path
pub const DEFAULT_ARTIFACT_PATH: &str = "terraform/aws-centos/kubernetes/puppet.tar.gz";

/// Tunable orchestrator settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrchestratorConfig {
    /// Upper bound on establishing the vault tunnel
    pub tunnel_timeout_secs: u64,
    /// Packaged configuration artifact, relative to the root path
    pub artifact_path: PathBuf,
}

impl OrchestratorConfig {
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whole seconds; a fractional part rounds up
    #[inline]
    #[must_use]
    pub fn with_tunnel_timeout(mut self, timeout: Duration) -> Self {
        self.tunnel_timeout_secs = timeout.as_secs() + u64::from(timeout.subsec_nanos() > 0);
        self
    }

    #[inline]
    #[must_use]
    pub fn tunnel_timeout(&self) -> Duration {
        Duration::from_secs(self.tunnel_timeout_secs)
    }

    /// Parse and validate a YAML document
    ///
    /// # Errors
    /// Returns `StackError::Config` on malformed input or invalid values
    pub fn from_yaml(input: &str) -> Result<Self, StackError> {
        let config: Self =
            serde_yaml::from_str(input).map_err(|e| StackError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `StackError::Config` if the tunnel timeout is zero or the
    /// artifact path is absolute or empty
    pub fn validate(&self) -> Result<(), StackError> {
        if self.tunnel_timeout_secs == 0 {
            return Err(StackError::Config(
                "tunnelTimeoutSecs must be greater than zero".into(),
            ));
        }
        if self.artifact_path.as_os_str().is_empty() || self.artifact_path.is_absolute() {
            return Err(StackError::Config(format!(
                "artifactPath must be a relative path, got {:?}",
                self.artifact_path
            )));
        }
        Ok(())
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            tunnel_timeout_secs: 30,
            artifact_path: PathBuf::from(DEFAULT_ARTIFACT_PATH),
        }
    }
}

/// External systems the stacks call into
#[derive(Clone)]
pub struct Collaborators {
    pub terraform: Arc<dyn Terraform>,
    pub packager: Arc<dyn ConfigPackager>,
    pub secrets: Arc<dyn SecretService>,
    pub root_token: Arc<dyn RootTokenSource>,
}

/// Everything needed to build the stacks of one cluster
#[derive(Clone)]
pub struct Deployment {
    config: OrchestratorConfig,
    context_name: String,
    root_path: PathBuf,
    collaborators: Collaborators,
}

impl Deployment {
    /// # Errors
    /// Returns `StackError::Config` for an invalid config or empty context name
    pub fn new(
        config: OrchestratorConfig,
        cluster: &strata_api::Cluster,
        root_path: impl Into<PathBuf>,
        collaborators: Collaborators,
    ) -> Result<Self, StackError> {
        config.validate()?;
        cluster
            .validate()
            .map_err(|e| StackError::Config(e.to_string()))?;
        Ok(Self {
            config,
            context_name: cluster.context_name(),
            root_path: root_path.into(),
            collaborators,
        })
    }

    #[must_use]
    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    /// `<environment>-<cluster>`
    #[must_use]
    pub fn context_name(&self) -> &str {
        &self.context_name
    }

    #[must_use]
    pub fn root_path(&self) -> &Path {
        &self.root_path
    }

    #[must_use]
    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    /// Absolute location of the packaged configuration artifact
    #[must_use]
    pub fn artifact_path(&self) -> PathBuf {
        self.root_path.join(&self.config.artifact_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = OrchestratorConfig::new();
        assert!(config.validate().is_ok());
        assert_eq!(config.tunnel_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn sub_second_timeout_rounds_up() {
        let config = OrchestratorConfig::new().with_tunnel_timeout(Duration::from_millis(500));
        assert_eq!(config.tunnel_timeout(), Duration::from_secs(1));
        assert!(config.validate().is_ok());

        let config = OrchestratorConfig::new().with_tunnel_timeout(Duration::from_millis(2001));
        assert_eq!(config.tunnel_timeout_secs, 3);

        let config = OrchestratorConfig::new().with_tunnel_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn yaml_overrides_and_validation() {
        let config = OrchestratorConfig::from_yaml("tunnelTimeoutSecs: 5\n").unwrap();
        assert_eq!(config.tunnel_timeout_secs, 5);
        assert_eq!(config.artifact_path, PathBuf::from(DEFAULT_ARTIFACT_PATH));

        assert!(OrchestratorConfig::from_yaml("tunnelTimeoutSecs: 0\n").is_err());
        assert!(OrchestratorConfig::from_yaml("artifactPath: /etc/puppet.tar.gz\n").is_err());
        assert!(OrchestratorConfig::from_yaml("tunnelTimeoutSecs: [1]\n").is_err());
    }
}
