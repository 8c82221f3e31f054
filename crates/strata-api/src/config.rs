//! Top-level configuration document

use crate::cluster::Cluster;
use crate::environment::Environment;
use crate::error::ApiError;
use crate::meta::{ObjectMeta, TypeMeta};
use crate::provider::Provider;
use serde::{Deserialize, Serialize};

/// Everything a control process needs to know about its fleet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// `<environmentName>-<clusterName>`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub current_cluster: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contact: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub clusters: Vec<Cluster>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub providers: Vec<Provider>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub environments: Vec<Environment>,
}

impl Config {
    /// Parse a YAML document
    ///
    /// # Errors
    /// Returns `ApiError::Yaml` on malformed input
    pub fn from_yaml(input: &str) -> Result<Self, ApiError> {
        Ok(serde_yaml::from_str(input)?)
    }

    /// # Errors
    /// Returns `ApiError::Yaml` if serialization fails
    pub fn to_yaml(&self) -> Result<String, ApiError> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Environment named by `current_cluster`
    ///
    /// Environment names may contain dashes, so the longest environment name
    /// that prefixes `current_cluster` wins.
    ///
    /// # Errors
    /// Returns `ApiError::InvalidClusterRef` or `ApiError::NotFound`
    pub fn current_environment(&self) -> Result<&Environment, ApiError> {
        let (environment, _) = self.split_current()?;
        Ok(environment)
    }

    /// Cluster named by `current_cluster`
    ///
    /// # Errors
    /// Returns `ApiError::InvalidClusterRef` or `ApiError::NotFound`
    pub fn current_cluster(&self) -> Result<&Cluster, ApiError> {
        let (environment, cluster_name) = self.split_current()?;
        self.clusters
            .iter()
            .find(|c| c.environment == environment.name() && c.name() == cluster_name)
            .ok_or_else(|| ApiError::NotFound {
                kind: "Cluster",
                name: self.current_cluster.clone(),
            })
    }

    /// # Errors
    /// Returns `ApiError::NotFound` if no provider has that name
    pub fn provider(&self, name: &str) -> Result<&Provider, ApiError> {
        self.providers
            .iter()
            .find(|p| p.metadata.name == name)
            .ok_or_else(|| ApiError::NotFound {
                kind: "Provider",
                name: name.to_string(),
            })
    }

    /// Validate every document and cross reference
    ///
    /// # Errors
    /// Returns the first validation failure
    pub fn validate(&self) -> Result<(), ApiError> {
        for provider in &self.providers {
            provider.validate()?;
        }
        for environment in &self.environments {
            environment.validate()?;
            self.provider(&environment.provider)?;
        }
        for cluster in &self.clusters {
            cluster.validate()?;
            if !self
                .environments
                .iter()
                .any(|e| e.name() == cluster.environment)
            {
                return Err(ApiError::NotFound {
                    kind: "Environment",
                    name: cluster.environment.clone(),
                });
            }
        }
        Ok(())
    }

    fn split_current(&self) -> Result<(&Environment, &str), ApiError> {
        let current = self.current_cluster.as_str();
        self.environments
            .iter()
            .filter_map(|env| {
                current
                    .strip_prefix(env.name())
                    .and_then(|rest| rest.strip_prefix('-'))
                    .filter(|cluster| !cluster.is_empty())
                    .map(|cluster| (env, cluster))
            })
            .max_by_key(|(env, _)| env.name().len())
            .ok_or_else(|| ApiError::InvalidClusterRef(current.to_string()))
    }
}
