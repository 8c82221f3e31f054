//! Cluster documents

use crate::error::ApiError;
use crate::meta::{ObjectMeta, TypeMeta};
use crate::pool::PoolType;
use serde::{Deserialize, Serialize};

/// A Kubernetes cluster inside an environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Owning environment name
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub environment: String,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub server_pools: Vec<ServerPool>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub zones: Vec<String>,
}

/// A group of identical instances
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerPool {
    #[serde(rename = "type")]
    pub pool_type: PoolType,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub size: String,
    #[serde(default)]
    pub min_count: u32,
    #[serde(default)]
    pub max_count: u32,
}

impl Cluster {
    #[must_use]
    pub fn new(environment: &str, name: &str) -> Self {
        Self {
            type_meta: TypeMeta::new("Cluster"),
            metadata: ObjectMeta::named(name),
            environment: environment.to_string(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_pool(mut self, pool: ServerPool) -> Self {
        self.server_pools.push(pool);
        self
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// `<environment>-<cluster>`, the identifier that scopes secrets and state
    #[must_use]
    pub fn context_name(&self) -> String {
        format!("{}-{}", self.environment, self.metadata.name)
    }

    #[must_use]
    pub fn pool(&self, pool_type: PoolType) -> Option<&ServerPool> {
        self.server_pools.iter().find(|p| p.pool_type == pool_type)
    }

    /// # Errors
    /// Returns `ApiError::MissingField` for an empty name or environment
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.metadata.name.is_empty() {
            return Err(ApiError::MissingField {
                kind: "Cluster",
                field: "metadata.name",
            });
        }
        if self.environment.is_empty() {
            return Err(ApiError::MissingField {
                kind: "Cluster",
                field: "environment",
            });
        }
        Ok(())
    }
}

impl ServerPool {
    #[must_use]
    pub fn new(pool_type: PoolType, min_count: u32, max_count: u32) -> Self {
        Self {
            pool_type,
            image: String::new(),
            size: String::new(),
            min_count,
            max_count,
        }
    }
}
