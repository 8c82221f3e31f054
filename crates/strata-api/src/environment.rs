//! Environment and image documents

use crate::error::ApiError;
use crate::meta::{ObjectMeta, TypeMeta};
use serde::{Deserialize, Serialize};

/// A set of clusters sharing a provider, network and vault
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Environment {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,

    /// Name of the `Provider` document backing this environment
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub provider: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub contact: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ssh: Option<Ssh>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub private_zone: String,
}

/// SSH access settings for the bastion
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ssh {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub user: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub admin_cidrs: Vec<String>,
}

/// Base machine image produced for an environment
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Image {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub base_image: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub location: String,
}

impl Environment {
    #[must_use]
    pub fn new(name: &str, provider: &str, location: &str) -> Self {
        Self {
            type_meta: TypeMeta::new("Environment"),
            metadata: ObjectMeta::named(name),
            provider: provider.to_string(),
            location: location.to_string(),
            ..Self::default()
        }
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// # Errors
    /// Returns `ApiError::MissingField` for an empty name, provider or location
    pub fn validate(&self) -> Result<(), ApiError> {
        let missing = |field| ApiError::MissingField {
            kind: "Environment",
            field,
        };
        if self.metadata.name.is_empty() {
            return Err(missing("metadata.name"));
        }
        if self.provider.is_empty() {
            return Err(missing("provider"));
        }
        if self.location.is_empty() {
            return Err(missing("location"));
        }
        Ok(())
    }
}
