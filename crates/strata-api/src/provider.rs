//! Cloud provider documents

use crate::error::ApiError;
use crate::meta::{ObjectMeta, TypeMeta};
use serde::{Deserialize, Serialize};

/// Credentials and account settings for one cloud provider
///
/// Exactly one of `amazon`, `gcp`, `azure` is populated; use [`Provider::kind`]
/// to access it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Provider {
    #[serde(flatten)]
    pub type_meta: TypeMeta,
    #[serde(default)]
    pub metadata: ObjectMeta,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amazon: Option<ProviderAmazon>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gcp: Option<ProviderGcp>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub azure: Option<ProviderAzure>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderAmazon {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub vault_path: String,
    #[serde(rename = "allowedAccountIDs", default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_account_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub profile: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket_prefix: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub public_zone: String,
    #[serde(rename = "publicHostedZoneID", default, skip_serializing_if = "String::is_empty")]
    pub public_hosted_zone_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderGcp {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub project: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderAzure {
    #[serde(rename = "subscriptionID", default, skip_serializing_if = "String::is_empty")]
    pub subscription_id: String,
}

/// Borrowed view of the single populated provider variant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind<'a> {
    Amazon(&'a ProviderAmazon),
    Gcp(&'a ProviderGcp),
    Azure(&'a ProviderAzure),
}

impl Provider {
    #[must_use]
    pub fn amazon(name: &str, amazon: ProviderAmazon) -> Self {
        Self {
            type_meta: TypeMeta::new("Provider"),
            metadata: ObjectMeta::named(name),
            amazon: Some(amazon),
            ..Self::default()
        }
    }

    /// The populated variant
    ///
    /// # Errors
    /// Returns `ApiError::ProviderVariant` unless exactly one variant is set
    pub fn kind(&self) -> Result<ProviderKind<'_>, ApiError> {
        let found = usize::from(self.amazon.is_some())
            + usize::from(self.gcp.is_some())
            + usize::from(self.azure.is_some());
        let variant_error = || ApiError::ProviderVariant {
            name: self.metadata.name.clone(),
            found,
        };
        if found != 1 {
            return Err(variant_error());
        }
        match (&self.amazon, &self.gcp, &self.azure) {
            (Some(a), None, None) => Ok(ProviderKind::Amazon(a)),
            (None, Some(g), None) => Ok(ProviderKind::Gcp(g)),
            (None, None, Some(z)) => Ok(ProviderKind::Azure(z)),
            _ => Err(variant_error()),
        }
    }

    /// Check name and provider variant
    ///
    /// # Errors
    /// Returns the first validation failure
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.metadata.name.is_empty() {
            return Err(ApiError::MissingField {
                kind: "Provider",
                field: "metadata.name",
            });
        }
        self.kind().map(|_| ())
    }
}
