//! Error types for the API crate

/// Errors raised while parsing or validating API documents
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Provider document has zero or more than one variant populated
    #[error("provider {name:?} must populate exactly one of amazon/gcp/azure, found {found}")]
    ProviderVariant { name: String, found: usize },

    /// A required field was empty
    #[error("{kind} is missing required field {field:?}")]
    MissingField { kind: &'static str, field: &'static str },

    /// Reference to a document that does not exist
    #[error("{kind} {name:?} not found")]
    NotFound { kind: &'static str, name: String },

    /// `currentCluster` is not of the form `<environment>-<cluster>`
    #[error("invalid current cluster reference {0:?}")]
    InvalidClusterRef(String),

    /// Unknown server pool type
    #[error("unknown pool type {0:?}")]
    UnknownPoolType(String),

    /// YAML serialization error
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}
