//! Interfaces to the systems the orchestrator drives but does not implement
//!
//! - [`Terraform`]: loads a stack's infrastructure outputs, applies and destroys it
//! - [`ConfigPackager`]: streams the configuration-management archive
//! - [`SecretService`] / [`Tunnel`] / [`SecretClient`]: the remote vault
//! - [`RootTokenSource`]: the environment's vault root credential

use crate::stack::{Stack, StackName, Variables};
use crate::vault::VaultOutputs;
use std::collections::BTreeMap;
use std::io::Write;

/// Infrastructure tool failure
#[derive(Debug, thiserror::Error)]
#[error("terraform {action} failed for stack {stack}: {message}")]
pub struct TerraformError {
    pub stack: StackName,
    pub action: &'static str,
    pub message: String,
}

/// Secret service failure
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SecretError {
    /// Tunnel could not be established
    #[error("tunnel failed: {0}")]
    Tunnel(String),

    /// Root credential rejected
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Policies or tokens could not be created
    #[error("token issuance failed: {0}")]
    Issuance(String),
}

/// Infrastructure state access
#[async_trait::async_trait]
pub trait Terraform: Send + Sync {
    /// Load the stack's outputs into [`Stack::outputs_mut`]
    async fn output(&self, stack: &mut Stack) -> Result<(), TerraformError>;

    /// Apply the stack with the given input variables
    async fn apply(&self, stack: &Stack, inputs: &Variables) -> Result<(), TerraformError>;

    /// Tear the stack's infrastructure down
    async fn destroy(&self, stack: &Stack) -> Result<(), TerraformError>;
}

/// Produces the compressed configuration-management archive
pub trait ConfigPackager: Send + Sync {
    /// Write a gzip'd tarball into `writer`
    ///
    /// # Errors
    /// Any I/O error raised while writing
    fn tar_gz(&self, writer: &mut dyn Write) -> std::io::Result<()>;
}

/// Source of the environment's vault root token
pub trait RootTokenSource: Send + Sync {
    /// # Errors
    /// Returns `SecretError::Auth` when no token is available
    fn vault_root_token(&self) -> Result<String, SecretError>;
}

/// Remote secret service reachable through a tunnel
pub trait SecretService: Send + Sync {
    /// Prepare a tunnel to the vault cluster; nothing is opened yet
    fn tunnel(&self, outputs: &VaultOutputs) -> Box<dyn Tunnel>;
}

/// Secured connection to the secret service
#[async_trait::async_trait]
pub trait Tunnel: Send {
    /// Establish the connection
    async fn start(&mut self) -> Result<(), SecretError>;

    /// Tear the connection down; also called after a failed or abandoned `start`
    fn stop(&mut self);

    /// Client bound to this tunnel
    fn client(&self) -> Box<dyn SecretClient>;
}

/// Client for minting per-role initialization tokens
#[async_trait::async_trait]
pub trait SecretClient: Send {
    fn set_token(&mut self, token: &str);

    /// Scope all subsequent calls to this cluster
    fn set_cluster_id(&mut self, cluster_id: &str);

    /// Create the policies, roles and init tokens expected for the cluster
    async fn ensure(&mut self) -> Result<(), SecretError>;

    /// Role name to issued init token
    fn init_tokens(&self) -> BTreeMap<String, String>;
}
