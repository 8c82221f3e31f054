//! Strata Stack - lifecycle orchestration for cluster stacks
//!
//! A cluster is deployed as a fixed sequence of stacks
//! (`state`, `network`, `tools`, `vault`, `kubernetes`). Each stack:
//! - Declares roles with their cloud capabilities
//! - Runs an ordered, fail-fast chain of pre-deploy or pre-destroy hooks
//! - Publishes output variables consumed by the stacks after it
//!
//! The kubernetes stack bootstraps its secrets from the vault stack through
//! a tunnel that is always torn down, and ships a packaged configuration
//! artifact alongside its infrastructure.
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_stack::{Deployment, StackManager};
//!
//! # async fn example(deployment: Deployment) -> Result<(), strata_stack::StackError> {
//! let mut manager = StackManager::for_deployment(&deployment)?;
//! manager.deploy_all().await?;
//! # Ok(())
//! # }
//! ```

#![allow(missing_docs)]

pub mod artifact;
pub mod collaborator;
pub mod config;
pub mod error;
pub mod hook;
pub mod kind;
pub mod kubernetes;
pub mod manager;
pub mod role;
pub mod stack;
pub mod vault;

pub use artifact::{EmptyPuppetTarGz, EnsurePuppetTarGz};
pub use collaborator::{
    ConfigPackager, RootTokenSource, SecretClient, SecretError, SecretService, Terraform,
    TerraformError, Tunnel,
};
pub use config::{Collaborators, Deployment, OrchestratorConfig, DEFAULT_ARTIFACT_PATH};
pub use error::{HookError, HookPhase, IoOp, StackError};
pub use hook::{FnHook, Hook, HookChain, HookContext};
pub use kind::AnyStack;
pub use kubernetes::KubernetesStack;
pub use manager::StackManager;
pub use role::{Capability, Role};
pub use stack::{Stack, StackName, StackStatus, Variables};
pub use vault::{
    init_token_key, issue_init_tokens, EnsureVaultSetup, TunnelGuard, VaultOutputs, VaultStack,
    INIT_TOKEN_PREFIX,
};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for driving stacks
    pub use crate::{
        AnyStack, Collaborators, Deployment, Hook, HookContext, HookError, OrchestratorConfig,
        Stack, StackError, StackManager, StackName, Variables,
    };
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
