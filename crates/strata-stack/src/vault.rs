//! Vault stack and secret bootstrap
//!
//! Dependent stacks need short-lived, role-scoped init tokens so their
//! instances can authenticate against vault on first boot. Minting them
//! takes a tunnel through the bastion into the vault cluster:
//!
//! 1. load the vault stack's infrastructure outputs and check its kind
//! 2. open the tunnel (bounded by a timeout)
//! 3. authenticate with the root token and scope to the cluster
//! 4. `ensure` the cluster's policies and roles, collect the init tokens
//!
//! The tunnel lives in a [`TunnelGuard`]; it is stopped when the guard
//! drops, which covers success, every error and a cancelled future alike.
//! Tokens leave this module only as stack variables named
//! `vault_init_token_<role>`.

use crate::collaborator::{RootTokenSource, SecretClient, SecretService, Terraform, Tunnel};
use crate::error::{HookError, StackError};
use crate::hook::{Hook, HookContext};
use crate::role::{Capability, Role};
use crate::stack::{Stack, StackName, Variables};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use strata_api::PoolType;

/// Prefix of the variables carrying issued init tokens
pub const INIT_TOKEN_PREFIX: &str = "vault_init_token_";

/// Variable key for a role's init token
#[must_use]
pub fn init_token_key(role: &str) -> String {
    format!("{INIT_TOKEN_PREFIX}{role}")
}

/// Vault cluster coordinates, read from the vault stack's outputs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultOutputs {
    /// PEM encoded CA of the vault listeners
    pub ca: String,
    /// FQDNs of the vault instances
    pub instance_fqdns: Vec<String>,
    /// Bastion the tunnel hops through
    pub bastion: String,
}

impl VaultOutputs {
    /// # Errors
    /// Returns `HookError::Configuration` for a missing or ill-typed output
    pub fn from_outputs(outputs: &Variables) -> Result<Self, HookError> {
        let string = |key: &str| -> Result<String, HookError> {
            match outputs.get(key) {
                Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
                Some(other) => Err(HookError::Configuration(format!(
                    "vault output {key:?} must be a non-empty string, got {other}"
                ))),
                None => Err(HookError::Configuration(format!(
                    "vault output {key:?} is missing"
                ))),
            }
        };

        let instance_fqdns = match outputs.get("instance_fqdns") {
            Some(Value::Array(items)) if !items.is_empty() => items
                .iter()
                .map(|v| {
                    v.as_str().map(str::to_string).ok_or_else(|| {
                        HookError::Configuration(format!(
                            "vault output \"instance_fqdns\" must hold strings, got {v}"
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            Some(_) | None => {
                return Err(HookError::Configuration(
                    "vault output \"instance_fqdns\" must be a non-empty list".into(),
                ))
            }
        };

        Ok(Self {
            ca: string("vault_ca")?,
            instance_fqdns,
            bastion: string("bastion_instance")?,
        })
    }

    /// Tunnel target for logs and errors
    #[must_use]
    pub fn target(&self) -> String {
        format!("vault via {}", self.bastion)
    }
}

/// The stack running the vault cluster
#[derive(Debug)]
pub struct VaultStack {
    stack: Stack,
}

impl VaultStack {
    /// # Errors
    /// Propagates role validation failures
    pub fn new() -> Result<Self, StackError> {
        let vault_role = Role::new(true, [Capability::IamEc2Read])
            .with_name("vault")
            .with_prefix("vault");
        let stack = Stack::new(StackName::Vault).with_role(PoolType::Vault, vault_role)?;
        Ok(Self { stack })
    }

    #[must_use]
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    /// Typed view of the loaded outputs
    ///
    /// # Errors
    /// Returns `HookError::Configuration` if outputs are missing or malformed
    pub fn vault_outputs(&self) -> Result<VaultOutputs, HookError> {
        VaultOutputs::from_outputs(self.stack.outputs())
    }
}

/// Open tunnel; stopped exactly once when dropped
pub struct TunnelGuard {
    tunnel: Box<dyn Tunnel>,
    target: String,
}

impl TunnelGuard {
    /// Start `tunnel`, giving up after `timeout`
    ///
    /// The tunnel is stopped before an error is returned.
    ///
    /// # Errors
    /// Returns `HookError::Connection` if the tunnel fails or times out
    pub async fn open(
        tunnel: Box<dyn Tunnel>,
        target: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, HookError> {
        let mut guard = Self {
            tunnel,
            target: target.into(),
        };
        let started = tokio::time::timeout(timeout, guard.tunnel.start()).await;
        let reason = match started {
            Ok(Ok(())) => {
                tracing::debug!(tunnel = %guard.target, "tunnel established");
                return Ok(guard);
            }
            Ok(Err(e)) => e.to_string(),
            Err(_) => format!("timed out after {timeout:?}"),
        };
        Err(HookError::Connection {
            target: guard.target.clone(),
            reason,
        })
    }

    #[must_use]
    pub fn client(&self) -> Box<dyn SecretClient> {
        self.tunnel.client()
    }
}

impl Drop for TunnelGuard {
    fn drop(&mut self) {
        tracing::debug!(tunnel = %self.target, "stopping tunnel");
        self.tunnel.stop();
    }
}

/// Mint init tokens for `cluster_id` and return them as stack variables
///
/// # Errors
/// `Connection` when the tunnel cannot be opened, `Secret` when the root
/// token is unavailable or rejected or issuance fails
pub async fn issue_init_tokens(
    secrets: &dyn SecretService,
    root_token: &dyn RootTokenSource,
    outputs: &VaultOutputs,
    cluster_id: &str,
    timeout: Duration,
) -> Result<Variables, HookError> {
    let tunnel = TunnelGuard::open(secrets.tunnel(outputs), outputs.target(), timeout).await?;
    let mut client = tunnel.client();

    let token = root_token.vault_root_token().map_err(HookError::Secret)?;
    client.set_token(&token);
    client.set_cluster_id(cluster_id);
    client.ensure().await.map_err(HookError::Secret)?;

    let tokens = client
        .init_tokens()
        .into_iter()
        .map(|(role, token)| (init_token_key(&role), Value::String(token)))
        .collect();
    Ok(tokens)
}

/// Pre-deploy hook publishing vault init tokens on the running stack
pub struct EnsureVaultSetup {
    cluster_id: String,
    terraform: Arc<dyn Terraform>,
    secrets: Arc<dyn SecretService>,
    root_token: Arc<dyn RootTokenSource>,
    tunnel_timeout: Duration,
}

impl EnsureVaultSetup {
    pub const NAME: &'static str = "ensure_vault_setup";

    #[must_use]
    pub fn new(
        cluster_id: impl Into<String>,
        terraform: Arc<dyn Terraform>,
        secrets: Arc<dyn SecretService>,
        root_token: Arc<dyn RootTokenSource>,
        tunnel_timeout: Duration,
    ) -> Self {
        Self {
            cluster_id: cluster_id.into(),
            terraform,
            secrets,
            root_token,
            tunnel_timeout,
        }
    }
}

#[async_trait::async_trait]
impl Hook for EnsureVaultSetup {
    fn name(&self) -> &str {
        Self::NAME
    }

    async fn run(&self, ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        let vault = ctx.resolve(StackName::Vault)?;
        self.terraform.output(vault.base_mut()).await?;
        let outputs = vault.as_vault()?.vault_outputs()?;

        let tokens = issue_init_tokens(
            self.secrets.as_ref(),
            self.root_token.as_ref(),
            &outputs,
            &self.cluster_id,
            self.tunnel_timeout,
        )
        .await?;

        tracing::info!(
            stack = %ctx.stack_name(),
            cluster = %self.cluster_id,
            tokens = tokens.len(),
            "issued vault init tokens"
        );
        for (key, token) in tokens {
            ctx.set_variable(key, token);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborator::SecretError;
    use serde_json::json;

    fn outputs() -> Variables {
        let mut vars = Variables::new();
        vars.insert("vault_ca".into(), json!("-----BEGIN CERTIFICATE-----"));
        vars.insert(
            "instance_fqdns".into(),
            json!(["vault-1.prod.internal", "vault-2.prod.internal"]),
        );
        vars.insert("bastion_instance".into(), json!("bastion.prod.example.com"));
        vars
    }

    #[test]
    fn token_key_convention() {
        assert_eq!(init_token_key("etcd"), "vault_init_token_etcd");
    }

    #[test]
    fn parses_outputs() {
        let parsed = VaultOutputs::from_outputs(&outputs()).unwrap();
        assert_eq!(parsed.instance_fqdns.len(), 2);
        assert_eq!(parsed.bastion, "bastion.prod.example.com");
        assert_eq!(parsed.target(), "vault via bastion.prod.example.com");
    }

    #[test]
    fn missing_or_ill_typed_outputs() {
        let mut vars = outputs();
        vars.remove("vault_ca");
        assert!(matches!(
            VaultOutputs::from_outputs(&vars),
            Err(HookError::Configuration(_))
        ));

        let mut vars = outputs();
        vars.insert("instance_fqdns".into(), json!([1, 2]));
        assert!(matches!(
            VaultOutputs::from_outputs(&vars),
            Err(HookError::Configuration(_))
        ));

        let mut vars = outputs();
        vars.insert("instance_fqdns".into(), json!([]));
        assert!(VaultOutputs::from_outputs(&vars).is_err());
    }

    #[test]
    fn tunnel_error_maps_to_connection() {
        let err: HookError = SecretError::Tunnel("refused".into()).into();
        assert!(err.is_retryable());
        let err: HookError = SecretError::Issuance("denied".into()).into();
        assert!(matches!(err, HookError::Secret(_)));
    }

    #[test]
    fn vault_role_is_stateful() {
        let stack = VaultStack::new().unwrap();
        let role = stack.stack().role(PoolType::Vault).unwrap();
        assert!(role.stateful());
        assert_eq!(role.identity(), "vault-vault");
    }
}
