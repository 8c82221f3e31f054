//! The stack: unit of independent deployment
//!
//! A [`Stack`] owns its roles, its output variables and two hook chains.
//! Variables are reset at the start of every deploy and filled by the
//! pre-deploy hooks; dependent stacks read them only after the deploy
//! returned successfully.

use crate::error::{HookPhase, StackError};
use crate::hook::{Hook, HookChain, HookContext};
use crate::kind::AnyStack;
use crate::role::Role;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use strata_api::PoolType;

/// Output variables of a stack, consumed as inputs by dependent stacks
pub type Variables = BTreeMap<String, serde_json::Value>;

/// Fixed set of stack names, declared in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StackName {
    State,
    Network,
    Tools,
    Vault,
    Kubernetes,
}

impl StackName {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            StackName::State => "state",
            StackName::Network => "network",
            StackName::Tools => "tools",
            StackName::Vault => "vault",
            StackName::Kubernetes => "kubernetes",
        }
    }
}

impl fmt::Display for StackName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Deploy progress of a stack
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StackStatus {
    #[default]
    Pending,
    Deployed,
    Destroyed,
    Failed,
}

/// Orchestration unit
pub struct Stack {
    name: StackName,
    roles: BTreeMap<PoolType, Role>,
    variables: Variables,
    outputs: Variables,
    pre_deploy: HookChain,
    pre_destroy: HookChain,
    status: StackStatus,
}

impl Stack {
    #[must_use]
    pub fn new(name: StackName) -> Self {
        Self {
            name,
            roles: BTreeMap::new(),
            variables: Variables::new(),
            outputs: Variables::new(),
            pre_deploy: HookChain::new(),
            pre_destroy: HookChain::new(),
            status: StackStatus::Pending,
        }
    }

    /// Attach a role for a pool type
    ///
    /// # Errors
    /// Returns `StackError::InvalidRole` if the role has no name or prefix, or
    /// its name is already used by another pool of this stack
    pub fn with_role(mut self, pool: PoolType, role: Role) -> Result<Self, StackError> {
        if let Some(field) = role.missing_field() {
            return Err(StackError::InvalidRole {
                stack: self.name,
                reason: format!("role for pool {pool} has an empty {field}"),
            });
        }
        if self
            .roles
            .iter()
            .any(|(p, r)| *p != pool && r.name() == role.name())
        {
            return Err(StackError::InvalidRole {
                stack: self.name,
                reason: format!("role name {:?} used by more than one pool", role.name()),
            });
        }
        self.roles.insert(pool, role);
        Ok(self)
    }

    #[inline]
    #[must_use]
    pub fn name(&self) -> StackName {
        self.name
    }

    #[must_use]
    pub fn roles(&self) -> &BTreeMap<PoolType, Role> {
        &self.roles
    }

    #[must_use]
    pub fn role(&self, pool: PoolType) -> Option<&Role> {
        self.roles.get(&pool)
    }

    /// Output variables; empty until a deploy populated them
    #[must_use]
    pub fn variables(&self) -> &Variables {
        &self.variables
    }

    /// Infrastructure outputs loaded by [`crate::Terraform::output`]
    #[must_use]
    pub fn outputs(&self) -> &Variables {
        &self.outputs
    }

    pub fn outputs_mut(&mut self) -> &mut Variables {
        &mut self.outputs
    }

    #[inline]
    #[must_use]
    pub fn status(&self) -> StackStatus {
        self.status
    }

    pub fn register_pre_deploy_hook(&mut self, hook: impl Hook + 'static) {
        self.pre_deploy.push(hook);
    }

    pub fn register_pre_destroy_hook(&mut self, hook: impl Hook + 'static) {
        self.pre_destroy.push(hook);
    }

    #[must_use]
    pub fn pre_deploy_hooks(&self) -> &HookChain {
        &self.pre_deploy
    }

    #[must_use]
    pub fn pre_destroy_hooks(&self) -> &HookChain {
        &self.pre_destroy
    }

    /// Run the pre-deploy chain
    ///
    /// `prior` holds the stacks deployed before this one. Variables from a
    /// previous deploy are discarded first. Side effects of hooks that ran
    /// before a failure are kept.
    ///
    /// # Errors
    /// Returns `StackError::Hook` naming the first hook that failed
    pub async fn deploy(&mut self, prior: &mut [AnyStack]) -> Result<(), StackError> {
        self.variables.clear();
        self.run_chain(HookPhase::PreDeploy, prior).await
    }

    /// Run the pre-destroy chain
    ///
    /// # Errors
    /// Returns `StackError::Hook` naming the first hook that failed
    pub async fn destroy(&mut self, prior: &mut [AnyStack]) -> Result<(), StackError> {
        self.run_chain(HookPhase::PreDestroy, prior).await
    }

    #[tracing::instrument(skip_all, fields(stack = %self.name, phase = %phase))]
    async fn run_chain(
        &mut self,
        phase: HookPhase,
        prior: &mut [AnyStack],
    ) -> Result<(), StackError> {
        let chain = match phase {
            HookPhase::PreDeploy => &self.pre_deploy,
            HookPhase::PreDestroy => &self.pre_destroy,
        };
        tracing::info!(hooks = chain.len(), "running hook chain");

        let mut ctx = HookContext::new(self.name, &mut self.variables, prior);
        match chain.run(&mut ctx).await {
            Ok(()) => {
                self.status = match phase {
                    HookPhase::PreDeploy => StackStatus::Deployed,
                    HookPhase::PreDestroy => StackStatus::Destroyed,
                };
                Ok(())
            }
            Err((hook, source)) => {
                tracing::error!(hook = %hook, error = %source, "hook failed");
                self.status = StackStatus::Failed;
                Err(StackError::Hook {
                    stack: self.name,
                    phase,
                    hook,
                    source,
                })
            }
        }
    }
}

// Variables carry issued init tokens; only their keys are printed.
impl fmt::Debug for Stack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stack")
            .field("name", &self.name)
            .field("roles", &self.roles)
            .field("variables", &self.variables.keys().collect::<Vec<_>>())
            .field("outputs", &self.outputs.keys().collect::<Vec<_>>())
            .field("pre_deploy", &self.pre_deploy)
            .field("pre_destroy", &self.pre_destroy)
            .field("status", &self.status)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::hook::FnHook;
    use crate::role::Capability;

    #[test]
    fn names_sort_in_dependency_order() {
        let mut names = vec![StackName::Kubernetes, StackName::State, StackName::Vault];
        names.sort();
        assert_eq!(
            names,
            vec![StackName::State, StackName::Vault, StackName::Kubernetes]
        );
    }

    #[test]
    fn variables_empty_before_deploy() {
        let stack = Stack::new(StackName::Kubernetes);
        assert!(stack.variables().is_empty());
        assert_eq!(stack.status(), StackStatus::Pending);
    }

    #[test]
    fn rejects_unnamed_and_duplicate_roles() {
        let unnamed = Stack::new(StackName::Tools).with_role(PoolType::Bastion, Role::new(false, []));
        assert!(matches!(unnamed, Err(StackError::InvalidRole { .. })));

        let role = Role::new(false, [Capability::IamEc2Read])
            .with_name("bastion")
            .with_prefix("tools");
        let duplicate = Stack::new(StackName::Tools)
            .with_role(PoolType::Bastion, role.clone())
            .unwrap()
            .with_role(PoolType::Jenkins, role);
        assert!(matches!(duplicate, Err(StackError::InvalidRole { .. })));
    }

    #[tokio::test]
    async fn deploy_populates_and_resets_variables() {
        let mut stack = Stack::new(StackName::Network);
        stack.register_pre_deploy_hook(FnHook::new("publish", |ctx| {
            let next = ctx.variables().len();
            ctx.set_variable(format!("var_{next}"), "value");
            Ok(())
        }));

        stack.deploy(&mut []).await.unwrap();
        stack.deploy(&mut []).await.unwrap();

        assert_eq!(stack.variables().len(), 1);
        assert!(stack.variables().contains_key("var_0"));
        assert_eq!(stack.status(), StackStatus::Deployed);
    }

    #[tokio::test]
    async fn debug_output_hides_variable_values() {
        let mut stack = Stack::new(StackName::Kubernetes);
        stack.register_pre_deploy_hook(FnHook::new("issue", |ctx| {
            ctx.set_variable("vault_init_token_etcd", "s.Xq81secret");
            Ok(())
        }));
        stack.deploy(&mut []).await.unwrap();

        let printed = format!("{stack:?}");
        assert!(printed.contains("vault_init_token_etcd"));
        assert!(!printed.contains("s.Xq81secret"));
    }

    #[tokio::test]
    async fn failing_hook_is_named_in_error() {
        let mut stack = Stack::new(StackName::Network);
        stack.register_pre_destroy_hook(FnHook::new("check_empty", |_| {
            Err(HookError::Configuration("still in use".into()))
        }));

        let err = stack.destroy(&mut []).await.unwrap_err();
        assert_eq!(err.hook_name(), Some("check_empty"));
        assert!(err.to_string().contains("pre-destroy"));
        assert_eq!(stack.status(), StackStatus::Failed);
    }
}
