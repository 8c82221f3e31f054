//! Closed set of stack kinds
//!
//! Cross-stack references resolve to an [`AnyStack`]. Code that needs a
//! particular kind goes through the matching accessor, which fails with
//! `HookError::TypeMismatch` rather than guessing.

use crate::error::{HookError, StackError};
use crate::kubernetes::KubernetesStack;
use crate::role::{Capability, Role};
use crate::stack::{Stack, StackName, Variables};
use crate::vault::VaultStack;
use strata_api::PoolType;

/// Any stack the manager can hold
#[derive(Debug)]
pub enum AnyStack {
    /// Remote state buckets and locks
    State(Stack),
    Network(Stack),
    /// Bastion and CI instances
    Tools(Stack),
    Vault(VaultStack),
    Kubernetes(KubernetesStack),
}

impl AnyStack {
    /// Kind label used in type mismatch reports
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            AnyStack::State(_) => "state",
            AnyStack::Network(_) => "network",
            AnyStack::Tools(_) => "tools",
            AnyStack::Vault(_) => "vault",
            AnyStack::Kubernetes(_) => "kubernetes",
        }
    }

    #[must_use]
    pub fn name(&self) -> StackName {
        self.base().name()
    }

    #[must_use]
    pub fn base(&self) -> &Stack {
        match self {
            AnyStack::State(s) | AnyStack::Network(s) | AnyStack::Tools(s) => s,
            AnyStack::Vault(v) => v.stack(),
            AnyStack::Kubernetes(k) => k.stack(),
        }
    }

    pub fn base_mut(&mut self) -> &mut Stack {
        match self {
            AnyStack::State(s) | AnyStack::Network(s) | AnyStack::Tools(s) => s,
            AnyStack::Vault(v) => v.stack_mut(),
            AnyStack::Kubernetes(k) => k.stack_mut(),
        }
    }

    #[must_use]
    pub fn variables(&self) -> &Variables {
        self.base().variables()
    }

    /// # Errors
    /// Returns `HookError::TypeMismatch` unless this is a vault stack
    pub fn as_vault(&self) -> Result<&VaultStack, HookError> {
        match self {
            AnyStack::Vault(v) => Ok(v),
            other => Err(other.mismatch("vault")),
        }
    }

    /// # Errors
    /// Returns `HookError::TypeMismatch` unless this is a kubernetes stack
    pub fn as_kubernetes(&self) -> Result<&KubernetesStack, HookError> {
        match self {
            AnyStack::Kubernetes(k) => Ok(k),
            other => Err(other.mismatch("kubernetes")),
        }
    }

    fn mismatch(&self, expected: &'static str) -> HookError {
        HookError::TypeMismatch {
            stack: self.name(),
            expected,
            found: self.kind(),
        }
    }

    /// Remote state stack
    #[must_use]
    pub fn state() -> Self {
        AnyStack::State(Stack::new(StackName::State))
    }

    #[must_use]
    pub fn network() -> Self {
        AnyStack::Network(Stack::new(StackName::Network))
    }

    /// # Errors
    /// Propagates role validation failures
    pub fn tools() -> Result<Self, StackError> {
        let bastion = Role::new(false, [Capability::IamEc2Read])
            .with_name("bastion")
            .with_prefix("tools");
        let jenkins = Role::new(true, []).with_name("jenkins").with_prefix("tools");
        let stack = Stack::new(StackName::Tools)
            .with_role(PoolType::Bastion, bastion)?
            .with_role(PoolType::Jenkins, jenkins)?;
        Ok(AnyStack::Tools(stack))
    }
}

impl From<VaultStack> for AnyStack {
    fn from(value: VaultStack) -> Self {
        AnyStack::Vault(value)
    }
}

impl From<KubernetesStack> for AnyStack {
    fn from(value: KubernetesStack) -> Self {
        AnyStack::Kubernetes(value)
    }
}
