//! Stack manager
//!
//! Holds the stacks of one cluster in dependency order and drives them:
//! deploy runs a stack's pre-deploy chain, then applies its infrastructure
//! with the variables of every earlier stack merged with its own; destroy
//! runs the pre-destroy chain, then tears the infrastructure down.

use crate::collaborator::Terraform;
use crate::config::Deployment;
use crate::error::StackError;
use crate::kind::AnyStack;
use crate::kubernetes::KubernetesStack;
use crate::stack::{StackName, StackStatus, Variables};
use crate::vault::VaultStack;
use std::sync::Arc;

/// Ordered set of stacks sharing one infrastructure backend
pub struct StackManager {
    stacks: Vec<AnyStack>,
    terraform: Arc<dyn Terraform>,
}

impl StackManager {
    #[must_use]
    pub fn new(terraform: Arc<dyn Terraform>) -> Self {
        Self {
            stacks: Vec::new(),
            terraform,
        }
    }

    /// Every stack of a cluster
    ///
    /// # Errors
    /// Propagates role validation failures
    pub fn for_deployment(deployment: &Deployment) -> Result<Self, StackError> {
        let terraform = Arc::clone(&deployment.collaborators().terraform);
        Self::new(terraform)
            .with_stack(AnyStack::state())?
            .with_stack(AnyStack::network())?
            .with_stack(AnyStack::tools()?)?
            .with_stack(VaultStack::new()?.into())?
            .with_stack(KubernetesStack::new(deployment)?.into())
    }

    /// Register a stack, keeping dependency order
    ///
    /// # Errors
    /// Returns `StackError::Duplicate` if a stack of that name is registered
    pub fn with_stack(mut self, stack: AnyStack) -> Result<Self, StackError> {
        let name = stack.name();
        match self.stacks.binary_search_by_key(&name, AnyStack::name) {
            Ok(_) => Err(StackError::Duplicate(name)),
            Err(at) => {
                self.stacks.insert(at, stack);
                Ok(self)
            }
        }
    }

    /// Registered stack names, dependencies first
    pub fn names(&self) -> impl Iterator<Item = StackName> + '_ {
        self.stacks.iter().map(AnyStack::name)
    }

    #[must_use]
    pub fn stack(&self, name: StackName) -> Option<&AnyStack> {
        self.position(name).ok().map(|i| &self.stacks[i])
    }

    /// Output variables of a stack
    ///
    /// # Errors
    /// Returns `StackError::NotFound` for an unregistered stack
    pub fn variables(&self, name: StackName) -> Result<&Variables, StackError> {
        let index = self.position(name)?;
        Ok(self.stacks[index].variables())
    }

    #[must_use]
    pub fn statuses(&self) -> Vec<(StackName, StackStatus)> {
        self.stacks
            .iter()
            .map(|s| (s.name(), s.base().status()))
            .collect()
    }

    /// Variables handed to the infrastructure apply of `name`
    ///
    /// Earlier stacks first, so a stack's own variable shadows an inherited one.
    ///
    /// # Errors
    /// Returns `StackError::NotFound` for an unregistered stack
    pub fn inputs_for(&self, name: StackName) -> Result<Variables, StackError> {
        let index = self.position(name)?;
        Ok(merge_inputs(&self.stacks[..=index]))
    }

    /// Run the pre-deploy chain of `name`, then apply it
    ///
    /// # Errors
    /// The first hook or apply failure
    pub async fn deploy(&mut self, name: StackName) -> Result<(), StackError> {
        let index = self.position(name)?;
        let (prior, rest) = self.stacks.split_at_mut(index);
        let current = rest[0].base_mut();
        current.deploy(prior).await?;

        let inputs = self.inputs_for(name)?;
        let current = self.stacks[index].base();
        self.terraform.apply(current, &inputs).await?;
        tracing::info!(stack = %name, inputs = inputs.len(), "stack deployed");
        Ok(())
    }

    /// Deploy every stack in dependency order, stopping at the first failure
    ///
    /// # Errors
    /// The first failure
    pub async fn deploy_all(&mut self) -> Result<(), StackError> {
        let names: Vec<_> = self.names().collect();
        for name in names {
            self.deploy(name).await?;
        }
        Ok(())
    }

    /// Run the pre-destroy chain of `name`, then destroy it
    ///
    /// # Errors
    /// The first hook or destroy failure
    pub async fn destroy(&mut self, name: StackName) -> Result<(), StackError> {
        let index = self.position(name)?;
        let (prior, rest) = self.stacks.split_at_mut(index);
        let current = rest[0].base_mut();
        current.destroy(prior).await?;
        self.terraform.destroy(current).await?;
        tracing::info!(stack = %name, "stack destroyed");
        Ok(())
    }

    /// Destroy every stack, dependents first
    ///
    /// # Errors
    /// The first failure; stacks it depends on are left in place
    pub async fn destroy_all(&mut self) -> Result<(), StackError> {
        let names: Vec<_> = self.names().collect();
        for name in names.into_iter().rev() {
            self.destroy(name).await?;
        }
        Ok(())
    }

    fn position(&self, name: StackName) -> Result<usize, StackError> {
        self.stacks
            .binary_search_by_key(&name, AnyStack::name)
            .map_err(|_| StackError::NotFound(name))
    }
}

fn merge_inputs(stacks: &[AnyStack]) -> Variables {
    stacks
        .iter()
        .flat_map(|s| s.variables().iter())
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

impl std::fmt::Debug for StackManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StackManager")
            .field("stacks", &self.stacks)
            .finish_non_exhaustive()
    }
}
