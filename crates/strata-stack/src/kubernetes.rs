//! Kubernetes stack

use crate::artifact::{EmptyPuppetTarGz, EnsurePuppetTarGz};
use crate::config::Deployment;
use crate::error::StackError;
use crate::role::{Capability, Role};
use crate::stack::{Stack, StackName, Variables};
use crate::vault::EnsureVaultSetup;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use strata_api::PoolType;

const ROLE_PREFIX: &str = "kubernetes";

/// Control and data plane of one cluster
///
/// Pre-deploy: mint vault init tokens, then write the packaged configuration.
/// Pre-destroy: truncate the packaged configuration.
#[derive(Debug)]
pub struct KubernetesStack {
    stack: Stack,
    artifact_path: PathBuf,
}

impl KubernetesStack {
    /// # Errors
    /// Propagates role validation failures
    pub fn new(deployment: &Deployment) -> Result<Self, StackError> {
        let mut stack = Self::roles(Stack::new(StackName::Kubernetes))?;
        let artifact_path = deployment.artifact_path();
        let collaborators = deployment.collaborators();

        stack.register_pre_deploy_hook(EnsureVaultSetup::new(
            deployment.context_name(),
            Arc::clone(&collaborators.terraform),
            Arc::clone(&collaborators.secrets),
            Arc::clone(&collaborators.root_token),
            deployment.config().tunnel_timeout(),
        ));
        stack.register_pre_deploy_hook(EnsurePuppetTarGz::new(
            &artifact_path,
            Arc::clone(&collaborators.packager),
        ));
        stack.register_pre_destroy_hook(EmptyPuppetTarGz::new(&artifact_path));

        Ok(Self {
            stack,
            artifact_path,
        })
    }

    fn roles(stack: Stack) -> Result<Stack, StackError> {
        let master = Role::new(
            false,
            [
                Capability::ElbApi,
                Capability::IamEc2Full,
                Capability::IamElbFull,
            ],
        )
        .with_name("master")
        .with_prefix(ROLE_PREFIX);

        let worker = Role::new(
            false,
            [
                Capability::ElbIngress,
                Capability::IamEc2Read,
                Capability::IamEc2ModifyInstanceAttributes,
            ],
        )
        .with_name("worker")
        .with_prefix(ROLE_PREFIX);

        let etcd = Role::new(true, []).with_name("etcd").with_prefix(ROLE_PREFIX);

        stack
            .with_role(PoolType::Etcd, etcd)?
            .with_role(PoolType::Master, master)?
            .with_role(PoolType::Worker, worker)
    }

    #[must_use]
    pub fn stack(&self) -> &Stack {
        &self.stack
    }

    pub fn stack_mut(&mut self) -> &mut Stack {
        &mut self.stack
    }

    /// Issued init tokens once deployed, empty before
    #[must_use]
    pub fn variables(&self) -> &Variables {
        self.stack.variables()
    }

    #[must_use]
    pub fn artifact_path(&self) -> &Path {
        &self.artifact_path
    }
}
