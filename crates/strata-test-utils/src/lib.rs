//! Testing utilities for the Strata workspace
//!
//! In-memory stand-ins for the infrastructure tool, the secret service, the
//! configuration packager and the node applier, plus fixtures for a sample
//! cluster.

#![allow(missing_docs)]

use parking_lot::Mutex;
use serde_json::json;
use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use strata_api::{Cluster, InstanceState, PoolType, ServerPool};
use strata_stack::{
    Collaborators, ConfigPackager, Deployment, Hook, HookContext, HookError, OrchestratorConfig,
    RootTokenSource, SecretClient, SecretError, SecretService, Stack, StackName, Terraform,
    TerraformError, Tunnel, Variables, VaultOutputs,
};
use strata_wing::{Applier, ApplyError, ApplyMode, ApplyReport, InstanceStore, Manifest};

/// Shared, ordered record of calls
#[derive(Debug, Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().push(entry.into());
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().clone()
    }
}

/// Hook that records its name and optionally fails
pub struct RecordingHook {
    name: String,
    log: CallLog,
    fail: bool,
}

impl RecordingHook {
    pub fn ok(name: &str, log: &CallLog) -> Self {
        Self {
            name: name.to_string(),
            log: log.clone(),
            fail: false,
        }
    }

    pub fn failing(name: &str, log: &CallLog) -> Self {
        Self {
            fail: true,
            ..Self::ok(name, log)
        }
    }
}

#[async_trait::async_trait]
impl Hook for RecordingHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, _ctx: &mut HookContext<'_>) -> Result<(), HookError> {
        self.log.push(self.name.clone());
        if self.fail {
            return Err(HookError::Configuration(format!("{} failed", self.name)));
        }
        Ok(())
    }
}

/// Outputs of a healthy vault stack
pub fn sample_vault_outputs() -> Variables {
    let mut vars = Variables::new();
    vars.insert("vault_ca".into(), json!("-----BEGIN CERTIFICATE-----\nMIIB"));
    vars.insert(
        "instance_fqdns".into(),
        json!(["vault-1.prod.internal", "vault-2.prod.internal"]),
    );
    vars.insert("bastion_instance".into(), json!("bastion.prod.example.com"));
    vars
}

/// Infrastructure tool double
///
/// `output` copies the configured outputs for the stack; every call is logged
/// as `"<action> <stack>"`.
#[derive(Default)]
pub struct FakeTerraform {
    outputs: Mutex<BTreeMap<StackName, Variables>>,
    fail_apply: Mutex<Option<StackName>>,
    pub calls: CallLog,
}

impl FakeTerraform {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Double with healthy vault outputs
    #[must_use]
    pub fn with_vault() -> Self {
        let terraform = Self::new();
        terraform.set_outputs(StackName::Vault, sample_vault_outputs());
        terraform
    }

    pub fn set_outputs(&self, stack: StackName, outputs: Variables) {
        self.outputs.lock().insert(stack, outputs);
    }

    pub fn fail_apply_of(&self, stack: StackName) {
        *self.fail_apply.lock() = Some(stack);
    }
}

#[async_trait::async_trait]
impl Terraform for FakeTerraform {
    async fn output(&self, stack: &mut Stack) -> Result<(), TerraformError> {
        self.calls.push(format!("output {}", stack.name()));
        let outputs = self.outputs.lock().get(&stack.name()).cloned();
        *stack.outputs_mut() = outputs.unwrap_or_default();
        Ok(())
    }

    async fn apply(&self, stack: &Stack, inputs: &Variables) -> Result<(), TerraformError> {
        self.calls
            .push(format!("apply {} {}", stack.name(), inputs.len()));
        if *self.fail_apply.lock() == Some(stack.name()) {
            return Err(TerraformError {
                stack: stack.name(),
                action: "apply",
                message: "exit status 1".into(),
            });
        }
        Ok(())
    }

    async fn destroy(&self, stack: &Stack) -> Result<(), TerraformError> {
        self.calls.push(format!("destroy {}", stack.name()));
        Ok(())
    }
}

/// How a fake tunnel responds to `start`
#[derive(Debug, Clone)]
pub enum TunnelBehavior {
    Connect,
    Refuse(String),
    /// Never completes
    Hang,
}

/// Counters shared by every tunnel a [`FakeSecretService`] hands out
#[derive(Debug, Default)]
pub struct TunnelStats {
    starts: AtomicUsize,
    stops: AtomicUsize,
}

impl TunnelStats {
    #[must_use]
    pub fn starts(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stops(&self) -> usize {
        self.stops.load(Ordering::SeqCst)
    }
}

/// What the client was configured with before `ensure`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientSeen {
    pub token: Option<String>,
    pub cluster_id: Option<String>,
    pub target: Option<String>,
}

/// Secret service double
pub struct FakeSecretService {
    behavior: TunnelBehavior,
    ensure_error: Option<SecretError>,
    tokens: BTreeMap<String, String>,
    pub stats: Arc<TunnelStats>,
    pub seen: Arc<Mutex<ClientSeen>>,
}

impl FakeSecretService {
    /// Connects and issues tokens for `etcd`, `master` and `worker`
    #[must_use]
    pub fn healthy() -> Self {
        let tokens = ["etcd", "master", "worker"]
            .into_iter()
            .map(|role| (role.to_string(), format!("token-{role}")))
            .collect();
        Self {
            behavior: TunnelBehavior::Connect,
            ensure_error: None,
            tokens,
            stats: Arc::default(),
            seen: Arc::default(),
        }
    }

    #[must_use]
    pub fn with_behavior(mut self, behavior: TunnelBehavior) -> Self {
        self.behavior = behavior;
        self
    }

    #[must_use]
    pub fn failing_ensure(mut self, error: SecretError) -> Self {
        self.ensure_error = Some(error);
        self
    }
}

impl SecretService for FakeSecretService {
    fn tunnel(&self, outputs: &VaultOutputs) -> Box<dyn Tunnel> {
        self.seen.lock().target = Some(outputs.bastion.clone());
        Box::new(FakeTunnel {
            behavior: self.behavior.clone(),
            ensure_error: self.ensure_error.clone(),
            tokens: self.tokens.clone(),
            stats: Arc::clone(&self.stats),
            seen: Arc::clone(&self.seen),
        })
    }
}

struct FakeTunnel {
    behavior: TunnelBehavior,
    ensure_error: Option<SecretError>,
    tokens: BTreeMap<String, String>,
    stats: Arc<TunnelStats>,
    seen: Arc<Mutex<ClientSeen>>,
}

#[async_trait::async_trait]
impl Tunnel for FakeTunnel {
    async fn start(&mut self) -> Result<(), SecretError> {
        self.stats.starts.fetch_add(1, Ordering::SeqCst);
        match &self.behavior {
            TunnelBehavior::Connect => Ok(()),
            TunnelBehavior::Refuse(reason) => Err(SecretError::Tunnel(reason.clone())),
            TunnelBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(())
            }
        }
    }

    fn stop(&mut self) {
        self.stats.stops.fetch_add(1, Ordering::SeqCst);
    }

    fn client(&self) -> Box<dyn SecretClient> {
        Box::new(FakeClient {
            ensure_error: self.ensure_error.clone(),
            tokens: self.tokens.clone(),
            seen: Arc::clone(&self.seen),
        })
    }
}

struct FakeClient {
    ensure_error: Option<SecretError>,
    tokens: BTreeMap<String, String>,
    seen: Arc<Mutex<ClientSeen>>,
}

#[async_trait::async_trait]
impl SecretClient for FakeClient {
    fn set_token(&mut self, token: &str) {
        self.seen.lock().token = Some(token.to_string());
    }

    fn set_cluster_id(&mut self, cluster_id: &str) {
        self.seen.lock().cluster_id = Some(cluster_id.to_string());
    }

    async fn ensure(&mut self) -> Result<(), SecretError> {
        match &self.ensure_error {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }

    fn init_tokens(&self) -> BTreeMap<String, String> {
        self.tokens.clone()
    }
}

/// Root token source returning a fixed token, or `Auth` when empty
pub struct FakeRootToken(pub Option<String>);

impl FakeRootToken {
    #[must_use]
    pub fn valid() -> Self {
        Self(Some("root-token".into()))
    }
}

impl RootTokenSource for FakeRootToken {
    fn vault_root_token(&self) -> Result<String, SecretError> {
        self.0
            .clone()
            .ok_or_else(|| SecretError::Auth("no root token available".into()))
    }
}

/// Packager writing fixed bytes
pub struct FakePackager(pub Vec<u8>);

impl Default for FakePackager {
    fn default() -> Self {
        Self(b"\x1f\x8bpuppet".to_vec())
    }
}

impl ConfigPackager for FakePackager {
    fn tar_gz(&self, writer: &mut dyn Write) -> std::io::Result<()> {
        writer.write_all(&self.0)
    }
}

/// `prod-alpha` with one pool of every kubernetes role
#[must_use]
pub fn sample_cluster() -> Cluster {
    Cluster::new("prod", "alpha")
        .with_pool(ServerPool::new(PoolType::Etcd, 3, 3))
        .with_pool(ServerPool::new(PoolType::Master, 3, 3))
        .with_pool(ServerPool::new(PoolType::Worker, 3, 10))
}

#[must_use]
pub fn collaborators(terraform: Arc<FakeTerraform>, secrets: Arc<FakeSecretService>) -> Collaborators {
    Collaborators {
        terraform,
        packager: Arc::new(FakePackager::default()),
        secrets,
        root_token: Arc::new(FakeRootToken::valid()),
    }
}

/// Deployment of [`sample_cluster`] rooted at `root`, with a short tunnel timeout
///
/// # Panics
/// If the sample configuration is invalid
#[must_use]
pub fn sample_deployment(root: &Path, collaborators: Collaborators) -> Deployment {
    let config = OrchestratorConfig::new().with_tunnel_timeout(Duration::from_secs(1));
    Deployment::new(config, &sample_cluster(), root, collaborators)
        .expect("sample deployment is valid")
}

/// Applier double replaying queued results, then succeeding
///
/// Optionally snapshots an instance record at the start of every apply, to
/// observe what was persisted before the apply ran.
#[derive(Default)]
pub struct ScriptedApplier {
    script: Mutex<VecDeque<Result<Vec<u8>, String>>>,
    calls: Mutex<Vec<(ApplyMode, String)>>,
    observe: Option<(Arc<dyn InstanceStore>, String)>,
    observed: Mutex<Vec<Option<InstanceState>>>,
}

impl ScriptedApplier {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn observing(mut self, store: Arc<dyn InstanceStore>, instance_id: &str) -> Self {
        self.observe = Some((store, instance_id.to_string()));
        self
    }

    pub fn push_ok(&self, output: &str) {
        self.script.lock().push_back(Ok(output.as_bytes().to_vec()));
    }

    /// Next apply exits with status 1 printing `output`
    pub fn push_failure(&self, output: &str) {
        self.script.lock().push_back(Err(output.to_string()));
    }

    /// `(mode, manifest hash)` of every apply, in order
    #[must_use]
    pub fn calls(&self) -> Vec<(ApplyMode, String)> {
        self.calls.lock().clone()
    }

    #[must_use]
    pub fn observed(&self) -> Vec<Option<InstanceState>> {
        self.observed.lock().clone()
    }
}

#[async_trait::async_trait]
impl Applier for ScriptedApplier {
    async fn apply(&self, manifest: &Manifest, mode: ApplyMode) -> Result<ApplyReport, ApplyError> {
        self.calls.lock().push((mode, manifest.hash().to_string()));
        if let Some((store, id)) = &self.observe {
            let snapshot = store.load(id).await.ok().flatten();
            self.observed.lock().push(snapshot);
        }
        let next = self.script.lock().pop_front();
        match next {
            None => Ok(ApplyReport::default()),
            Some(Ok(output)) => Ok(ApplyReport {
                exit_code: Some(0),
                output,
            }),
            Some(Err(output)) => Err(ApplyError::Exit {
                program: "scripted".into(),
                code: Some(1),
                output: output.into_bytes(),
            }),
        }
    }
}
