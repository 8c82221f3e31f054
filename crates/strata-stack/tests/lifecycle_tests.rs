use pretty_assertions::assert_eq;
use std::path::Path;
use std::sync::Arc;
use strata_stack::{
    AnyStack, EmptyPuppetTarGz, EnsurePuppetTarGz, EnsureVaultSetup, HookError, HookPhase,
    KubernetesStack, Stack, StackError, StackManager, StackName, StackStatus,
};
use strata_test_utils::{
    collaborators, sample_deployment, CallLog, FakeSecretService, FakeTerraform, RecordingHook,
    TunnelBehavior,
};

struct Harness {
    _dir: tempfile::TempDir,
    terraform: Arc<FakeTerraform>,
    secrets: Arc<FakeSecretService>,
    deployment: strata_stack::Deployment,
}

fn harness(secrets: FakeSecretService) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let terraform = Arc::new(FakeTerraform::with_vault());
    let secrets = Arc::new(secrets);
    let deployment = sample_deployment(
        dir.path(),
        collaborators(Arc::clone(&terraform), Arc::clone(&secrets)),
    );
    std::fs::create_dir_all(deployment.artifact_path().parent().unwrap()).unwrap();
    Harness {
        _dir: dir,
        terraform,
        secrets,
        deployment,
    }
}

fn artifact_len(path: &Path) -> Option<u64> {
    std::fs::metadata(path).ok().map(|m| m.len())
}

#[tokio::test]
async fn hooks_run_in_registration_order_and_stop_at_first_failure() {
    let log = CallLog::default();
    let mut stack = Stack::new(StackName::Network);
    stack.register_pre_deploy_hook(RecordingHook::ok("h1", &log));
    stack.register_pre_deploy_hook(RecordingHook::failing("h2", &log));
    stack.register_pre_deploy_hook(RecordingHook::ok("h3", &log));

    let err = stack.deploy(&mut []).await.unwrap_err();

    assert_eq!(log.entries(), vec!["h1", "h2"]);
    match err {
        StackError::Hook {
            stack, phase, hook, ..
        } => {
            assert_eq!(stack, StackName::Network);
            assert_eq!(phase, HookPhase::PreDeploy);
            assert_eq!(hook, "h2");
        }
        other => panic!("expected hook failure, got {other:?}"),
    }
}

#[tokio::test]
async fn kubernetes_hooks_are_registered_in_order() {
    let h = harness(FakeSecretService::healthy());
    let stack = KubernetesStack::new(&h.deployment).unwrap();

    let deploy: Vec<_> = stack.stack().pre_deploy_hooks().names().collect();
    assert_eq!(deploy, vec![EnsureVaultSetup::NAME, EnsurePuppetTarGz::NAME]);
    let destroy: Vec<_> = stack.stack().pre_destroy_hooks().names().collect();
    assert_eq!(destroy, vec![EmptyPuppetTarGz::NAME]);
    assert_eq!(stack.artifact_path(), h.deployment.artifact_path());
}

#[tokio::test]
async fn kubernetes_roles_and_capabilities() {
    use strata_api::PoolType;
    use strata_stack::Capability;

    let h = harness(FakeSecretService::healthy());
    let stack = KubernetesStack::new(&h.deployment).unwrap();
    let roles = stack.stack().roles();

    let master = &roles[&PoolType::Master];
    assert_eq!(master.identity(), "kubernetes-master");
    assert!(!master.stateful());
    assert!(master.has(Capability::ElbApi));
    assert!(master.has(Capability::IamElbFull));

    let worker = &roles[&PoolType::Worker];
    assert!(worker.has(Capability::ElbIngress));
    assert!(worker.has(Capability::IamEc2ModifyInstanceAttributes));
    assert!(!worker.has(Capability::IamEc2Full));

    let etcd = &roles[&PoolType::Etcd];
    assert!(etcd.stateful());
    assert_eq!(etcd.capabilities().count(), 0);
}

#[tokio::test]
async fn deploy_all_publishes_tokens_and_writes_artifact() {
    let h = harness(FakeSecretService::healthy());
    let mut manager = StackManager::for_deployment(&h.deployment).unwrap();

    manager.deploy_all().await.unwrap();

    let vars = manager.variables(StackName::Kubernetes).unwrap();
    let keys: Vec<_> = vars.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec![
            "vault_init_token_etcd",
            "vault_init_token_master",
            "vault_init_token_worker"
        ]
    );
    assert_eq!(
        h.terraform.calls.entries(),
        vec![
            "apply state 0",
            "apply network 0",
            "apply tools 0",
            "apply vault 0",
            "output vault",
            "apply kubernetes 3",
        ]
    );
    assert!(artifact_len(&h.deployment.artifact_path()).unwrap() > 0);
    assert_eq!(h.secrets.seen.lock().cluster_id.as_deref(), Some("prod-alpha"));
    assert_eq!(h.secrets.stats.stops(), 1);
    assert!(manager
        .statuses()
        .iter()
        .all(|(_, status)| *status == StackStatus::Deployed));
}

#[tokio::test]
async fn manager_debug_never_prints_issued_tokens() {
    let h = harness(FakeSecretService::healthy());
    let mut manager = StackManager::for_deployment(&h.deployment).unwrap();
    manager.deploy_all().await.unwrap();

    let printed = format!("{manager:?}");

    assert!(printed.contains("vault_init_token_master"));
    for role in ["etcd", "master", "worker"] {
        assert!(!printed.contains(&format!("token-{role}")));
    }
    assert!(!printed.contains("BEGIN CERTIFICATE"));
}

#[tokio::test]
async fn vault_failure_stops_chain_before_artifact() {
    let h = harness(
        FakeSecretService::healthy().with_behavior(TunnelBehavior::Refuse("no route".into())),
    );
    let mut manager = StackManager::for_deployment(&h.deployment).unwrap();

    let err = manager.deploy_all().await.unwrap_err();

    assert_eq!(err.hook_name(), Some(EnsureVaultSetup::NAME));
    assert!(err.is_retryable());
    assert_eq!(artifact_len(&h.deployment.artifact_path()), None);
    assert!(manager.variables(StackName::Kubernetes).unwrap().is_empty());
    assert!(!h
        .terraform
        .calls
        .entries()
        .iter()
        .any(|c| c.starts_with("apply kubernetes")));
    assert_eq!(h.secrets.stats.stops(), 1);
}

#[tokio::test]
async fn vault_reference_of_wrong_kind_is_rejected() {
    let h = harness(FakeSecretService::healthy());
    let mut manager = StackManager::new(h.terraform.clone())
        .with_stack(AnyStack::Tools(Stack::new(StackName::Vault)))
        .unwrap()
        .with_stack(KubernetesStack::new(&h.deployment).unwrap().into())
        .unwrap();

    let err = manager.deploy(StackName::Kubernetes).await.unwrap_err();

    match err {
        StackError::Hook {
            source: HookError::TypeMismatch { expected, found, .. },
            ..
        } => {
            assert_eq!(expected, "vault");
            assert_eq!(found, "tools");
        }
        other => panic!("expected type mismatch, got {other:?}"),
    }
    assert_eq!(h.secrets.stats.starts(), 0);
}

#[tokio::test]
async fn missing_vault_stack_is_a_configuration_error() {
    let h = harness(FakeSecretService::healthy());
    let mut manager = StackManager::new(h.terraform.clone())
        .with_stack(KubernetesStack::new(&h.deployment).unwrap().into())
        .unwrap();

    let err = manager.deploy(StackName::Kubernetes).await.unwrap_err();
    assert!(matches!(
        err,
        StackError::Hook {
            source: HookError::Configuration(_),
            ..
        }
    ));
}

#[tokio::test]
async fn apply_failure_is_returned_unmodified() {
    let h = harness(FakeSecretService::healthy());
    h.terraform.fail_apply_of(StackName::Network);
    let mut manager = StackManager::for_deployment(&h.deployment).unwrap();

    let err = manager.deploy_all().await.unwrap_err();

    assert!(matches!(err, StackError::Terraform(ref e) if e.stack == StackName::Network));
    assert_eq!(
        h.terraform.calls.entries(),
        vec!["apply state 0", "apply network 0"]
    );
}

#[tokio::test]
async fn destroy_is_idempotent_and_reversed() {
    let h = harness(FakeSecretService::healthy());
    let mut manager = StackManager::for_deployment(&h.deployment).unwrap();
    manager.deploy_all().await.unwrap();

    manager.destroy_all().await.unwrap();
    manager.destroy_all().await.unwrap();

    assert_eq!(artifact_len(&h.deployment.artifact_path()), Some(0));
    let destroys: Vec<_> = h
        .terraform
        .calls
        .entries()
        .into_iter()
        .filter(|c| c.starts_with("destroy"))
        .collect();
    assert_eq!(
        &destroys[..5],
        &[
            "destroy kubernetes",
            "destroy vault",
            "destroy tools",
            "destroy network",
            "destroy state",
        ]
    );
    assert_eq!(destroys.len(), 10);
}

#[tokio::test]
async fn redeploy_replaces_tokens() {
    let h = harness(FakeSecretService::healthy());
    let mut manager = StackManager::for_deployment(&h.deployment).unwrap();

    manager.deploy_all().await.unwrap();
    manager.deploy(StackName::Kubernetes).await.unwrap();

    assert_eq!(manager.variables(StackName::Kubernetes).unwrap().len(), 3);
    assert_eq!(h.secrets.stats.starts(), 2);
    assert_eq!(h.secrets.stats.stops(), 2);
}
