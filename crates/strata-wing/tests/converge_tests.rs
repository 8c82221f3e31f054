use pretty_assertions::assert_eq;
use std::sync::Arc;
use strata_api::{InstanceState, InstanceStateStatusManifest, ManifestState, PoolType};
use strata_test_utils::ScriptedApplier;
use strata_wing::{
    ApplyMode, ConvergeEngine, FileStore, InstanceStore, Manifest, MemoryStore, Outcome,
    WingError,
};

const INSTANCE: &str = "i-0abc";

struct Node {
    store: Arc<MemoryStore>,
    applier: Arc<ScriptedApplier>,
    engine: ConvergeEngine,
    dir: tempfile::TempDir,
}

fn node() -> Node {
    let store = Arc::new(MemoryStore::new());
    let applier = Arc::new(ScriptedApplier::new().observing(store.clone(), INSTANCE));
    let dir = tempfile::tempdir().unwrap();
    let engine = ConvergeEngine::new(
        INSTANCE,
        PoolType::Master,
        store.clone(),
        applier.clone(),
        dir.path().join("dry-run"),
    );
    Node {
        store,
        applier,
        engine,
        dir,
    }
}

async fn converged_on_h1(store: &MemoryStore) {
    let mut record = InstanceState::new(INSTANCE, PoolType::Master);
    record.spec.converge_hash = hash_of("h1");
    record.status.converge = Some(InstanceStateStatusManifest::new(
        ManifestState::Converged,
        hash_of("h1"),
    ));
    store.save(&record).await.unwrap();
}

async fn stored(store: &MemoryStore) -> InstanceState {
    store.load(INSTANCE).await.unwrap().unwrap()
}

fn manifest(tag: &str) -> Manifest {
    Manifest::new(format!("# manifest {tag}"))
}

fn hash_of(tag: &str) -> String {
    manifest(tag).hash().to_string()
}

#[tokio::test]
async fn same_hash_performs_no_apply() {
    let n = node();
    converged_on_h1(&n.store).await;

    let outcome = n.engine.converge(&manifest("h1")).await.unwrap();

    assert!(matches!(outcome, Outcome::Unchanged));
    assert!(n.applier.calls().is_empty());
    let record = stored(&n.store).await;
    assert_eq!(
        record.status.converge,
        Some(InstanceStateStatusManifest::new(
            ManifestState::Converged,
            hash_of("h1")
        ))
    );
}

#[tokio::test]
async fn new_hash_passes_through_converging_to_converged() {
    let n = node();
    converged_on_h1(&n.store).await;

    let outcome = n.engine.converge(&manifest("h2")).await.unwrap();

    assert!(matches!(outcome, Outcome::Converged));
    let during = n.applier.observed()[0].clone().unwrap();
    assert_eq!(
        during.status.converge,
        Some(InstanceStateStatusManifest::new(
            ManifestState::Converging,
            hash_of("h2")
        ))
    );
    let record = stored(&n.store).await;
    assert_eq!(record.spec.converge_hash, hash_of("h2"));
    assert_eq!(
        record.status.converge,
        Some(InstanceStateStatusManifest::new(
            ManifestState::Converged,
            hash_of("h2")
        ))
    );
    assert!(!record.needs_converge());
}

#[tokio::test]
async fn failed_apply_is_recorded_not_propagated() {
    let n = node();
    converged_on_h1(&n.store).await;
    n.applier.push_failure("Error: Could not find class kubernetes::master");

    let outcome = n.engine.converge(&manifest("h2")).await.unwrap();

    assert!(outcome.is_failed());
    let record = stored(&n.store).await;
    assert_eq!(
        record.status.converge,
        Some(InstanceStateStatusManifest::new(
            ManifestState::Error,
            hash_of("h2")
        ))
    );
    assert!(record.needs_converge());
}

#[tokio::test]
async fn error_state_is_retried_with_same_hash() {
    let n = node();
    n.applier.push_failure("transient");

    assert!(n.engine.converge(&manifest("h3")).await.unwrap().is_failed());
    assert!(matches!(
        n.engine.converge(&manifest("h3")).await.unwrap(),
        Outcome::Converged
    ));
    assert!(matches!(
        n.engine.converge(&manifest("h3")).await.unwrap(),
        Outcome::Unchanged
    ));
    assert_eq!(n.applier.calls().len(), 2);
}

#[tokio::test]
async fn first_report_creates_record() {
    let n = node();
    assert!(n.engine.record().await.unwrap().is_none());

    n.engine.converge(&Manifest::new("include etcd")).await.unwrap();

    let record = stored(&n.store).await;
    assert_eq!(record.instance_id, INSTANCE);
    assert_eq!(record.instance_pool, PoolType::Master);
    assert_eq!(n.applier.observed()[0].as_ref().unwrap().status.dry_run, None);
}

#[tokio::test]
async fn dry_run_never_touches_converge_track() {
    let n = node();
    converged_on_h1(&n.store).await;
    n.applier.push_ok("Notice: would have changed 3 resources");

    let outcome = n.engine.dry_run(&manifest("h2")).await.unwrap();

    assert!(matches!(outcome, Outcome::Converged));
    assert_eq!(n.applier.calls(), vec![(ApplyMode::DryRun, hash_of("h2"))]);
    let record = stored(&n.store).await;
    assert_eq!(
        record.status.converge,
        Some(InstanceStateStatusManifest::new(
            ManifestState::Converged,
            hash_of("h1")
        ))
    );
    assert_eq!(record.spec.converge_hash, hash_of("h1"));
    assert_eq!(
        record.status.dry_run,
        Some(InstanceStateStatusManifest::new(
            ManifestState::Converged,
            hash_of("h2")
        ))
    );
    assert_eq!(record.spec.dry_run_hash, hash_of("h2"));

    let path = n.engine.dry_run_path(manifest("h2").hash());
    assert_eq!(record.spec.dry_run_path, path.display().to_string());
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "Notice: would have changed 3 resources"
    );
    assert!(path.starts_with(n.dir.path()));
}

#[tokio::test]
async fn failed_dry_run_keeps_its_output() {
    let n = node();
    n.applier.push_failure("Error: syntax error at line 3");

    let outcome = n.engine.dry_run(&manifest("h4")).await.unwrap();

    assert!(outcome.is_failed());
    let record = stored(&n.store).await;
    assert_eq!(record.dry_run_state(), Some(ManifestState::Error));
    assert_eq!(record.converge_state(), None);
    let log = std::fs::read_to_string(n.engine.dry_run_path(manifest("h4").hash())).unwrap();
    assert!(log.contains("syntax error"));

    assert!(matches!(
        n.engine.dry_run(&manifest("h4")).await.unwrap(),
        Outcome::Converged
    ));
    assert!(matches!(
        n.engine.dry_run(&manifest("h4")).await.unwrap(),
        Outcome::Unchanged
    ));
}

#[tokio::test]
async fn only_latest_dry_run_log_is_kept() {
    let n = node();
    n.applier.push_ok("first");
    n.applier.push_ok("second");

    n.engine.dry_run(&manifest("h6")).await.unwrap();
    n.engine.dry_run(&manifest("h7")).await.unwrap();

    let logs: Vec<_> = std::fs::read_dir(n.dir.path().join("dry-run"))
        .unwrap()
        .map(|e| e.unwrap().path())
        .collect();
    let latest = n.engine.dry_run_path(manifest("h7").hash());
    assert_eq!(logs, vec![latest.clone()]);
    assert_eq!(std::fs::read_to_string(&latest).unwrap(), "second");
    assert_eq!(
        stored(&n.store).await.spec.dry_run_path,
        latest.display().to_string()
    );
}

#[tokio::test]
async fn dry_run_path_stays_inside_its_directory() {
    let n = node();
    let path = n.engine.dry_run_path(Manifest::new("../../etc/passwd").hash());
    assert_eq!(path.parent(), Some(n.dir.path().join("dry-run").as_path()));
    assert_eq!(path.extension().and_then(|e| e.to_str()), Some("log"));
}

#[tokio::test]
async fn unwritable_dry_run_dir_is_reported() {
    let store = Arc::new(MemoryStore::new());
    let applier = Arc::new(ScriptedApplier::new());
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();
    let engine = ConvergeEngine::new(
        INSTANCE,
        PoolType::Worker,
        store.clone(),
        applier.clone(),
        blocker.join("dry-run"),
    );
    applier.push_ok("output");

    let err = engine.dry_run(&manifest("h5")).await.unwrap_err();

    assert!(matches!(err, WingError::Io { .. }));
    let record = stored(&store).await;
    assert_eq!(record.dry_run_state(), Some(ManifestState::Error));
}

#[tokio::test]
async fn file_store_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let applier = Arc::new(ScriptedApplier::new());
    let engine = |store: FileStore| {
        ConvergeEngine::new(
            INSTANCE,
            PoolType::Etcd,
            Arc::new(store),
            applier.clone(),
            dir.path().join("dry-run"),
        )
    };

    let first = engine(FileStore::new(dir.path().join("state")));
    first.converge(&manifest("h1")).await.unwrap();

    let second = engine(FileStore::new(dir.path().join("state")));
    assert!(matches!(
        second.converge(&manifest("h1")).await.unwrap(),
        Outcome::Unchanged
    ));
    assert_eq!(applier.calls().len(), 1);
}
