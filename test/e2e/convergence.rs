//! End-to-end convergence scenarios.
//!
//! Each scenario drives a [`ClusterVerifier`] against an in-memory cluster
//! that changes underneath it, the way a real cluster does while the machine
//! controller provisions infrastructure. Time is paused, so the multi-minute
//! deadlines run instantly and elapsed times are exact.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p mapicheck-e2e --test convergence
//! ```

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use mapicheck_client::{ClusterAccess, ClusterError};
use mapicheck_model::well_known::MACHINE_ANNOTATION;
use mapicheck_model::{
    ConditionStatus, GroupResource, LabelSelector, Machine, MachineSet, Node, Scale,
};
use mapicheck_testing::fixtures::{self, NAMESPACE};
use mapicheck_testing::FakeCluster;
use mapicheck_verify::{ClusterVerifier, VerifierConfig, VerifyError};
use rstest::rstest;
use tokio::time::Instant;
use tracing_subscriber::EnvFilter;

const SECOND: Duration = Duration::from_secs(1);

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn verifier(cluster: Arc<dyn ClusterAccess>) -> ClusterVerifier {
    ClusterVerifier::new(cluster, VerifierConfig::default())
}

/// Wraps a cluster and records when the first machine list happened.
///
/// Machines are only listed by the final consistency stage, so this marks
/// the moment the workflow got there.
struct Recording {
    inner: Arc<FakeCluster>,
    started: Instant,
    first_machine_list: Mutex<Option<Duration>>,
}

impl Recording {
    fn new(inner: Arc<FakeCluster>) -> Self {
        Self {
            inner,
            started: Instant::now(),
            first_machine_list: Mutex::new(None),
        }
    }

    fn first_machine_list(&self) -> Option<Duration> {
        *self.first_machine_list.lock().unwrap()
    }
}

#[async_trait]
impl ClusterAccess for Recording {
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, ClusterError> {
        self.inner.list_nodes(selector).await
    }

    async fn get_node(&self, name: &str) -> Result<Node, ClusterError> {
        self.inner.get_node(name).await
    }

    async fn list_machines(&self, namespace: &str) -> Result<Vec<Machine>, ClusterError> {
        {
            let mut first = self.first_machine_list.lock().unwrap();
            if first.is_none() {
                *first = Some(self.started.elapsed());
            }
        }
        self.inner.list_machines(namespace).await
    }

    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Machine, ClusterError> {
        self.inner.get_machine(namespace, name).await
    }

    async fn delete_machine(&self, namespace: &str, name: &str) -> Result<(), ClusterError> {
        self.inner.delete_machine(namespace, name).await
    }

    async fn list_machine_sets(&self, namespace: &str) -> Result<Vec<MachineSet>, ClusterError> {
        self.inner.list_machine_sets(namespace).await
    }

    async fn get_scale(
        &self,
        resource: &GroupResource,
        namespace: &str,
        name: &str,
    ) -> Result<Scale, ClusterError> {
        self.inner.get_scale(resource, namespace, name).await
    }

    async fn update_scale(
        &self,
        resource: &GroupResource,
        scale: &Scale,
    ) -> Result<Scale, ClusterError> {
        self.inner.update_scale(resource, scale).await
    }
}

// =============================================================================
// Cluster size workflow
// =============================================================================

#[tokio::test(start_paused = true)]
async fn growing_cluster_converges_with_stages_in_order() {
    init_tracing();
    let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 1));
    cluster.add_machine_set(fixtures::machine_set(NAMESPACE, "workers", 3));

    // machine-1 joins fully formed. machine-2's node joins late, not ready
    // and cordoned, then recovers one condition at a time.
    let background = cluster.clone();
    tokio::spawn(async move {
        tokio::time::sleep(5 * SECOND).await;
        background.add_linked_pair(NAMESPACE, "machine-1");

        let (machine, mut node) = fixtures::linked_pair(NAMESPACE, "machine-2");
        tokio::time::sleep(7 * SECOND).await;
        background.add_machine(machine);

        node.conditions[0].status = ConditionStatus::False;
        node.unschedulable = true;
        tokio::time::sleep(6 * SECOND).await;
        background.add_node(node);

        tokio::time::sleep(Duration::from_millis(4500)).await;
        background.update_node("machine-2-node", |n| {
            n.conditions[0].status = ConditionStatus::True;
        });

        tokio::time::sleep(3 * SECOND).await;
        background.update_node("machine-2-node", |n| n.unschedulable = false);
    });

    let recording = Arc::new(Recording::new(cluster.clone()));
    let verifier = verifier(recording.clone());
    let started = Instant::now();

    let size_elapsed = verifier.wait_for_cluster_size(3).await.unwrap();

    // Size checks at 0, 5, 10, 15 and 20s; the third node shows up at 18s.
    assert_eq!(size_elapsed, 20 * SECOND);
    assert_eq!(cluster.calls().list_machine_sets, 5);
    // Ready at 22.5s (seen at 23s), schedulable at 25.5s (seen at 26s), and
    // only then are machines listed for the consistency stage.
    assert_eq!(recording.first_machine_list(), Some(26 * SECOND));
    assert_eq!(started.elapsed(), 26 * SECOND);
}

#[tokio::test(start_paused = true)]
async fn cluster_that_never_grows_times_out_at_long_deadline() {
    init_tracing();
    let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 3));
    let started = Instant::now();

    let err = verifier(cluster.clone())
        .wait_for_cluster_size(5)
        .await
        .unwrap_err();

    assert!(err.is_timeout(), "expected timeout, got {err}");
    assert!(matches!(err, VerifyError::ClusterSize { target: 5, .. }));
    assert_eq!(started.elapsed(), 15 * 60 * SECOND);
    assert!(err.to_string().contains("3 of 5 nodes"));
    // Later stages never started.
    assert_eq!(cluster.calls().list_machines, 0);
}

#[tokio::test(start_paused = true)]
async fn scale_then_wait_follows_the_controller() {
    init_tracing();
    let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 0));
    let set = fixtures::machine_set(NAMESPACE, "workers", 2);
    cluster.add_machine_set(set.clone());
    for name in ["workers-0", "workers-1"] {
        let mut machine = fixtures::owned_machine(&set, name);
        let mut node = fixtures::ready_node(&format!("{name}-node"));
        fixtures::link(&mut machine, &mut node);
        cluster.add_machine(machine);
        cluster.add_node(node);
    }

    // A stand-in machine controller: every 4s it adds one machine with its
    // node until the set matches its desired replicas.
    let controller = cluster.clone();
    let owner = set.clone();
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(4 * SECOND).await;
            let desired = controller
                .scale(NAMESPACE, "workers")
                .map(|s| s.replicas)
                .unwrap_or(0);
            let current = controller.node_count() as i32;
            if current < desired {
                let name = format!("workers-{current}");
                let mut machine = fixtures::owned_machine(&owner, &name);
                let mut node = fixtures::ready_node(&format!("{name}-node"));
                fixtures::link(&mut machine, &mut node);
                tracing::info!(machine = %name, "Controller provisioned machine");
                controller.add_machine(machine);
                controller.add_node(node);
            }
        }
    });

    let verifier = verifier(cluster.clone());
    let scale = verifier.scale_machine_set("workers", 4).await.unwrap();
    assert_eq!(scale.replicas, 4);

    let elapsed = verifier.wait_for_cluster_size(4).await.unwrap();
    // Nodes 3 and 4 arrive at 4s and 8s; the size check at 10s sees both.
    assert_eq!(elapsed, 10 * SECOND);

    let machines = verifier.machines_for_machine_set(&set).await.unwrap();
    assert_eq!(machines.len(), 4);
    let nodes = verifier.nodes_for_machine_set(&set).await.unwrap();
    assert!(verifier.nodes_are_ready(&nodes));
}

// =============================================================================
// Scale
// =============================================================================

#[tokio::test]
async fn scale_reads_and_writes_the_scale_once() {
    let cluster = Arc::new(FakeCluster::new());
    let mut set = fixtures::machine_set(NAMESPACE, "workers", 2);
    set.ready_replicas = 2;
    cluster.add_machine_set(set);
    let read = cluster.scale(NAMESPACE, "workers").unwrap();

    verifier(cluster.clone())
        .scale_machine_set("workers", 4)
        .await
        .unwrap();

    let calls = cluster.calls();
    assert_eq!((calls.get_scale, calls.update_scale), (1, 1));

    let written = cluster.scale_updates();
    assert_eq!(written.len(), 1);
    assert_eq!(written[0].replicas, 4);
    assert_eq!(written[0].observed_replicas, read.observed_replicas);
    assert_eq!(written[0].selector, read.selector);
    assert_eq!(written[0].resource_version, read.resource_version);
    assert_eq!(cluster.scale(NAMESPACE, "workers").unwrap().replicas, 4);
}

#[tokio::test]
async fn concurrent_scale_write_is_rejected() {
    let cluster = Arc::new(FakeCluster::new());
    cluster.add_machine_set(fixtures::machine_set(NAMESPACE, "workers", 2));
    let gr = VerifierConfig::default().machine_set_resource;

    // Someone else bumps the scale between our read and write.
    let stale = cluster.get_scale(&gr, NAMESPACE, "workers").await.unwrap();
    cluster.update_scale(&gr, &stale.with_replicas(3)).await.unwrap();
    let err = cluster
        .update_scale(&gr, &stale.with_replicas(4))
        .await
        .unwrap_err();

    assert!(err.is_conflict());
    assert_eq!(cluster.scale(NAMESPACE, "workers").unwrap().replicas, 3);
}

// =============================================================================
// Consistency
// =============================================================================

#[tokio::test(start_paused = true)]
async fn converged_cluster_is_consistent_within_one_interval() {
    let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 4));
    let verifier = verifier(cluster.clone());
    let started = Instant::now();

    assert!(verifier.check_one_machine_per_node(NAMESPACE).await);
    assert!(started.elapsed() < verifier.config().timings.one_machine_per_node.interval);
}

#[rstest]
#[case::points_at_missing_machine("machine-7")]
#[case::points_at_sibling("machine-0")]
#[tokio::test(start_paused = true)]
async fn single_bad_annotation_fails_at_timeout(#[case] target: &str) {
    let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 3));
    cluster.update_node("machine-2-node", |n| {
        n.annotations
            .insert(MACHINE_ANNOTATION.to_string(), format!("{NAMESPACE}/{target}"));
    });
    let verifier = verifier(cluster.clone());
    let started = Instant::now();

    assert!(!verifier.check_one_machine_per_node(NAMESPACE).await);
    assert_eq!(started.elapsed(), verifier.config().timings.one_machine_per_node.timeout);
}

#[tokio::test(start_paused = true)]
async fn consistency_check_is_idempotent() {
    let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 3));
    let verifier = verifier(cluster.clone());

    assert!(verifier.check_one_machine_per_node(NAMESPACE).await);
    let after_first = cluster.calls();
    assert!(verifier.check_one_machine_per_node(NAMESPACE).await);
    let after_second = cluster.calls();

    assert_eq!(after_second.list_machines, 2 * after_first.list_machines);
    assert_eq!(after_second.delete_machine, 0);
    assert_eq!(after_second.update_scale, 0);
    assert_eq!(cluster.node_count(), 3);
}

// =============================================================================
// Health
// =============================================================================

#[rstest]
#[case::first(0)]
#[case::last(2)]
fn one_unready_node_fails_the_gate(#[case] position: usize) {
    let verifier = verifier(Arc::new(FakeCluster::new()));
    let mut nodes: Vec<Node> = (0..3)
        .map(|i| fixtures::ready_node(&format!("node-{i}")))
        .collect();
    nodes[position].conditions[0].status = ConditionStatus::False;

    assert!(!verifier.nodes_are_ready(&nodes));
}

#[test]
fn only_node_unready_fails_the_gate() {
    let verifier = verifier(Arc::new(FakeCluster::new()));
    let node = fixtures::node_with_ready("solo", ConditionStatus::Unknown);
    assert!(!verifier.nodes_are_ready(&[node]));
}

#[tokio::test(start_paused = true)]
async fn deleted_machine_leaves_orphan_node() {
    let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 2));
    let verifier = verifier(cluster.clone());

    let worker = verifier.get_worker_node().await.unwrap();
    let machine = verifier.reader().machine_for_node(&worker).await.unwrap();
    verifier.delete_machine(&machine).await.unwrap();

    assert!(cluster.machine(NAMESPACE, &machine.name).is_none());
    // The node is still there, so machines and nodes no longer correspond.
    let err = verifier
        .wait_one_machine_per_node(NAMESPACE)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("1 machines but 2 nodes"));
}
