//! Machine/node correspondence.
//!
//! At convergence every machine in the namespace is backed by exactly one
//! node and the link holds in both directions:
//!
//! - the machine's `node_ref` names a node seen in the same read, and
//! - that node's machine annotation equals the machine's `namespace/name`.
//!
//! Count equality alone is not enough. A single mismatched pair fails the
//! whole iteration.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use mapicheck_model::{Machine, Node};
use mapicheck_poll::{PollError, PollPolicy, PollStatus, Poller};
use tracing::{debug, info, instrument, warn};

use crate::error::ReadError;
use crate::reader::{ClusterSnapshot, ResourceReader};

/// Result of comparing one machine list against one node list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Correspondence {
    /// Every machine is linked to its node both ways.
    Consistent { pairs: usize },

    /// Machine and node counts differ. Expected while scaling.
    CountMismatch { machines: usize, nodes: usize },

    /// A node carries no machine annotation.
    MissingAnnotation { node: String },

    /// A machine is not backed by a node yet.
    NoNodeRef { machine: String },

    /// The node a machine points at does not point back at it.
    ///
    /// `annotation` is `None` when the node was not in the node list.
    Mismatch {
        machine: String,
        node: String,
        annotation: Option<String>,
    },
}

impl Correspondence {
    pub fn is_consistent(&self) -> bool {
        matches!(self, Self::Consistent { .. })
    }
}

impl fmt::Display for Correspondence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Consistent { pairs } => write!(f, "{pairs} machine/node pairs consistent"),
            Self::CountMismatch { machines, nodes } => {
                write!(f, "{machines} machines but {nodes} nodes")
            }
            Self::MissingAnnotation { node } => {
                write!(f, "node {node:?} has no machine annotation")
            }
            Self::NoNodeRef { machine } => write!(f, "machine {machine:?} has no node reference"),
            Self::Mismatch {
                machine,
                node,
                annotation: Some(annotation),
            } => write!(
                f,
                "machine {machine:?} points at node {node:?} which is annotated with {annotation:?}"
            ),
            Self::Mismatch {
                machine,
                node,
                annotation: None,
            } => write!(f, "machine {machine:?} points at missing node {node:?}"),
        }
    }
}

/// Compare machines against nodes observed in the same iteration.
///
/// Comparison is an exact string match between the node annotation and the
/// machine's `namespace/name`.
pub fn evaluate_correspondence(
    annotation_key: &str,
    machines: &[Machine],
    nodes: &[Node],
) -> Correspondence {
    if machines.len() != nodes.len() {
        return Correspondence::CountMismatch {
            machines: machines.len(),
            nodes: nodes.len(),
        };
    }

    let mut node_to_machine: HashMap<&str, &str> = HashMap::with_capacity(nodes.len());
    for node in nodes {
        let Some(annotation) = node.annotation(annotation_key) else {
            return Correspondence::MissingAnnotation {
                node: node.name.clone(),
            };
        };
        node_to_machine.insert(node.name.as_str(), annotation);
    }

    for machine in machines {
        let Some(node_ref) = &machine.node_ref else {
            return Correspondence::NoNodeRef {
                machine: machine.name.clone(),
            };
        };

        let expected = machine.key().to_string();
        let annotation = node_to_machine.get(node_ref.name.as_str()).copied();
        if annotation != Some(expected.as_str()) {
            return Correspondence::Mismatch {
                machine: machine.name.clone(),
                node: node_ref.name.clone(),
                annotation: annotation.map(str::to_string),
            };
        }
        debug!(machine = %machine.name, node = %node_ref.name, "Machine and node are linked");
    }

    Correspondence::Consistent {
        pairs: machines.len(),
    }
}

/// Polls the one-machine-per-node invariant.
#[derive(Clone)]
pub struct ConsistencyChecker {
    reader: ResourceReader,
    poller: Poller,
    policy: PollPolicy,
    annotation_key: String,
}

impl ConsistencyChecker {
    pub fn new(
        reader: ResourceReader,
        poller: Poller,
        policy: PollPolicy,
        annotation_key: impl Into<String>,
    ) -> Self {
        Self {
            reader,
            poller,
            policy,
            annotation_key: annotation_key.into(),
        }
    }

    /// Read machines in `namespace` plus every node and compare them once.
    pub async fn observe(&self, namespace: &str) -> Result<Correspondence, ReadError> {
        let ClusterSnapshot { machines, nodes } = self.reader.snapshot(namespace).await?;
        Ok(evaluate_correspondence(&self.annotation_key, &machines, &nodes))
    }

    /// Poll until every machine in `namespace` is linked to exactly one node.
    ///
    /// Read failures and mismatches are retried; the last one is reported in
    /// the timeout error.
    #[instrument(skip(self))]
    pub async fn wait_one_machine_per_node(
        &self,
        namespace: &str,
    ) -> Result<Duration, PollError<ReadError>> {
        self.poller
            .poll("one machine per node", self.policy, move || async move {
                match self.observe(namespace).await {
                    Ok(Correspondence::Consistent { pairs }) => {
                        info!(namespace, pairs, "One machine per node");
                        PollStatus::Satisfied
                    }
                    Ok(other) => {
                        info!(namespace, reason = %other, "Machines and nodes do not correspond yet");
                        PollStatus::waiting(other.to_string())
                    }
                    Err(e) => {
                        warn!(namespace, error = %e, "Failed to read machines and nodes");
                        PollStatus::waiting(e.to_string())
                    }
                }
            })
            .await
    }

    /// Like [`Self::wait_one_machine_per_node`], reduced to a yes/no answer.
    pub async fn check_one_machine_per_node(&self, namespace: &str) -> bool {
        match self.wait_one_machine_per_node(namespace).await {
            Ok(_) => true,
            Err(e) => {
                warn!(namespace, error = %e, "One machine per node check failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use mapicheck_model::well_known::MACHINE_ANNOTATION;
    use mapicheck_testing::fixtures::{self, NAMESPACE};
    use mapicheck_testing::FakeCluster;
    use tokio::time::Instant;

    use super::*;
    use crate::config::VerifierConfig;

    const SECOND: Duration = Duration::from_secs(1);

    fn checker(cluster: &Arc<FakeCluster>) -> ConsistencyChecker {
        let config = VerifierConfig::default();
        ConsistencyChecker::new(
            ResourceReader::new(cluster.clone(), &config),
            Poller::new(),
            config.timings.one_machine_per_node,
            config.machine_annotation_key,
        )
    }

    fn pairs(n: usize) -> (Vec<Machine>, Vec<Node>) {
        (0..n)
            .map(|i| fixtures::linked_pair(NAMESPACE, &format!("m-{i}")))
            .unzip()
    }

    #[test]
    fn test_linked_pairs_are_consistent() {
        let (machines, nodes) = pairs(3);
        assert_eq!(
            evaluate_correspondence(MACHINE_ANNOTATION, &machines, &nodes),
            Correspondence::Consistent { pairs: 3 }
        );
    }

    #[test]
    fn test_empty_cluster_is_consistent() {
        assert!(evaluate_correspondence(MACHINE_ANNOTATION, &[], &[]).is_consistent());
    }

    #[test]
    fn test_count_mismatch() {
        let (machines, mut nodes) = pairs(2);
        nodes.pop();
        assert_eq!(
            evaluate_correspondence(MACHINE_ANNOTATION, &machines, &nodes),
            Correspondence::CountMismatch {
                machines: 2,
                nodes: 1
            }
        );
    }

    #[test]
    fn test_node_without_annotation() {
        let (machines, mut nodes) = pairs(2);
        nodes[1].annotations.clear();
        assert!(matches!(
            evaluate_correspondence(MACHINE_ANNOTATION, &machines, &nodes),
            Correspondence::MissingAnnotation { node } if node == "m-1-node"
        ));
    }

    #[test]
    fn test_machine_without_node_ref() {
        let (mut machines, nodes) = pairs(2);
        machines[0].node_ref = None;
        assert!(matches!(
            evaluate_correspondence(MACHINE_ANNOTATION, &machines, &nodes),
            Correspondence::NoNodeRef { machine } if machine == "m-0"
        ));
    }

    #[test]
    fn test_swapped_annotations_are_rejected() {
        let (machines, mut nodes) = pairs(2);
        let first = nodes[0].annotations[MACHINE_ANNOTATION].clone();
        let second = nodes[1].annotations[MACHINE_ANNOTATION].clone();
        nodes[0].annotations.insert(MACHINE_ANNOTATION.to_string(), second);
        nodes[1].annotations.insert(MACHINE_ANNOTATION.to_string(), first);

        let result = evaluate_correspondence(MACHINE_ANNOTATION, &machines, &nodes);
        assert_eq!(
            result,
            Correspondence::Mismatch {
                machine: "m-0".to_string(),
                node: "m-0-node".to_string(),
                annotation: Some(format!("{NAMESPACE}/m-1")),
            }
        );
    }

    #[test]
    fn test_node_ref_to_unlisted_node() {
        let (mut machines, nodes) = pairs(1);
        machines[0].node_ref.as_mut().unwrap().name = "gone".to_string();
        let result = evaluate_correspondence(MACHINE_ANNOTATION, &machines, &nodes);
        assert!(matches!(result, Correspondence::Mismatch { annotation: None, .. }));
        assert_eq!(result.to_string(), "machine \"m-0\" points at missing node \"gone\"");
    }

    #[test]
    fn test_annotation_comparison_is_exact() {
        let (machines, mut nodes) = pairs(1);
        nodes[0]
            .annotations
            .insert(MACHINE_ANNOTATION.to_string(), "m-0".to_string());
        assert!(!evaluate_correspondence(MACHINE_ANNOTATION, &machines, &nodes).is_consistent());
    }

    #[tokio::test(start_paused = true)]
    async fn test_converged_cluster_passes_on_first_check() {
        let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 3));
        let checker = checker(&cluster);
        let started = Instant::now();

        assert!(checker.check_one_machine_per_node(NAMESPACE).await);
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(cluster.calls().list_machines, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_check_is_idempotent() {
        let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 2));
        let checker = checker(&cluster);

        assert!(checker.check_one_machine_per_node(NAMESPACE).await);
        assert!(checker.check_one_machine_per_node(NAMESPACE).await);

        let calls = cluster.calls();
        assert_eq!(calls.delete_machine, 0);
        assert_eq!(calls.update_scale, 0);
        assert_eq!(cluster.node_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mismatch_fails_exactly_at_timeout() {
        let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 2));
        cluster.update_node("machine-1-node", |n| {
            n.annotations.insert(
                MACHINE_ANNOTATION.to_string(),
                format!("{NAMESPACE}/machine-9"),
            );
        });
        let checker = checker(&cluster);
        let started = Instant::now();

        let err = checker
            .wait_one_machine_per_node(NAMESPACE)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert_eq!(started.elapsed(), 180 * SECOND);
        assert!(err.to_string().contains("machine-9"));
        // One check every 5s, including one at the deadline.
        assert_eq!(cluster.calls().list_machines, 37);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_read_failures_are_retried() {
        let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 2));
        cluster.fail_next_machine_lists(2);
        let checker = checker(&cluster);

        let elapsed = checker
            .wait_one_machine_per_node(NAMESPACE)
            .await
            .unwrap();
        assert_eq!(elapsed, 10 * SECOND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_once_node_joins() {
        let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 1));
        let (machine, node) = fixtures::linked_pair(NAMESPACE, "late");
        cluster.add_machine(machine);
        let checker = checker(&cluster);

        let background = cluster.clone();
        tokio::spawn(async move {
            tokio::time::sleep(12 * SECOND).await;
            background.add_node(node);
        });

        let elapsed = checker
            .wait_one_machine_per_node(NAMESPACE)
            .await
            .unwrap();
        assert_eq!(elapsed, 15 * SECOND);
    }

    #[tokio::test]
    async fn test_observe_reports_drift_in_the_live_cluster() {
        let cluster = Arc::new(FakeCluster::converged(NAMESPACE, 2));
        let checker = checker(&cluster);

        cluster.update_machine(NAMESPACE, "machine-0", |m| m.node_ref = None);
        assert!(matches!(
            checker.observe(NAMESPACE).await.unwrap(),
            Correspondence::NoNodeRef { machine } if machine == "machine-0"
        ));

        assert!(cluster.remove_node("machine-1-node").is_some());
        assert_eq!(
            checker.observe(NAMESPACE).await.unwrap(),
            Correspondence::CountMismatch {
                machines: 2,
                nodes: 1
            }
        );
    }
}
