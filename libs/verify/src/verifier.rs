//! The verifier facade.

use std::sync::Arc;
use std::time::Duration;

use mapicheck_client::ClusterAccess;
use mapicheck_model::{LabelSelector, Machine, MachineSet, Node, ResourceKind, Scale};
use mapicheck_poll::{Lookup, PollStatus, Poller};
use tokio::sync::watch;
use tracing::{info, instrument, warn};

use crate::config::VerifierConfig;
use crate::consistency::ConsistencyChecker;
use crate::error::{ReadError, VerifyError};
use crate::health::{self, HealthEvaluator};
use crate::reader::ResourceReader;
use crate::scale::ScaleCoordinator;
use crate::snapshot::{SnapshotLogger, StatusSnapshot};

/// Every verification the crate offers, wired to one cluster.
///
/// # Example
///
/// ```ignore
/// let verifier = ClusterVerifier::new(cluster, VerifierConfig::from_env()?);
/// verifier.scale_machine_set("workers", 4).await?;
/// verifier.wait_for_cluster_size(4).await?;
/// ```
#[derive(Clone)]
pub struct ClusterVerifier {
    config: VerifierConfig,
    reader: ResourceReader,
    poller: Poller,
    health: HealthEvaluator,
    consistency: ConsistencyChecker,
    snapshots: SnapshotLogger,
    scale: ScaleCoordinator,
}

impl ClusterVerifier {
    pub fn new(cluster: Arc<dyn ClusterAccess>, config: VerifierConfig) -> Self {
        let reader = ResourceReader::new(cluster, &config);
        Self::build(reader, config, Poller::new())
    }

    /// Stop every wait once `shutdown` becomes `true`.
    pub fn with_shutdown(self, shutdown: watch::Receiver<bool>) -> Self {
        Self::build(self.reader, self.config, Poller::with_shutdown(shutdown))
    }

    fn build(reader: ResourceReader, config: VerifierConfig, poller: Poller) -> Self {
        let timings = config.timings;
        let health = HealthEvaluator::new(reader.clone(), poller.clone(), timings);
        let consistency = ConsistencyChecker::new(
            reader.clone(),
            poller.clone(),
            timings.one_machine_per_node,
            config.machine_annotation_key.clone(),
        );
        let snapshots = SnapshotLogger::new(reader.clone(), config.default_machine_set_replicas);
        let scale = ScaleCoordinator::new(
            reader.clone(),
            poller.clone(),
            config.machine_set_resource.clone(),
            timings.cluster_size,
            health.clone(),
            consistency.clone(),
            snapshots.clone(),
        );

        Self {
            config,
            reader,
            poller,
            health,
            consistency,
            snapshots,
            scale,
        }
    }

    pub fn config(&self) -> &VerifierConfig {
        &self.config
    }

    pub fn reader(&self) -> &ResourceReader {
        &self.reader
    }

    /// See [`ScaleCoordinator::wait_for_cluster_size`].
    pub async fn wait_for_cluster_size(&self, target: usize) -> Result<Duration, VerifyError> {
        self.scale.wait_for_cluster_size(target).await
    }

    /// See [`ScaleCoordinator::scale_machine_set`].
    pub async fn scale_machine_set(&self, name: &str, replicas: i32) -> Result<Scale, VerifyError> {
        self.scale.scale_machine_set(name, replicas).await
    }

    /// Poll until every machine in `namespace` is linked to exactly one node.
    pub async fn check_one_machine_per_node(&self, namespace: &str) -> bool {
        self.consistency.check_one_machine_per_node(namespace).await
    }

    /// Like [`Self::check_one_machine_per_node`], keeping the failure cause.
    pub async fn wait_one_machine_per_node(&self, namespace: &str) -> Result<Duration, VerifyError> {
        self.consistency
            .wait_one_machine_per_node(namespace)
            .await
            .map_err(|source| VerifyError::MachineNodeMismatch {
                namespace: namespace.to_string(),
                source,
            })
    }

    pub fn nodes_are_ready(&self, nodes: &[Node]) -> bool {
        health::nodes_are_ready(nodes)
    }

    pub async fn wait_all_nodes_ready(&self) -> Result<Duration, VerifyError> {
        self.health
            .wait_all_nodes_ready()
            .await
            .map_err(VerifyError::NodesNotReady)
    }

    pub async fn wait_all_nodes_schedulable(&self) -> Result<Duration, VerifyError> {
        self.health
            .wait_all_nodes_schedulable()
            .await
            .map_err(VerifyError::NodesNotSchedulable)
    }

    /// The first node carrying the worker role label.
    ///
    /// Polled, since labels can lag behind node creation.
    #[instrument(skip(self))]
    pub async fn get_worker_node(&self) -> Result<Node, VerifyError> {
        let label = self.config.node_worker_role_label.as_str();
        let selector = &LabelSelector::role(label);

        let (node, _) = self
            .poller
            .poll_for("worker node", self.config.timings.worker_node, move || async move {
                match self.reader.list_nodes_with(selector).await {
                    Ok(nodes) => match nodes.into_iter().next() {
                        Some(node) => {
                            info!(node = %node.name, "Found worker node");
                            Lookup::Found(node)
                        }
                        None => Lookup::waiting(format!("no node labelled {label:?}")),
                    },
                    Err(e) => {
                        warn!(error = %e, "Failed to list worker nodes");
                        Lookup::waiting(e.to_string())
                    }
                }
            })
            .await
            .map_err(|source| VerifyError::NoWorkerNode {
                label: label.to_string(),
                source,
            })?;
        Ok(node)
    }

    /// Delete `machine`.
    ///
    /// A machine that is already gone counts as deleted. Transient failures
    /// are retried; any other failure aborts at once.
    #[instrument(skip_all, fields(machine = %machine.name))]
    pub async fn delete_machine(&self, machine: &Machine) -> Result<(), VerifyError> {
        let cluster = self.reader.cluster();
        let (namespace, name) = (machine.namespace.as_str(), machine.name.as_str());

        self.poller
            .poll("machine deleted", self.config.timings.delete_machine, move || async move {
                match cluster.delete_machine(namespace, name).await {
                    Ok(()) => {
                        info!(machine = %name, "Deleted machine");
                        PollStatus::Satisfied
                    }
                    Err(e) if e.is_not_found() => {
                        info!(machine = %name, "Machine already gone");
                        PollStatus::Satisfied
                    }
                    Err(e) if e.is_transient() => {
                        warn!(machine = %name, error = %e, "Failed to delete machine, will retry");
                        PollStatus::waiting(e.to_string())
                    }
                    Err(e) => PollStatus::Failed(ReadError::cluster(
                        "delete",
                        ResourceKind::Machine,
                        name,
                        e,
                    )),
                }
            })
            .await
            .map(|_| ())
            .map_err(|source| VerifyError::DeleteMachine {
                name: name.to_string(),
                source,
            })
    }

    /// Log and return machine-set and node status.
    pub async fn snapshot(&self) -> Result<StatusSnapshot, VerifyError> {
        Ok(self.snapshots.capture().await?)
    }

    pub async fn machines_for_machine_set(
        &self,
        set: &MachineSet,
    ) -> Result<Vec<Machine>, VerifyError> {
        Ok(self.reader.machines_for_machine_set(set).await?)
    }

    pub async fn nodes_for_machine_set(&self, set: &MachineSet) -> Result<Vec<Node>, VerifyError> {
        Ok(self.reader.nodes_for_machine_set(set).await?)
    }
}
