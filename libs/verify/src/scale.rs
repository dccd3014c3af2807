//! Machine-set scaling and the wait for the cluster to follow.

use std::time::Duration;

use mapicheck_model::{GroupResource, ResourceKind, Scale};
use mapicheck_poll::{PollPolicy, PollStatus, Poller};
use tracing::{info, instrument, warn};

use crate::consistency::ConsistencyChecker;
use crate::error::{ReadError, VerifyError};
use crate::health::HealthEvaluator;
use crate::reader::ResourceReader;
use crate::snapshot::SnapshotLogger;

/// Scales machine-sets and waits for the cluster to converge on a size.
#[derive(Clone)]
pub struct ScaleCoordinator {
    reader: ResourceReader,
    poller: Poller,
    resource: GroupResource,
    size_policy: PollPolicy,
    health: HealthEvaluator,
    consistency: ConsistencyChecker,
    snapshots: SnapshotLogger,
}

impl ScaleCoordinator {
    pub fn new(
        reader: ResourceReader,
        poller: Poller,
        resource: GroupResource,
        size_policy: PollPolicy,
        health: HealthEvaluator,
        consistency: ConsistencyChecker,
        snapshots: SnapshotLogger,
    ) -> Self {
        Self {
            reader,
            poller,
            resource,
            size_policy,
            health,
            consistency,
            snapshots,
        }
    }

    /// Set the desired replicas of machine-set `name`.
    ///
    /// Reads the scale sub-resource once and writes it back once with only
    /// the replica count changed. The read's resource version rides along, so
    /// a concurrent write makes the update fail instead of being overwritten.
    #[instrument(skip(self))]
    pub async fn scale_machine_set(&self, name: &str, replicas: i32) -> Result<Scale, VerifyError> {
        if replicas < 0 {
            return Err(VerifyError::InvalidReplicas(replicas));
        }
        let namespace = self.reader.namespace();
        let cluster = self.reader.cluster();

        let current = cluster
            .get_scale(&self.resource, namespace, name)
            .await
            .map_err(|e| VerifyError::Scale {
                name: name.to_string(),
                source: ReadError::cluster("get", ResourceKind::Scale, name, e),
            })?;

        let updated = cluster
            .update_scale(&self.resource, &current.with_replicas(replicas))
            .await
            .map_err(|e| VerifyError::Scale {
                name: name.to_string(),
                source: ReadError::cluster("update", ResourceKind::Scale, name, e),
            })?;

        info!(
            machine_set = %name,
            from = current.replicas,
            to = updated.replicas,
            "Scaled machine-set"
        );
        Ok(updated)
    }

    /// Wait for the cluster to reach `target` nodes and settle.
    ///
    /// Stages run strictly in order, each gating the next:
    /// 1. Node count reaches `target` (a status snapshot is logged on every
    ///    attempt)
    /// 2. Every node is ready
    /// 3. No node is unschedulable
    /// 4. One machine per node in the machine namespace
    #[instrument(skip(self))]
    pub async fn wait_for_cluster_size(&self, target: usize) -> Result<Duration, VerifyError> {
        let elapsed = self
            .poller
            .poll("cluster size", self.size_policy, move || async move {
                if let Err(e) = self.snapshots.capture().await {
                    return PollStatus::Failed(e);
                }
                match self.reader.cluster_size().await {
                    Ok(size) if size == target => PollStatus::Satisfied,
                    Ok(size) => {
                        info!(size, target, "Cluster size does not match target yet");
                        PollStatus::waiting(format!("{size} of {target} nodes"))
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to read cluster size");
                        PollStatus::waiting(e.to_string())
                    }
                }
            })
            .await
            .map_err(|source| VerifyError::ClusterSize { target, source })?;
        info!(target, elapsed = ?elapsed, "Cluster reached expected size");

        self.health
            .wait_all_nodes_ready()
            .await
            .map_err(VerifyError::NodesNotReady)?;

        self.health
            .wait_all_nodes_schedulable()
            .await
            .map_err(VerifyError::NodesNotSchedulable)?;

        let namespace = self.reader.namespace();
        self.consistency
            .wait_one_machine_per_node(namespace)
            .await
            .map_err(|source| VerifyError::MachineNodeMismatch {
                namespace: namespace.to_string(),
                source,
            })?;

        Ok(elapsed)
    }
}
