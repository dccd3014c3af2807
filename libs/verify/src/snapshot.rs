//! Diagnostic snapshots of machine-set and node status.
//!
//! Snapshots are logged and returned for display. Nothing here feeds into a
//! convergence decision.

use serde::Serialize;
use tracing::info;

use crate::error::ReadError;
use crate::reader::ResourceReader;

/// Replica counts of one machine-set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineSetStatus {
    pub name: String,
    pub desired: i32,
    pub ready: i32,
    pub available: i32,
}

/// Health of one node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub name: String,
    pub ready: bool,
    pub unschedulable: bool,
}

/// Machine-set and node status at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub machine_sets: Vec<MachineSetStatus>,
    pub nodes: Vec<NodeStatus>,
}

#[derive(Clone)]
pub struct SnapshotLogger {
    reader: ResourceReader,
    default_replicas: i32,
}

impl SnapshotLogger {
    pub fn new(reader: ResourceReader, default_replicas: i32) -> Self {
        Self {
            reader,
            default_replicas,
        }
    }

    /// Log desired, ready and available replicas of every machine-set.
    pub async fn machine_sets(&self) -> Result<Vec<MachineSetStatus>, ReadError> {
        let sets = self.reader.list_machine_sets().await?;
        Ok(sets
            .into_iter()
            .map(|set| {
                let status = MachineSetStatus {
                    desired: set.desired_replicas(self.default_replicas),
                    ready: set.ready_replicas,
                    available: set.available_replicas,
                    name: set.name,
                };
                info!(
                    machine_set = %status.name,
                    desired = status.desired,
                    ready = status.ready,
                    available = status.available,
                    "MachineSet status"
                );
                status
            })
            .collect())
    }

    /// Log readiness and schedulability of every node.
    pub async fn nodes(&self) -> Result<Vec<NodeStatus>, ReadError> {
        let nodes = self.reader.list_nodes().await?;
        Ok(nodes
            .into_iter()
            .map(|node| {
                let status = NodeStatus {
                    ready: node.is_ready(),
                    unschedulable: node.unschedulable,
                    name: node.name,
                };
                info!(
                    node = %status.name,
                    ready = status.ready,
                    unschedulable = status.unschedulable,
                    "Node status"
                );
                status
            })
            .collect())
    }

    /// Machine-sets then nodes. Either list failing fails the snapshot.
    pub async fn capture(&self) -> Result<StatusSnapshot, ReadError> {
        let machine_sets = self.machine_sets().await?;
        let nodes = self.nodes().await?;
        Ok(StatusSnapshot {
            machine_sets,
            nodes,
        })
    }
}
