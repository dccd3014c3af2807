//! Resource reader.
//!
//! Thin layer over [`ClusterAccess`] that:
//! - Scopes machine reads to the configured machine namespace
//! - Resolves node → machine (annotation) and machine → node (`node_ref`)
//! - Wraps cluster errors with the action and resource that failed
//!
//! The reader never retries. Polling callers decide whether a failure is
//! "not yet" or fatal.

use std::sync::Arc;

use mapicheck_client::ClusterAccess;
use mapicheck_model::{
    LabelSelector, Machine, MachineKey, MachineSet, Node, ResourceKind,
};
use tracing::{debug, info};

use crate::config::VerifierConfig;
use crate::error::ReadError;

/// Machines and nodes observed in one poll iteration.
///
/// Built fresh for every iteration and dropped afterwards.
#[derive(Debug, Clone, Default)]
pub struct ClusterSnapshot {
    pub machines: Vec<Machine>,
    pub nodes: Vec<Node>,
}

/// Reads cluster resources through an injected [`ClusterAccess`].
#[derive(Clone)]
pub struct ResourceReader {
    cluster: Arc<dyn ClusterAccess>,
    namespace: String,
    annotation_key: String,
}

impl ResourceReader {
    pub fn new(cluster: Arc<dyn ClusterAccess>, config: &VerifierConfig) -> Self {
        Self {
            cluster,
            namespace: config.machine_namespace.clone(),
            annotation_key: config.machine_annotation_key.clone(),
        }
    }

    /// The machine namespace reads are scoped to.
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub(crate) fn cluster(&self) -> &dyn ClusterAccess {
        self.cluster.as_ref()
    }

    pub async fn list_machines(&self, namespace: &str) -> Result<Vec<Machine>, ReadError> {
        self.cluster
            .list_machines(namespace)
            .await
            .map_err(|e| ReadError::cluster("list", ResourceKind::Machine, namespace, e))
    }

    /// List every node in the cluster.
    pub async fn list_nodes(&self) -> Result<Vec<Node>, ReadError> {
        self.list_nodes_with(&LabelSelector::everything()).await
    }

    pub async fn list_nodes_with(&self, selector: &LabelSelector) -> Result<Vec<Node>, ReadError> {
        self.cluster
            .list_nodes(selector)
            .await
            .map_err(|e| ReadError::cluster("list", ResourceKind::Node, selector.to_string(), e))
    }

    pub async fn list_machine_sets(&self) -> Result<Vec<MachineSet>, ReadError> {
        self.cluster
            .list_machine_sets(&self.namespace)
            .await
            .map_err(|e| {
                ReadError::cluster("list", ResourceKind::MachineSet, self.namespace.as_str(), e)
            })
    }

    /// Get a machine from the machine namespace.
    pub async fn get_machine(&self, name: &str) -> Result<Machine, ReadError> {
        self.cluster
            .get_machine(&self.namespace, name)
            .await
            .map_err(|e| ReadError::cluster("get", ResourceKind::Machine, name, e))
    }

    pub async fn get_node(&self, name: &str) -> Result<Node, ReadError> {
        self.cluster
            .get_node(name)
            .await
            .map_err(|e| ReadError::cluster("get", ResourceKind::Node, name, e))
    }

    /// Machines and nodes read back to back.
    pub async fn snapshot(&self, namespace: &str) -> Result<ClusterSnapshot, ReadError> {
        let machines = self.list_machines(namespace).await?;
        let nodes = self.list_nodes().await?;
        Ok(ClusterSnapshot { machines, nodes })
    }

    /// Number of nodes in the cluster.
    pub async fn cluster_size(&self) -> Result<usize, ReadError> {
        let size = self.list_nodes().await?.len();
        info!(size, "Cluster size is {size} nodes");
        Ok(size)
    }

    /// Decode the machine key from a node's annotation.
    pub fn machine_key_for_node(&self, node: &Node) -> Result<MachineKey, ReadError> {
        let value = node
            .annotation(&self.annotation_key)
            .ok_or_else(|| ReadError::MissingAnnotation {
                node: node.name.clone(),
                key: self.annotation_key.clone(),
            })?;

        MachineKey::parse(value).map_err(|source| ReadError::MalformedAnnotation {
            node: node.name.clone(),
            value: value.to_string(),
            source,
        })
    }

    /// The machine a node's annotation points at.
    pub async fn machine_for_node(&self, node: &Node) -> Result<Machine, ReadError> {
        let key = self.machine_key_for_node(node)?;
        if key.namespace() != self.namespace {
            return Err(ReadError::ForeignNamespace {
                key,
                expected: self.namespace.clone(),
            });
        }
        self.get_machine(key.name()).await
    }

    /// The node a machine's `node_ref` points at.
    pub async fn node_for_machine(&self, machine: &Machine) -> Result<Node, ReadError> {
        let node_ref = machine.node_ref.as_ref().ok_or_else(|| ReadError::NoNodeRef {
            machine: machine.name.clone(),
        })?;
        let node = self.get_node(&node_ref.name).await?;
        info!(machine = %machine.name, node = %node.name, "Machine is backing node");
        Ok(node)
    }

    /// Machines whose controlling owner is `set`.
    pub async fn machines_for_machine_set(
        &self,
        set: &MachineSet,
    ) -> Result<Vec<Machine>, ReadError> {
        let machines = self.list_machines(&set.namespace).await?;
        Ok(machines
            .into_iter()
            .filter(|m| m.is_controlled_by(set))
            .collect())
    }

    /// Nodes backing the machines owned by `set`.
    ///
    /// Fails if any owned machine has no node yet.
    pub async fn nodes_for_machine_set(&self, set: &MachineSet) -> Result<Vec<Node>, ReadError> {
        let machines = self.machines_for_machine_set(set).await?;
        let mut nodes = Vec::with_capacity(machines.len());
        for machine in &machines {
            nodes.push(self.node_for_machine(machine).await?);
        }
        debug!(machine_set = %set.name, nodes = nodes.len(), "Resolved machine-set nodes");
        Ok(nodes)
    }
}
