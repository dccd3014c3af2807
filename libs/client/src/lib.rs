//! # mapicheck-client
//!
//! The cluster access capability consumed by the verifier.
//!
//! [`ClusterAccess`] is the seam between verification logic and the cluster:
//! list/get for nodes, machines and machine-sets, a machine delete, and
//! read/update of a scale sub-resource. [`HttpCluster`] implements it against
//! the Kubernetes REST API; tests substitute an in-memory implementation.

use async_trait::async_trait;
use mapicheck_model::{GroupResource, LabelSelector, Machine, MachineSet, Node, Scale};

mod error;
mod http;
mod wire;

pub use error::ClusterError;
pub use http::{HttpCluster, HttpClusterConfig};

/// Cluster access interface.
///
/// Implementations do not retry; retry policy belongs to the caller.
#[async_trait]
pub trait ClusterAccess: Send + Sync {
    /// List nodes matching `selector` (an empty selector lists all nodes).
    async fn list_nodes(&self, selector: &LabelSelector) -> Result<Vec<Node>, ClusterError>;

    /// Get a node by name.
    async fn get_node(&self, name: &str) -> Result<Node, ClusterError>;

    /// List machines in a namespace.
    async fn list_machines(&self, namespace: &str) -> Result<Vec<Machine>, ClusterError>;

    /// Get a machine by namespace and name.
    async fn get_machine(&self, namespace: &str, name: &str) -> Result<Machine, ClusterError>;

    /// Delete a machine.
    async fn delete_machine(&self, namespace: &str, name: &str) -> Result<(), ClusterError>;

    /// List machine-sets in a namespace.
    async fn list_machine_sets(&self, namespace: &str) -> Result<Vec<MachineSet>, ClusterError>;

    /// Read the scale sub-resource of `resource` `namespace/name`.
    async fn get_scale(
        &self,
        resource: &GroupResource,
        namespace: &str,
        name: &str,
    ) -> Result<Scale, ClusterError>;

    /// Write a scale sub-resource back; returns the stored value.
    async fn update_scale(
        &self,
        resource: &GroupResource,
        scale: &Scale,
    ) -> Result<Scale, ClusterError>;
}
