//! # mapicheck-model
//!
//! Read-only records for the cluster state the verifier observes.
//!
//! ## Resources
//!
//! - [`Node`]: a worker in the cluster, linked to its machine through an
//!   annotation holding the machine's `namespace/name` key
//! - [`Machine`]: desired infrastructure, linked back to its node through
//!   `node_ref` once provisioned
//! - [`MachineSet`] and its [`Scale`] sub-resource
//!
//! These are plain values. Fetching them is the job of a `ClusterAccess`
//! implementation; nothing here performs I/O.

mod error;
mod key;
mod selector;
mod types;

pub use error::KeyError;
pub use key::MachineKey;
pub use selector::LabelSelector;
pub use types::*;

/// Well-known label, annotation and API names of the machine API.
pub mod well_known {
    /// Node annotation holding the backing machine's `namespace/name`.
    pub const MACHINE_ANNOTATION: &str = "machine.openshift.io/machine";

    /// Node label marking worker nodes.
    pub const NODE_WORKER_ROLE_LABEL: &str = "node-role.kubernetes.io/worker";

    /// Machine label carrying the machine's role.
    pub const MACHINE_ROLE_LABEL: &str = "machine.openshift.io/cluster-api-machine-role";

    /// API group serving machines and machine-sets.
    pub const MACHINE_API_GROUP: &str = "machine.openshift.io";

    /// Namespace the machine API manages machines in.
    pub const MACHINE_API_NAMESPACE: &str = "openshift-machine-api";
}
