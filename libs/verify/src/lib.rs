//! # mapicheck-verify
//!
//! Checks that a cluster has converged to a target, internally consistent
//! state. Nothing here reconciles anything; every check observes the cluster
//! through a [`ClusterAccess`](mapicheck_client::ClusterAccess) and polls until
//! the expected state shows up or the deadline passes.
//!
//! ## Components
//!
//! - [`ResourceReader`]: lists and resolves nodes, machines and machine-sets
//! - [`ConsistencyChecker`]: the one-machine-per-node invariant
//! - [`HealthEvaluator`]: node readiness and schedulability
//! - [`ScaleCoordinator`]: scale a machine-set and wait for the cluster size
//! - [`SnapshotLogger`]: diagnostic dump of machine-set and node status
//!
//! [`ClusterVerifier`] bundles them behind one handle.

pub mod config;
pub mod consistency;
pub mod error;
pub mod health;
pub mod reader;
pub mod scale;
pub mod snapshot;
pub mod verifier;

pub use config::{Timings, VerifierConfig};
pub use consistency::{evaluate_correspondence, ConsistencyChecker, Correspondence};
pub use error::{ReadError, VerifyError};
pub use health::{nodes_are_ready, HealthEvaluator};
pub use reader::{ClusterSnapshot, ResourceReader};
pub use scale::ScaleCoordinator;
pub use snapshot::{MachineSetStatus, NodeStatus, SnapshotLogger, StatusSnapshot};
pub use verifier::ClusterVerifier;
