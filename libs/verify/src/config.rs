//! Configuration for the verifier.

use std::time::Duration;

use anyhow::{Context, Result};
use mapicheck_model::well_known::{
    MACHINE_ANNOTATION, MACHINE_API_GROUP, MACHINE_API_NAMESPACE, NODE_WORKER_ROLE_LABEL,
};
use mapicheck_model::GroupResource;
use mapicheck_poll::PollPolicy;

/// Short wait (one minute).
pub const WAIT_SHORT: Duration = Duration::from_secs(60);

/// Medium wait (three minutes).
pub const WAIT_MEDIUM: Duration = Duration::from_secs(3 * 60);

/// Long wait (fifteen minutes). Provisioning infrastructure is slow.
pub const WAIT_LONG: Duration = Duration::from_secs(15 * 60);

/// Poll interval and deadline for each check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timings {
    /// Node count reaching the target size.
    pub cluster_size: PollPolicy,

    /// Every node reporting `Ready=True`.
    pub nodes_ready: PollPolicy,

    /// No node flagged unschedulable.
    pub nodes_schedulable: PollPolicy,

    /// One machine per node, linked both ways.
    pub one_machine_per_node: PollPolicy,

    /// A node carrying the worker role label showing up.
    pub worker_node: PollPolicy,

    /// A machine delete going through.
    pub delete_machine: PollPolicy,
}

impl Timings {
    /// Derive every policy from the short/medium/long wait durations.
    pub fn from_waits(short: Duration, medium: Duration, long: Duration) -> Self {
        let fast = Duration::from_secs(1);
        let slow = Duration::from_secs(5);
        Self {
            cluster_size: PollPolicy::new(slow, long),
            nodes_ready: PollPolicy::new(fast, medium),
            nodes_schedulable: PollPolicy::new(fast, short),
            one_machine_per_node: PollPolicy::new(slow, medium),
            worker_node: PollPolicy::new(fast, short),
            delete_machine: PollPolicy::new(fast, short),
        }
    }
}

impl Default for Timings {
    fn default() -> Self {
        Self::from_waits(WAIT_SHORT, WAIT_MEDIUM, WAIT_LONG)
    }
}

/// Verifier configuration.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Namespace the machine API manages machines in.
    pub machine_namespace: String,

    /// Node annotation holding the backing machine's `namespace/name`.
    pub machine_annotation_key: String,

    /// Node label marking worker nodes.
    pub node_worker_role_label: String,

    /// Scalable resource addressed by machine-set scale updates.
    pub machine_set_resource: GroupResource,

    /// Desired replicas assumed for machine-sets that leave it unset.
    pub default_machine_set_replicas: i32,

    /// Poll policies.
    pub timings: Timings,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            machine_namespace: MACHINE_API_NAMESPACE.to_string(),
            machine_annotation_key: MACHINE_ANNOTATION.to_string(),
            node_worker_role_label: NODE_WORKER_ROLE_LABEL.to_string(),
            machine_set_resource: GroupResource::new(MACHINE_API_GROUP, "machinesets"),
            default_machine_set_replicas: 0,
            timings: Timings::default(),
        }
    }
}

fn env_secs(name: &str, default: Duration) -> Result<Duration> {
    let secs: Option<u64> = std::env::var(name)
        .ok()
        .map(|v| v.parse())
        .transpose()
        .with_context(|| format!("{name} must be an integer (seconds)."))?;
    Ok(secs.map(Duration::from_secs).unwrap_or(default))
}

impl VerifierConfig {
    /// Load configuration from environment variables.
    ///
    /// Unset variables fall back to the defaults.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let machine_namespace = std::env::var("MAPICHECK_MACHINE_NAMESPACE")
            .unwrap_or(defaults.machine_namespace);

        let machine_annotation_key = std::env::var("MAPICHECK_MACHINE_ANNOTATION")
            .unwrap_or(defaults.machine_annotation_key);

        let node_worker_role_label = std::env::var("MAPICHECK_WORKER_ROLE_LABEL")
            .unwrap_or(defaults.node_worker_role_label);

        let machine_api_group = std::env::var("MAPICHECK_MACHINE_API_GROUP")
            .unwrap_or_else(|_| MACHINE_API_GROUP.to_string());

        let default_machine_set_replicas: i32 = std::env::var("MAPICHECK_DEFAULT_REPLICAS")
            .ok()
            .map(|v| v.parse())
            .transpose()
            .context("MAPICHECK_DEFAULT_REPLICAS must be an integer.")?
            .unwrap_or(defaults.default_machine_set_replicas);

        let timings = Timings::from_waits(
            env_secs("MAPICHECK_WAIT_SHORT_SECS", WAIT_SHORT)?,
            env_secs("MAPICHECK_WAIT_MEDIUM_SECS", WAIT_MEDIUM)?,
            env_secs("MAPICHECK_WAIT_LONG_SECS", WAIT_LONG)?,
        );

        Ok(Self {
            machine_namespace,
            machine_annotation_key,
            node_worker_role_label,
            machine_set_resource: GroupResource::new(machine_api_group, "machinesets"),
            default_machine_set_replicas,
            timings,
        })
    }
}
