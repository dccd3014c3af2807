//! Error types for verification.

use mapicheck_client::ClusterError;
use mapicheck_model::{KeyError, MachineKey, ResourceKind};
use mapicheck_poll::PollError;
use thiserror::Error;

/// Errors from reading and resolving cluster resources.
#[derive(Debug, Error)]
pub enum ReadError {
    /// A cluster call failed.
    #[error("{action} {kind} {target:?}: {source}")]
    Cluster {
        action: &'static str,
        kind: ResourceKind,
        target: String,
        #[source]
        source: ClusterError,
    },

    /// The node has no machine annotation.
    #[error("node {node:?} does not have the machine annotation {key:?}")]
    MissingAnnotation { node: String, key: String },

    /// The machine annotation is not a valid `namespace/name` key.
    #[error("machine annotation {value:?} on node {node:?} is malformed: {source}")]
    MalformedAnnotation {
        node: String,
        value: String,
        #[source]
        source: KeyError,
    },

    /// The annotation points at a machine outside the machine namespace.
    #[error("machine {key} is forbidden to live outside of the {expected} namespace")]
    ForeignNamespace { key: MachineKey, expected: String },

    /// The machine is not backed by a node yet.
    #[error("machine {machine:?} has no node reference")]
    NoNodeRef { machine: String },
}

impl ReadError {
    pub(crate) fn cluster(
        action: &'static str,
        kind: ResourceKind,
        target: impl Into<String>,
        source: ClusterError,
    ) -> Self {
        Self::Cluster {
            action,
            kind,
            target: target.into(),
            source,
        }
    }

    /// Returns true if the underlying resource does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Cluster { source, .. } if source.is_not_found())
    }

    /// The cluster error behind this read failure, if any.
    pub fn cluster_error(&self) -> Option<&ClusterError> {
        match self {
            Self::Cluster { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// Workflow errors. Each variant names the stage that failed.
#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("did not reach expected number of nodes ({target}): {source}")]
    ClusterSize {
        target: usize,
        #[source]
        source: PollError<ReadError>,
    },

    #[error("nodes did not become ready: {0}")]
    NodesNotReady(#[source] PollError<ReadError>),

    #[error("nodes did not become schedulable: {0}")]
    NodesNotSchedulable(#[source] PollError<ReadError>),

    #[error("one machine per node condition violated in {namespace}: {source}")]
    MachineNodeMismatch {
        namespace: String,
        #[source]
        source: PollError<ReadError>,
    },

    #[error("no node found with label {label:?}: {source}")]
    NoWorkerNode {
        label: String,
        #[source]
        source: PollError<ReadError>,
    },

    #[error("failed to delete machine {name:?}: {source}")]
    DeleteMachine {
        name: String,
        #[source]
        source: PollError<ReadError>,
    },

    #[error("failed to scale machine-set {name:?}: {source}")]
    Scale {
        name: String,
        #[source]
        source: ReadError,
    },

    #[error("invalid replica count {0}: must be non-negative")]
    InvalidReplicas(i32),

    #[error(transparent)]
    Read(#[from] ReadError),
}

impl VerifyError {
    /// Returns true if a poll ran out of time.
    pub fn is_timeout(&self) -> bool {
        self.poll_error().is_some_and(PollError::is_timeout)
    }

    /// Returns true if a poll was interrupted by shutdown.
    pub fn is_cancelled(&self) -> bool {
        self.poll_error().is_some_and(PollError::is_cancelled)
    }

    fn poll_error(&self) -> Option<&PollError<ReadError>> {
        match self {
            Self::ClusterSize { source, .. }
            | Self::MachineNodeMismatch { source, .. }
            | Self::NoWorkerNode { source, .. }
            | Self::DeleteMachine { source, .. } => Some(source),
            Self::NodesNotReady(source) | Self::NodesNotSchedulable(source) => Some(source),
            Self::Scale { .. } | Self::InvalidReplicas(_) | Self::Read(_) => None,
        }
    }
}
