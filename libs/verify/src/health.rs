//! Node readiness and schedulability.

use std::time::Duration;

use mapicheck_model::Node;
use mapicheck_poll::{PollError, PollStatus, Poller};
use tracing::{error, info, instrument, warn};

use crate::config::Timings;
use crate::error::ReadError;
use crate::reader::ResourceReader;

/// Returns true only if every node reports `Ready=True`.
///
/// Stops at the first node that is not ready and logs it together with its
/// full condition set.
pub fn nodes_are_ready(nodes: &[Node]) -> bool {
    for node in nodes {
        if !node.is_ready() {
            error!(
                node = %node.name,
                conditions = %node.conditions_summary(),
                "Node is not ready"
            );
            return false;
        }
        info!(node = %node.name, "Node is ready");
    }
    true
}

/// Polls node health over fresh node lists.
#[derive(Clone)]
pub struct HealthEvaluator {
    reader: ResourceReader,
    poller: Poller,
    timings: Timings,
}

impl HealthEvaluator {
    pub fn new(reader: ResourceReader, poller: Poller, timings: Timings) -> Self {
        Self {
            reader,
            poller,
            timings,
        }
    }

    /// Poll until every node in the cluster is ready.
    #[instrument(skip(self))]
    pub async fn wait_all_nodes_ready(&self) -> Result<Duration, PollError<ReadError>> {
        self.poller
            .poll("all nodes ready", self.timings.nodes_ready, move || async move {
                match self.reader.list_nodes().await {
                    Ok(nodes) => {
                        if nodes_are_ready(&nodes) {
                            PollStatus::Satisfied
                        } else {
                            let pending = nodes.iter().filter(|n| !n.is_ready()).count();
                            PollStatus::waiting(format!("{pending} of {} nodes not ready", nodes.len()))
                        }
                    }
                    Err(e) => {
                        warn!(error = %e, "Failed to list nodes");
                        PollStatus::waiting(e.to_string())
                    }
                }
            })
            .await
    }

    /// Poll until no node in the cluster is flagged unschedulable.
    #[instrument(skip(self))]
    pub async fn wait_all_nodes_schedulable(&self) -> Result<Duration, PollError<ReadError>> {
        self.poller
            .poll(
                "all nodes schedulable",
                self.timings.nodes_schedulable,
                move || async move {
                    match self.reader.list_nodes().await {
                        Ok(nodes) => match nodes.iter().find(|n| n.unschedulable) {
                            Some(node) => {
                                info!(node = %node.name, "Node is unschedulable");
                                PollStatus::waiting(format!("node {:?} is unschedulable", node.name))
                            }
                            None => PollStatus::Satisfied,
                        },
                        Err(e) => {
                            warn!(error = %e, "Failed to list nodes");
                            PollStatus::waiting(e.to_string())
                        }
                    }
                },
            )
            .await
    }
}
