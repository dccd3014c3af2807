//! Convergence waits.

use anyhow::Result;
use clap::Args;

use crate::output::print_success;

use super::CommandContext;

/// Wait for the cluster to reach SIZE nodes, then for every node to be ready
/// and schedulable and every machine to be linked to its node.
#[derive(Debug, Args)]
pub struct WaitSizeCommand {
    /// Expected number of nodes.
    size: usize,
}

impl WaitSizeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let elapsed = ctx.verifier.wait_for_cluster_size(self.size).await?;
        print_success(&format!(
            "Cluster converged on {} nodes ({:?} to reach size)",
            self.size, elapsed
        ));
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct CheckMachinesCommand {
    /// Machine namespace (defaults to MAPICHECK_MACHINE_NAMESPACE).
    #[arg(long)]
    namespace: Option<String>,
}

impl CheckMachinesCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let namespace = self
            .namespace
            .unwrap_or_else(|| ctx.verifier.config().machine_namespace.clone());

        ctx.verifier.wait_one_machine_per_node(&namespace).await?;
        print_success(&format!("One machine per node in {namespace}"));
        Ok(())
    }
}
