//! Scale command (set machine-set replicas).

use anyhow::{Context, Result};
use clap::Args;

use crate::output::{print_info, print_single, print_success, OutputFormat};

use super::CommandContext;

/// Scale command - set the desired replicas of a machine-set.
#[derive(Debug, Args)]
pub struct ScaleCommand {
    /// Machine-set name.
    machine_set: String,

    /// Desired replicas.
    replicas: u32,

    /// After scaling, wait for the cluster to reach this many nodes.
    #[arg(long, value_name = "SIZE")]
    wait: Option<usize>,
}

impl ScaleCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let replicas = i32::try_from(self.replicas)
            .with_context(|| format!("Replica count {} is too large", self.replicas))?;

        let scale = ctx
            .verifier
            .scale_machine_set(&self.machine_set, replicas)
            .await?;

        match ctx.format {
            OutputFormat::Json => print_single(&scale),
            OutputFormat::Table => print_success(&format!(
                "Scaled machine-set {} to {} replicas",
                scale.name, scale.replicas
            )),
        }

        if let Some(size) = self.wait {
            print_info(&format!("Waiting for the cluster to reach {size} nodes"));
            ctx.verifier.wait_for_cluster_size(size).await?;
            print_success(&format!("Cluster converged on {size} nodes"));
        }
        Ok(())
    }
}
