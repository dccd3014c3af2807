//! Read-only status commands.

use anyhow::Result;
use clap::Args;

use crate::output::{print_output, print_single, MachineSetRow, NodeRow, OutputFormat};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct SnapshotCommand {}

impl SnapshotCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let snapshot = ctx.verifier.snapshot().await?;

        match ctx.format {
            OutputFormat::Json => print_single(&snapshot),
            OutputFormat::Table => {
                let sets: Vec<MachineSetRow> =
                    snapshot.machine_sets.iter().map(MachineSetRow::from).collect();
                let nodes: Vec<NodeRow> = snapshot.nodes.iter().map(NodeRow::from).collect();
                print_output(&sets, ctx.format);
                println!();
                print_output(&nodes, ctx.format);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Args)]
pub struct WorkerNodeCommand {}

impl WorkerNodeCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let node = ctx.verifier.get_worker_node().await?;

        match ctx.format {
            OutputFormat::Json => print_single(&node),
            OutputFormat::Table => print_output(&[NodeRow::from(&node)], ctx.format),
        }
        Ok(())
    }
}
