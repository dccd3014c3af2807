//! Machine commands.

use anyhow::Result;
use clap::Args;
use mapicheck_model::Machine;

use crate::output::{print_info, print_success};

use super::CommandContext;

#[derive(Debug, Args)]
pub struct DeleteMachineCommand {
    /// Machine name, in the machine namespace.
    name: String,
}

impl DeleteMachineCommand {
    pub async fn run(self, ctx: CommandContext) -> Result<()> {
        let machine = match ctx.verifier.reader().get_machine(&self.name).await {
            Ok(machine) => machine,
            Err(e) if e.is_not_found() => {
                print_info(&format!("Machine '{}' does not exist", self.name));
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        delete(&ctx, &machine).await?;
        print_success(&format!("Deleted machine '{}'", machine.name));
        Ok(())
    }
}

async fn delete(ctx: &CommandContext, machine: &Machine) -> Result<()> {
    if let Some(node_ref) = &machine.node_ref {
        print_info(&format!("Machine '{}' is backing node '{}'", machine.name, node_ref.name));
    }
    ctx.verifier.delete_machine(machine).await?;
    Ok(())
}
