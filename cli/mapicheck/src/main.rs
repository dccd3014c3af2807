//! mapicheck - verify that a cluster's machines and nodes have converged
//!
//! Scales machine-sets, waits for the cluster to reach a size, and checks
//! that every machine is backed by exactly one ready, schedulable node.

use anyhow::Result;
use clap::Parser;

mod commands;
mod config;
mod error;
mod output;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_tracing();

    if let Err(e) = cli.run().await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
