//! CLI commands.

mod machines;
mod scale;
mod snapshot;
mod wait;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use mapicheck_client::HttpCluster;
use mapicheck_verify::{ClusterVerifier, VerifierConfig};
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::output::OutputFormat;

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// mapicheck - verify machine/node convergence of a cluster.
#[derive(Debug, Parser)]
#[command(name = "mapicheck")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Log format. Filter with RUST_LOG.
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Pretty)]
    log_format: LogFormat,

    /// API server URL.
    #[arg(long, global = true, env = "MAPICHECK_API_URL")]
    api_url: Option<String>,

    /// Bearer token.
    #[arg(long, global = true, env = "MAPICHECK_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Skip TLS certificate verification.
    #[arg(long, global = true)]
    insecure_skip_tls_verify: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Wait for the cluster to reach a node count and settle.
    WaitSize(wait::WaitSizeCommand),

    /// Set the replicas of a machine-set.
    Scale(scale::ScaleCommand),

    /// Check that every machine is backed by exactly one node.
    CheckMachines(wait::CheckMachinesCommand),

    /// Find a node carrying the worker role label.
    WorkerNode(snapshot::WorkerNodeCommand),

    /// Show machine-set and node status.
    Snapshot(snapshot::SnapshotCommand),

    /// Delete a machine.
    DeleteMachine(machines::DeleteMachineCommand),

    /// Show CLI version.
    Version,
}

impl Cli {
    /// Install the global tracing subscriber. Logs go to stderr.
    pub fn init_tracing(&self) {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into());
        let registry = tracing_subscriber::registry().with(filter);
        match self.log_format {
            LogFormat::Json => registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init(),
            LogFormat::Pretty => registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init(),
        }
    }

    /// Run the CLI command.
    pub async fn run(self) -> Result<()> {
        if let Commands::Version = self.command {
            println!("mapicheck {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }

        let mut config = Config::load()?;
        if let Some(api_url) = self.api_url {
            config.api_url = api_url;
        }
        if self.token.is_some() {
            config.token = self.token;
        }
        config.insecure_skip_tls_verify |= self.insecure_skip_tls_verify;

        let verifier_config = VerifierConfig::from_env()?;
        info!(
            api_url = %config.api_url,
            namespace = %verifier_config.machine_namespace,
            "Configuration loaded"
        );

        let cluster = HttpCluster::new(&config.http_cluster(&verifier_config.machine_set_resource.group))
            .context("Failed to create cluster client")?;

        // Ctrl-C stops whatever wait is in progress.
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Received interrupt, cancelling");
                let _ = shutdown_tx.send(true);
            }
        });

        let ctx = CommandContext {
            verifier: ClusterVerifier::new(Arc::new(cluster), verifier_config)
                .with_shutdown(shutdown_rx),
            format: self.format,
        };

        match self.command {
            Commands::WaitSize(cmd) => cmd.run(ctx).await,
            Commands::Scale(cmd) => cmd.run(ctx).await,
            Commands::CheckMachines(cmd) => cmd.run(ctx).await,
            Commands::WorkerNode(cmd) => cmd.run(ctx).await,
            Commands::Snapshot(cmd) => cmd.run(ctx).await,
            Commands::DeleteMachine(cmd) => cmd.run(ctx).await,
            Commands::Version => Ok(()),
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub verifier: ClusterVerifier,
    pub format: OutputFormat,
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_scale_with_wait() {
        let cli = Cli::try_parse_from([
            "mapicheck", "--format", "json", "scale", "workers", "4", "--wait", "6",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(matches!(cli.command, Commands::Scale(_)));
    }

    #[test]
    fn test_negative_size_is_rejected() {
        assert!(Cli::try_parse_from(["mapicheck", "wait-size", "-1"]).is_err());
    }
}
