//! CLI commands.

mod attach;
mod detach;
mod show;
mod wait;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use nebula_reconcile::NicReconciler;
use tokio::sync::watch;

use crate::client::HttpControlPlane;
use crate::config::Config;
use crate::output::OutputFormat;

/// vrctl - Attach and detach virtual router NICs and wait for them to converge.
#[derive(Debug, Parser)]
#[command(name = "vrctl")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Output format.
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Control plane API URL.
    #[arg(long, global = true, env = "VRCTL_ENDPOINT")]
    endpoint: Option<String>,

    /// Emit logs as JSON.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Show a virtual router's NICs and VMs.
    Show(show::ShowCommand),

    /// Attach a NIC and print the NIC ID it was given.
    Attach(attach::AttachCommand),

    /// Detach a NIC and wait until it is gone.
    Detach(detach::DetachCommand),

    /// Wait until VMs reach one of the given states.
    Wait(wait::WaitCommand),
}

impl Cli {
    /// Returns true if logs should be emitted as JSON.
    pub fn log_json(&self) -> bool {
        self.log_json
    }

    /// Load configuration and apply global flags on top.
    pub fn load_config(&self) -> Result<Config> {
        let mut config = Config::load()?;
        if let Some(endpoint) = &self.endpoint {
            config.endpoint = endpoint.clone();
        }
        Ok(config)
    }

    /// Run the CLI command.
    pub async fn run(self, config: Config, shutdown: watch::Receiver<bool>) -> Result<()> {
        let ctx = CommandContext {
            config,
            format: self.format,
            shutdown,
        };

        match self.command {
            Commands::Show(cmd) => cmd.run(ctx).await,
            Commands::Attach(cmd) => cmd.run(ctx).await,
            Commands::Detach(cmd) => cmd.run(ctx).await,
            Commands::Wait(cmd) => cmd.run(ctx).await,
        }
    }
}

/// Shared command context.
pub struct CommandContext {
    pub config: Config,
    pub format: OutputFormat,
    pub shutdown: watch::Receiver<bool>,
}

impl CommandContext {
    /// Build a reconciler talking to the configured control plane.
    pub fn reconciler(&self) -> Result<NicReconciler<HttpControlPlane>> {
        let control_plane = HttpControlPlane::from_config(&self.config)?;
        Ok(NicReconciler::new(Arc::new(control_plane))
            .with_policy(self.config.retry_policy())
            .with_shutdown(self.shutdown.clone()))
    }

    /// Convergence timeout, preferring the command flag over config.
    pub fn timeout(&self, flag: Option<u64>) -> Duration {
        self.config.timeout(flag)
    }
}
