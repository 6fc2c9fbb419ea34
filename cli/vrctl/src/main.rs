//! vrctl - attach and detach virtual router NICs.

use anyhow::Result;
use clap::Parser;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use vrctl::commands::Cli;
use vrctl::error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match cli.load_config() {
        Ok(config) => config,
        Err(e) => {
            error::print_error(&e);
            std::process::exit(1);
        }
    };

    // Initialize tracing; logs go to stderr so stdout stays parseable
    let json = cli.log_json();
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_level)),
        )
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    info!(endpoint = %config.endpoint, "Configuration loaded");

    // Ctrl-C cancels any wait in progress
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received interrupt, cancelling");
            let _ = shutdown_tx.send(true);
        }
    });

    // Run the command
    if let Err(e) = cli.run(config, shutdown_rx).await {
        error::print_error(&e);
        std::process::exit(1);
    }

    Ok(())
}
