//! trx-cloudlog
//!
//! Keeps a connection to a trx-control server and reports each configured
//! radio's frequency and mode to Cloudlog, reconnecting whenever the server
//! goes away.

mod settings;

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use settings::Settings;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trx_relay::{Supervisor, WsConnector};

#[derive(Debug, Parser)]
#[command(name = "trx-cloudlog", version, about)]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,

    /// Log at debug level when RUST_LOG is not set
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter(cli.verbose).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Settings::load(&cli.config)
        .and_then(|settings| settings.relay_config())
        .with_context(|| format!("Failed to load {}", cli.config.display()))?;

    let radios: Vec<&str> = config.radios.iter().map(|r| r.as_str()).collect();
    info!(
        "Starting trx-cloudlog for {} via {}",
        radios.join(", "),
        config.endpoint_uri
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        info!("Shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    Supervisor::new(WsConnector::new(), config)
        .run(shutdown_rx)
        .await;

    info!("trx-cloudlog stopped");
    Ok(())
}

fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "trx_cloudlog=debug,trx_relay=debug,trx_protocol=debug"
    } else {
        "trx_cloudlog=info,trx_relay=info,trx_protocol=info"
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
///
/// Never resolves if no signal can be listened for; dropping the shutdown
/// sender would stop the relay.
async fn wait_for_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    result = tokio::signal::ctrl_c() => {
                        if let Err(e) = result {
                            warn!("Cannot listen for Ctrl-C: {}", e);
                            terminate.recv().await;
                        }
                    }
                    _ = terminate.recv() => {}
                }
                return;
            }
            Err(e) => warn!("Cannot listen for SIGTERM: {}", e),
        }
    }

    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Cannot listen for Ctrl-C: {}", e);
        std::future::pending::<()>().await;
    }
}
