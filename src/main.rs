use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use api_relay::config::{self, RelayConfig};
use api_relay::lifecycle::{shutdown_signal, Shutdown};
use api_relay::observability::{logging, metrics};
use api_relay::HttpServer;

#[derive(Parser)]
#[command(name = "api-relay")]
#[command(about = "Single-endpoint HTTP relay with bounded concurrency", long_about = None)]
struct Cli {
    /// Address the HTTP listener binds [default: 0.0.0.0:5000]
    #[arg(long)]
    listen_addr: Option<String>,

    /// Optional TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => config::load_config(path)?,
        None => RelayConfig::default(),
    };
    if let Some(addr) = cli.listen_addr {
        config.listener.bind_address = addr;
    }
    config::validate_config(&config).map_err(config::ConfigError::Validation)?;

    logging::init(&config.observability.log_level);

    tracing::info!(
        bind_address = %config.listener.bind_address,
        upstream = %config.upstream.url,
        max_in_flight = config.admission.max_in_flight,
        deadline_secs = config.upstream.deadline_secs,
        "configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "failed to parse metrics address"
            ),
        }
    }

    // Bind failure is fatal: surface it and exit non-zero.
    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    let local_addr = listener.local_addr()?;
    tracing::info!(address = %local_addr, "listening for connections");

    let shutdown = Shutdown::new();
    let signal_shutdown = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("interrupt received, shutting down");
        signal_shutdown.trigger();
    });

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown).await?;

    tracing::info!("shutdown complete");
    Ok(())
}
