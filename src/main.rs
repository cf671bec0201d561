//! Webhook relay server.
//!
//! Hands out unguessable subdomains over WebSocket and relays every POST
//! arriving at one of them to the members of its group.

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use webhook_relay::http::HttpServer;
use webhook_relay::lifecycle::{signals, startup, Shutdown};
use webhook_relay::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "webhook-relay")]
#[command(about = "Relay webhooks to clients connected over WebSocket", long_about = None)]
struct Cli {
    /// Port to listen on (overrides the config file).
    #[arg(short, long)]
    port: Option<u16>,

    /// Domain appended to generated subdomains (overrides the config file).
    #[arg(short, long)]
    domain: Option<String>,

    /// Path to a TOML config file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = startup::resolve_config(cli.config.as_deref(), cli.port, cli.domain)?;

    logging::init_tracing(
        &logging::default_filter(&config.observability.log_level),
        logging::LogTarget::Stdout,
    );

    tracing::info!("webhook-relay v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        domain = %config.identity.domain,
        read_deadline_ms = config.liveness.read_deadline_ms,
        max_body_size = config.limits.max_body_size,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // Validation guarantees the address parses.
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    signals::spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(config, shutdown);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
