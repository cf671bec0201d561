//! Relay client: receives relayed webhooks and replays them locally.

use std::io::{self, BufRead, Write};

use clap::Parser;

use webhook_relay::client::{RelayClient, ReplayEngine, RequestField};
use webhook_relay::observability::logging;

#[derive(Parser)]
#[command(name = "relay-cli")]
#[command(about = "Receive relayed webhooks and replay them against local services", long_about = None)]
struct Cli {
    /// Local port your webhook handler listens on (repeatable).
    #[arg(short = 'p', long = "port", required = true)]
    ports: Vec<u16>,

    /// Relay server WebSocket base URL.
    #[arg(short, long, default_value = "ws://localhost:8080")]
    server: String,

    /// Join an existing group instead of starting a new one.
    #[arg(short = 'c', long = "connect")]
    connect: bool,

    /// Group URL to join (prompted when omitted).
    #[arg(long, requires = "connect")]
    url: Option<String>,

    /// Group password (prompted when omitted).
    #[arg(long, requires = "connect")]
    key: Option<String>,

    /// Log level for diagnostics on stderr.
    #[arg(long, default_value = "warn")]
    log_level: String,

    /// Request fields to print (default: Method Header Body).
    fields: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init_tracing(&logging::default_filter(&cli.log_level), logging::LogTarget::Stderr);

    let fields = RequestField::parse_list(cli.fields.as_slice())?;
    let engine = ReplayEngine::new(cli.ports, fields);

    let client = if cli.connect {
        let url = match cli.url {
            Some(url) => url,
            None => prompt("enter webhook link: ")?,
        };
        let key = match cli.key {
            Some(key) => key,
            None => prompt("enter webhook password: ")?,
        };
        RelayClient::join(&cli.server, &url, &key).await?
    } else {
        RelayClient::open(&cli.server).await?
    };

    println!("\nlink: {}", client.url);
    println!("password: {}", client.key);
    tracing::info!(ports = ?engine.ports(), "Relaying to local ports");

    let mut out = io::stdout();
    client.stream(&engine, &mut out).await?;
    Ok(())
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{label}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
