//! form2json server.
//!
//! ```text
//!     Client POST (form)      ┌──────────────────────────────────────────┐
//!     ────────────────────────┼─▶ request id ─▶ form2json ─▶ next stage ─┼──▶ Upstream
//!                             │                 │                        │    (or echo)
//!                             │                 ├─ gate                  │
//!                             │                 ├─ parser (spill)        │
//!                             │                 └─ converter (JSON)      │
//!                             └──────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use form2json::config::{load_config, watcher::ConfigWatcher, Form2JsonConfig};
use form2json::observability::{logging, metrics};
use form2json::{HttpServer, Shutdown};

#[derive(Parser)]
#[command(name = "form2json")]
#[command(about = "Rewrites form posts into JSON request bodies", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file (watched for changes).
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => Form2JsonConfig::default(),
    };

    logging::init(&config.observability);
    tracing::info!("form2json v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.listener.bind_address,
        memory_limit = config.form.memory_limit,
        upstream = ?config.upstream.address,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    // keep the watcher alive for the lifetime of the server
    let (_watcher, config_updates) = match &cli.config {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path, config.clone());
            (Some(watcher.run()?), updates)
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (None, updates)
        }
    };

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    shutdown.trigger_on_signal();

    let server = HttpServer::new(config);
    server.run(listener, config_updates, shutdown.subscribe()).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
