//! Config client daemon.
//!
//! Loads bootstrap settings, pulls the application's configuration, keeps it fresh
//! from broker notifications and the local override file, and exposes metrics.
//!
//! # Architecture Overview
//!
//! ```text
//!                 ┌───────────────────────────────────────────────┐
//!                 │                 CONFIG CLIENT                 │
//!                 │                                               │
//!  config service │  ┌──────────┐   ┌──────────┐   ┌───────────┐  │
//!  ───────────────┼─▶│  fetch   │──▶│ registry │──▶│ ValueCell │──┼──▶ application
//!   (HTTP, Basic) │  │ (retry)  │   │ (merge)  │   │ (context) │  │
//!                 │  └──────────┘   └────▲─────┘   └───────────┘  │
//!                 │        ▲             │                        │
//!                 │  ┌─────┴────┐   ┌────┴─────┐                  │
//!  broker topics  │  │ refresh  │   │  crypto  │                  │
//!  ───────────────┼─▶│ listener │   │ {cipher} │                  │
//!                 │  └──────────┘   └──────────┘                  │
//!                 └───────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::Parser;

use config_client::config::Environment;
use config_client::lifecycle::signals::shutdown_signal;
use config_client::observability::{logging, metrics, FilterLogManager};
use config_client::registry::SERVER_CONFIG_PATH_KEY;
use config_client::{ChannelKind, Registry};

#[derive(Parser)]
#[command(name = "config-client")]
#[command(about = "Runtime configuration client daemon", long_about = None)]
struct Args {
    /// Application name used to build document paths and topics
    #[arg(short, long, default_value = "application")]
    app: String,

    /// Bootstrap file (.toml or .properties); defaults to spring.cloud.bootstrap.location
    #[arg(short, long)]
    bootstrap: Option<PathBuf>,

    /// Prometheus exporter address, e.g. 0.0.0.0:9100
    #[arg(short, long)]
    metrics: Option<SocketAddr>,

    /// Default log filter when RUST_LOG is unset
    #[arg(short, long, default_value = "config_client=info")]
    log: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let log_handle = logging::init_logging(&args.log)?;

    tracing::info!("config-client v{} starting", env!("CARGO_PKG_VERSION"));

    if let Some(addr) = args.metrics {
        metrics::init_metrics(addr);
    }

    let env = Environment::from_process();
    let mut log_manager = FilterLogManager::new(log_handle);
    if let Some(dir) = env.get(SERVER_CONFIG_PATH_KEY) {
        log_manager = log_manager.with_local_filter(Path::new(&dir));
    }

    let mut builder = Registry::builder(&args.app)
        .environment(env)
        .log_manager(Arc::new(log_manager));
    if let Some(path) = args.bootstrap {
        builder = builder.bootstrap_path(path);
    }

    let registry = builder.init().await?;

    tracing::info!(
        application = %registry.application_name(),
        keys = registry.len(),
        config_channel = ?registry.channel_state(ChannelKind::Config),
        logger_channel = ?registry.channel_state(ChannelKind::Logger),
        secure_store_channel = ?registry.channel_state(ChannelKind::SecureStore),
        "Configuration loaded"
    );

    shutdown_signal().await;
    registry.close().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
