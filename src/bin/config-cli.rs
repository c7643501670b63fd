use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Map, Value};

use config_client::config::Environment;
use config_client::crypto::{AesGcmCipher, CipherGateway};
use config_client::lifecycle::signals::shutdown_signal;
use config_client::{Registry, View};

#[derive(Parser)]
#[command(name = "config-cli")]
#[command(about = "Inspect the config service and manage encrypted values", long_about = None)]
struct Cli {
    /// Application name used to build document paths
    #[arg(short, long, default_value = "application")]
    app: String,

    /// Bootstrap file (.toml or .properties); defaults to spring.cloud.bootstrap.location
    #[arg(short, long)]
    bootstrap: Option<PathBuf>,

    /// Base64 cipher key; defaults to config.cipher.key
    #[arg(short, long)]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a new random cipher key
    GenKey,
    /// Encrypt a value and print it with the {cipher} marker
    Encrypt { value: String },
    /// Decrypt a {cipher} value
    Decrypt { value: String },
    /// Refresh and print one key
    Get { key: String },
    /// Refresh and print all keys, optionally filtered by prefix
    List {
        #[arg(short, long)]
        prefix: Option<String>,
    },
    /// Print a raw resource from the config service
    Fetch { path: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let env = Environment::from_process();

    let cipher = || -> Result<CipherGateway, Box<dyn std::error::Error>> {
        match &cli.key {
            Some(key) => Ok(CipherGateway::new(AesGcmCipher::from_base64(key)?)),
            None => Ok(CipherGateway::from_environment(&env)?),
        }
    };

    match &cli.command {
        Commands::GenKey => {
            println!("{}", AesGcmCipher::encode_key(&AesGcmCipher::generate_key()));
            return Ok(());
        }
        Commands::Encrypt { value } => {
            println!("{}", cipher()?.encrypt(value)?);
            return Ok(());
        }
        Commands::Decrypt { value } => {
            println!("{}", cipher()?.decrypt(value)?);
            return Ok(());
        }
        _ => {}
    }

    let mut builder = Registry::builder(&cli.app).cipher(cipher()?);
    if let Some(path) = &cli.bootstrap {
        builder = builder.bootstrap_path(path.clone());
    }
    let registry = builder.build()?;
    let interrupt = spawn_interrupt(registry.clone());

    match &cli.command {
        Commands::Get { key } => {
            registry.refresh().await?;
            match registry.get(key).value(View::Shared) {
                Some(value) => println!("{}", value),
                None => eprintln!("{} is not set", key),
            }
        }
        Commands::List { prefix } => {
            registry.refresh().await?;
            let entries: Map<String, Value> = registry
                .get_all(prefix.as_deref())
                .into_iter()
                .map(|cell| {
                    let value = cell.value(View::Shared).map_or(Value::Null, Value::String);
                    (cell.key().to_string(), value)
                })
                .collect();
            println!("{}", serde_json::to_string_pretty(&json!(entries))?);
        }
        Commands::Fetch { path } => {
            let body = registry.fetch_content(path).await?;
            println!("{}", String::from_utf8_lossy(&body));
        }
        Commands::GenKey | Commands::Encrypt { .. } | Commands::Decrypt { .. } => {}
    }

    interrupt.abort();
    registry.close().await;
    Ok(())
}

/// Ctrl+C cancels a fetch that is stuck retrying.
fn spawn_interrupt(registry: Arc<Registry>) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        shutdown_signal().await;
        eprintln!("Interrupted");
        registry.close().await;
    })
}
