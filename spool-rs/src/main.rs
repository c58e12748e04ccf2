use anyhow::Context;
use clap::Parser;
use spool_rs::config::{Config, LoggingConfig};
use spool_rs::protocol::MailServer;
use std::path::PathBuf;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "spool-rs")]
#[command(about = "Line-protocol mailbox server", long_about = None)]
struct Cli {
    /// Configuration file, used only if it exists
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Override the listen address
    #[arg(short, long)]
    listen: Option<String>,
}

fn init_logging(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&logging.level));

    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        "compact" => builder.compact().init(),
        _ => builder.pretty().init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let mut config = if cli.config.exists() {
        Config::from_file(&cli.config)
            .with_context(|| format!("Failed to load {}", cli.config.display()))?
    } else {
        Config::default()
    };

    if let Some(listen) = cli.listen {
        config.server.listen_addr = listen;
    }

    init_logging(&config.logging);

    info!("Starting spool-rs server");
    if !cli.config.exists() {
        info!("No config file found, using defaults");
    }
    info!("  Listening on: {}", config.server.listen_addr);
    info!("  Spool path: {}", config.storage.spool_path);
    info!("  Directory backend: {:?}", config.directory.backend);

    let server = MailServer::from_config(&config)
        .await
        .context("Failed to initialise server")?;

    let shutdown = server.shutdown_token();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Interrupt received, shutting down");
                shutdown.cancel();
            }
            Err(e) => error!("Failed to listen for interrupt: {}", e),
        }
    });

    server.run().await.context("Server terminated with an error")?;

    info!("Clean shutdown");
    Ok(())
}
