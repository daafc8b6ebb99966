use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info, warn};

use mongo_gateway::config::{CliOverrides, ConfigLoader, GatewayConfig};
use mongo_gateway::http_server::{build_router, serve, shutdown_signal};
use mongo_gateway::logging::{init_logging, LogConfig};
use mongo_gateway::{DocumentStore, Gateway, MongoStore};

const SAMPLE_CONFIG_PATH: &str = "mongo-gateway.toml.example";

/// HTTP-to-MongoDB gateway
#[derive(Parser, Debug)]
#[command(name = "mongo-gateway", version, about)]
struct Cli {
    /// Configuration file (toml, yaml or json)
    #[arg(short, long, env = "GATEWAY_CONFIG")]
    config: Option<String>,

    /// HTTP listen address, e.g. 0.0.0.0:8080
    #[arg(long, env = "GATEWAY_BIND_ADDR")]
    bind_addr: Option<String>,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URL")]
    mongodb_url: Option<String>,

    /// Log level or filter directive
    #[arg(long)]
    log_level: Option<String>,

    /// Write a sample configuration file and exit
    #[arg(long)]
    generate_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.generate_config {
        std::fs::write(SAMPLE_CONFIG_PATH, GatewayConfig::sample_toml()?)
            .with_context(|| format!("Failed to write {}", SAMPLE_CONFIG_PATH))?;
        println!("Sample configuration written to {}", SAMPLE_CONFIG_PATH);
        return Ok(());
    }

    let config = ConfigLoader::new()
        .load_from_file(cli.config.as_deref())
        .load_from_env()
        .load_from_cli(CliOverrides {
            bind_addr: cli.bind_addr,
            mongodb_url: cli.mongodb_url,
            log_level: cli.log_level,
        })
        .build()
        .context("Failed to load configuration")?;

    // Held until exit so buffered file logs are flushed
    let _log_guard = init_logging(&LogConfig::from_logging_config(&config.logging))?;
    info!("Configuration loaded");

    let addr = config.server.socket_addr()?;

    let store = match MongoStore::connect(&config.mongodb).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to MongoDB: {}", e);
            return Err(e).context("Failed to connect to MongoDB");
        }
    };
    let store: Arc<dyn DocumentStore> = Arc::new(store);

    let gateway = Arc::new(Gateway::new(store.clone()));
    let result = serve(
        addr,
        build_router(gateway, config.server.max_body_bytes),
        shutdown_signal(),
    )
    .await;

    if let Err(e) = store.close().await {
        warn!("Failed to close MongoDB connection: {}", e);
    }

    result.context("HTTP server error")?;
    info!("Server stopped");
    Ok(())
}
