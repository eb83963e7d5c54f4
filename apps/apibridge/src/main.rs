use std::error::Error;
use std::sync::{Arc, RwLock};

use clap::Parser;
use tracing::info;

mod cli;
mod dsn;
mod router;

use apibridge_services::default_endpoints;
use apibridge_storage::BridgeStorage;

use crate::cli::{Cli, GlobalConfig};
use crate::dsn::resolve_dsn;
use crate::router::bridge_router;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("apibridge failed: {err}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn Error + Send + Sync>> {
    let cli = Cli::parse();
    let dsn = resolve_dsn(&cli.dsn, &cli.data_dir)?;
    let storage = BridgeStorage::connect(&dsn).await?;
    info!(dsn = %dsn, "db connected");
    storage.sync().await?;

    let defaults = default_endpoints();
    storage.ensure_endpoints(&defaults).await?;
    info!(endpoints = defaults.len(), "endpoint defaults ensured");

    let config = match storage.load_global_config().await? {
        Some(row) => serde_json::from_value(row.config_json)?,
        None => {
            let config = GlobalConfig {
                host: cli.host.clone(),
                port: cli.port,
                admin_key: cli.admin_key.clone(),
                dsn: dsn.clone(),
                proxy: cli.proxy.clone(),
            };
            storage
                .upsert_global_config(1, serde_json::to_value(&config)?)
                .await?;
            config
        }
    };
    info!(
        host = %config.host,
        port = config.port,
        proxy = %config.proxy.as_deref().unwrap_or(""),
        "config loaded"
    );

    let bind = format!("{}:{}", config.host, config.port);
    let app = bridge_router(storage, Arc::new(RwLock::new(config)));

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!(addr = %bind, "listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("apibridge=info,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
