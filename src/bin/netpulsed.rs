//! Controller binary: loads configuration, wires a [`Manager`] onto a
//! [`StateStore`], and serves the REST API until SIGINT/SIGTERM.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use netpulse::api::{self, ApiServerConfig, AppState};
use netpulse::config::AppConfig;
use netpulse::manager::Manager;
use netpulse::store::{RedisStore, StateStore};

#[derive(Parser, Debug)]
#[command(name = "netpulsed", about = "NetPulse controller: dispatcher + REST API")]
struct Args {
    /// Path to a YAML config file; falls back to `config/config.yaml` then
    /// environment variables (`NETPULSE_*`) and struct defaults.
    #[arg(long, env = "NETPULSE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = AppConfig::load(args.config.as_deref())?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log.level)),
        )
        .init();

    let store: Arc<dyn StateStore> = Arc::new(RedisStore::connect(&config.store)?);
    let manager = Arc::new(Manager::new(store.clone(), config.job.clone(), config.worker.clone()));
    let state = Arc::new(AppState::new(
        manager,
        store,
        ApiServerConfig {
            api_key: config.server.api_key.clone(),
            api_key_name: config.server.api_key_name.clone(),
        },
    ));

    let bind = format!("{}:{}", config.server.host, config.server.port).parse()?;
    api::serve(bind, state, shutdown_signal()).await?;
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install SIGINT handler");
    tracing::info!("shutdown signal received");
}
