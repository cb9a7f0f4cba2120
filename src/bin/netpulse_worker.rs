//! Worker binary: one `NodeWorker` owning a node's pinned-host capacity,
//! or a standalone `FifoWorker` draining the shared queue — selected by
//! `--role` (§4.3, §12).

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use netpulse::config::AppConfig;
use netpulse::driver;
use netpulse::model::DriverName;
use netpulse::store::{RedisStore, StateStore};
use netpulse::worker::fifo::FifoWorker;
use netpulse::worker::node::NodeWorker;

#[derive(Copy, Clone, Debug, ValueEnum)]
enum Role {
    Node,
    Fifo,
}

#[derive(Parser, Debug)]
#[command(name = "netpulse-worker", about = "NetPulse worker process")]
struct Args {
    #[arg(long, env = "NETPULSE_CONFIG")]
    config: Option<PathBuf>,

    /// Which queue this process consumes: a node's pinned-host capacity,
    /// or the shared FIFO queue.
    #[arg(long, value_enum)]
    role: Role,

    /// Node identity for `--role node`; defaults to the machine hostname.
    #[arg(long, env = "NETPULSE_HOSTNAME")]
    hostname: Option<String>,
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

    let hostname = match args.hostname {
        Some(h) => h,
        None => hostname::get()?.to_string_lossy().into_owned(),
    };

    let store: Arc<dyn StateStore> = Arc::new(RedisStore::connect(&config.store)?);

    match args.role {
        Role::Node => {
            let driver_factory: netpulse::worker::node::DriverFactory =
                Arc::new(|| driver::resolve(DriverName::Netmiko));
            let worker = NodeWorker::start(store, &config.worker, hostname, driver_factory).await?;
            worker.run().await;
        }
        Role::Fifo => {
            let worker = FifoWorker::start(store, &config.worker, hostname).await?;
            worker.run().await;
        }
    }

    Ok(())
}
