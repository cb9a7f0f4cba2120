//! Worker runtime (§4.3): the three worker variants — [`node::NodeWorker`],
//! [`pinned::PinnedWorker`], [`fifo::FifoWorker`] — plus the shared
//! lifecycle they all build on: claiming a name, registering in the
//! worker registry, and heartbeating.
//!
//! Each worker is a single cooperative consumer of exactly one inbound
//! queue (§5); parallelism across hosts comes from running many worker
//! processes/tasks, never from threading a single worker's queue.

pub mod fifo;
pub mod node;
pub mod pinned;

use crate::error::{Error, Result};
use crate::store::{StateStore, WorkerRecord, WorkerState};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// How often a worker refreshes its registry heartbeat. The liveness
/// formula (§4.6, §11) adds a flat 5s grace on top of whichever TTL
/// applies, so this interval only needs to stay comfortably under that.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Shared bookkeeping every worker variant performs on start, each tick,
/// and on clean exit: present itself in the worker registry and keep its
/// heartbeat current.
pub struct WorkerIdentity {
    pub name: String,
    pub pid: u32,
    pub hostname: String,
    store: Arc<dyn StateStore>,
}

impl WorkerIdentity {
    /// Claim a worker name of the form `<hostname>[_<queue>]` (§4.3) and
    /// publish an initial `idle` registry record.
    pub async fn register(
        store: Arc<dyn StateStore>,
        hostname: &str,
        queue: Option<&str>,
        queues: Vec<String>,
    ) -> Result<Self> {
        let name = match queue {
            Some(q) => format!("{hostname}_{q}"),
            None => hostname.to_string(),
        };
        Self::register_named(store, name, hostname.to_string(), queues).await
    }

    /// Like [`Self::register`] but with an explicit worker name, used by
    /// `PinnedWorker` whose name (`<node>_<host>`) is not derived from its
    /// own hostname.
    pub async fn register_named(
        store: Arc<dyn StateStore>,
        name: String,
        hostname: String,
        queues: Vec<String>,
    ) -> Result<Self> {
        let pid = std::process::id();
        let now = chrono::Utc::now();
        store
            .register_worker(&WorkerRecord {
                name: name.clone(),
                state: WorkerState::Idle,
                last_heartbeat: now,
                birth: now,
                pid,
                queues,
                death_date: None,
                hostname: Some(hostname.to_string()),
                successful_job_count: 0,
                failed_job_count: 0,
            })
            .await?;
        Ok(Self {
            name,
            pid,
            hostname,
            store,
        })
    }

    pub async fn heartbeat(&self, state: WorkerState) -> Result<()> {
        self.store.heartbeat(&self.name, state).await
    }

    /// Mark this worker dead (`death_date` set) so the dispatcher's
    /// liveness check stops scheduling onto it. Called on clean shutdown;
    /// a crashed worker is instead discovered and force-deleted by the
    /// dispatcher via the missed-heartbeat path.
    pub async fn retire(&self) -> Result<()> {
        self.store.mark_worker_dead(&self.name).await
    }

    /// Spawn a background heartbeat loop. The returned handle is aborted
    /// when the worker shuts down.
    pub fn spawn_heartbeat_loop(self: &Arc<Self>) -> tokio::task::JoinHandle<()> {
        let identity = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(HEARTBEAT_INTERVAL);
            loop {
                ticker.tick().await;
                if let Err(e) = identity.heartbeat(WorkerState::Idle).await {
                    warn!(worker = %identity.name, error = %e, "heartbeat write failed");
                }
            }
        })
    }
}

/// Acquire an exclusive, non-blocking filesystem lock at `path`, retrying
/// until `timeout` elapses (§4.3: `node.lock`/`fifo.lock`, 3s budget).
/// The returned file must be kept alive for as long as the lock should be
/// held; dropping it releases the lock.
pub async fn acquire_singleton_lock(path: &std::path::Path, timeout: Duration) -> Result<std::fs::File> {
    use nix::fcntl::{flock, FlockArg};
    use std::os::unix::io::AsRawFd;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(Error::Io)?;
    }
    let file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .open(path)
        .map_err(Error::Io)?;

    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        match flock(file.as_raw_fd(), FlockArg::LockExclusiveNonblock) {
            Ok(()) => {
                debug!(lock = %path.display(), "acquired singleton lock");
                return Ok(file);
            }
            Err(_) if tokio::time::Instant::now() < deadline => {
                tokio::time::sleep(Duration::from_millis(100)).await;
            }
            Err(e) => {
                return Err(Error::Config(format!(
                    "failed to acquire lock {}: {e}",
                    path.display()
                )));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    #[tokio::test]
    async fn register_claims_hostname_plus_queue_name() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let identity = WorkerIdentity::register(store.clone(), "node-a", Some("FifoQ"), vec!["FifoQ".into()])
            .await
            .unwrap();
        assert_eq!(identity.name, "node-a_FifoQ");
        let record = store.get_worker("node-a_FifoQ").await.unwrap().unwrap();
        assert_eq!(record.state, WorkerState::Idle);
    }

    #[tokio::test]
    async fn retire_sets_death_date() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let identity = WorkerIdentity::register(store.clone(), "node-a", None, vec![])
            .await
            .unwrap();
        identity.retire().await.unwrap();
        let record = store.get_worker("node-a").await.unwrap().unwrap();
        assert!(record.death_date.is_some());
    }

    #[tokio::test]
    async fn lock_is_exclusive_within_timeout() {
        let dir = std::env::temp_dir().join(format!("netpulse-lock-test-{}", std::process::id()));
        let lock_path = dir.join("node.lock");
        let _first = acquire_singleton_lock(&lock_path, Duration::from_millis(500))
            .await
            .unwrap();
        let second = acquire_singleton_lock(&lock_path, Duration::from_millis(300)).await;
        assert!(second.is_err());
    }
}
