//! [`NodeWorker`]: one per physical/virtual node, owns up to `capacity`
//! [`super::pinned::PinnedWorker`] tasks and the `host_to_node_map`/
//! `node_info_map` entries that describe them (§4.3).
//!
//! `§9`'s "child-process supervision" design note offers a choice between
//! OS-level forking and in-process tasks for the pinned consumers; this
//! implementation takes the task route (tokio tasks instead of forked
//! processes, tracked in a process-local `JoinHandle` table) since the
//! external contract — exactly one consumer of `HostQ_<host>` at a time —
//! does not depend on OS isolation and async tasks are the idiomatic
//! primitive here (see `DESIGN.md`).
//!
//! `NodeQ_<hostname>` carries control-plane tasks, not `ExecutionRequest`
//! jobs, so this module talks to the [`StateStore`]'s list primitives
//! directly rather than through the `queue::Queue`/`Job` abstraction that
//! `HostQ_*`/`FifoQ` use.

use crate::config::WorkerConfig;
use crate::driver::Driver;
use crate::error::{Error, Result};
use crate::model::NodeInfo;
use crate::store::{keys, PipelineOp, StateStore};
use crate::worker::pinned::PinnedWorker;
use crate::worker::WorkerIdentity;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Control-plane tasks a `NodeWorker` handles on its own `NodeQ_<hostname>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeTask {
    /// Bind `host` to this node and spawn its `PinnedWorker`.
    Spawn { host: String },
    /// A previously spawned `PinnedWorker` for `host` exited; release its
    /// slot. Enqueued by the node's own exit-watch loop so it serializes
    /// with pin requests through the single-consumer queue (§11).
    CleanupHost { host: String },
    /// Stop consuming and tear down all owned state.
    Shutdown,
}

/// Factory for the `Driver` a newly spawned `PinnedWorker` should use.
/// Boxed so `NodeWorker` stays independent of any concrete protocol.
pub type DriverFactory = Arc<dyn Fn() -> Box<dyn Driver> + Send + Sync>;

pub struct NodeWorker {
    pub hostname: String,
    store: Arc<dyn StateStore>,
    node_queue_name: String,
    identity: Arc<WorkerIdentity>,
    driver_factory: DriverFactory,
    /// Process-local host -> pinned worker task handle. Authoritative for
    /// "already pinned in this process" idempotency checks; the shared
    /// `host_to_node_map` in the store is authoritative across nodes.
    pinned: HashMap<String, JoinHandle<()>>,
    exit_tx: mpsc::Sender<String>,
    exit_rx: mpsc::Receiver<String>,
    _lock_file: std::fs::File,
}

impl NodeWorker {
    /// Boot sequence (§11): acquire `node.lock` -> clean up any stale
    /// bindings left by a previous crashed instance of this hostname ->
    /// pipeline-rewrite `node_info_map[hostname]` with `count=0` -> begin
    /// consuming `NodeQ_<hostname>`.
    pub async fn start(
        store: Arc<dyn StateStore>,
        config: &WorkerConfig,
        hostname: String,
        driver_factory: DriverFactory,
    ) -> Result<Self> {
        let lock_path = config.lock_dir.join("node.lock");
        let lock_file =
            crate::worker::acquire_singleton_lock(&lock_path, std::time::Duration::from_secs(3))
                .await?;

        Self::cleanup_stale_bindings(&store, &hostname).await?;

        let node_info = NodeInfo::new(&hostname, config.pinned_per_node, keys::node_queue_name(&hostname));
        let node_info_json = serde_json::to_string(&node_info)?;
        store
            .commit_pipeline(vec![
                PipelineOp::HDel {
                    key: keys::NODE_INFO_MAP.to_string(),
                    field: hostname.clone(),
                },
                PipelineOp::HSet {
                    key: keys::NODE_INFO_MAP.to_string(),
                    field: hostname.clone(),
                    value: node_info_json,
                },
            ])
            .await?;

        let node_queue_name = keys::node_queue_name(&hostname);
        let identity = Arc::new(
            WorkerIdentity::register(
                store.clone(),
                &hostname,
                Some(&node_queue_name),
                vec![node_queue_name.clone()],
            )
            .await?,
        );
        identity.spawn_heartbeat_loop();

        let (exit_tx, exit_rx) = mpsc::channel(64);

        info!(%hostname, capacity = config.pinned_per_node, "node worker started");
        Ok(Self {
            hostname,
            store,
            node_queue_name,
            identity,
            driver_factory,
            pinned: HashMap::new(),
            exit_tx,
            exit_rx,
            _lock_file: lock_file,
        })
    }

    /// Enumerate hosts this hostname owned before a crash and release
    /// them: clear the binding and mark any lingering pinned-worker
    /// registry record dead so the dispatcher's liveness check does not
    /// wait on a process that is gone.
    async fn cleanup_stale_bindings(store: &Arc<dyn StateStore>, hostname: &str) -> Result<()> {
        let bindings = store.hgetall(keys::HOST_TO_NODE_MAP).await?;
        let mut ops = Vec::new();
        for (host, owner) in bindings {
            if owner != hostname {
                continue;
            }
            let worker_name = pinned_worker_name(hostname, &host);
            store.mark_worker_dead(&worker_name).await.ok();
            ops.push(PipelineOp::HDel {
                key: keys::HOST_TO_NODE_MAP.to_string(),
                field: host,
            });
        }
        if !ops.is_empty() {
            store.commit_pipeline(ops).await?;
        }
        Ok(())
    }

    /// Push a control-plane task onto `NodeQ_<hostname>` from the outside
    /// (the dispatcher uses this to request a `Spawn`).
    pub async fn submit(store: &dyn StateStore, hostname: &str, task: &NodeTask) -> Result<()> {
        store
            .push(&keys::node_queue_name(hostname), &serde_json::to_string(task)?)
            .await
    }

    /// Main loop: pop `NodeTask`s and apply them one at a time. Per-queue
    /// FIFO (§5) is what keeps `Spawn` and `CleanupHost` requests for the
    /// same node from racing each other.
    pub async fn run(mut self) {
        loop {
            tokio::select! {
                dead_host = self.exit_rx.recv() => {
                    if let Some(host) = dead_host {
                        if let Err(e) = self.enqueue_cleanup(&host).await {
                            error!(%host, error = %e, "failed to enqueue pinned-worker cleanup task");
                        }
                    }
                }
                popped = self.store.pop(&self.node_queue_name) => {
                    match popped {
                        Ok(Some(raw)) => {
                            match serde_json::from_str::<NodeTask>(&raw) {
                                Ok(task) => {
                                    let stop = matches!(task, NodeTask::Shutdown);
                                    self.handle(task).await;
                                    if stop {
                                        break;
                                    }
                                }
                                Err(e) => warn!(error = %e, "unparsable node task"),
                            }
                        }
                        Ok(None) => {
                            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                        }
                        Err(e) => warn!(error = %e, "node queue read failed"),
                    }
                }
            }
        }
        self.shutdown().await;
    }

    async fn handle(&mut self, task: NodeTask) {
        match task {
            NodeTask::Spawn { host } => {
                if let Err(e) = self.handle_spawn(host.clone()).await {
                    warn!(%host, error = %e, "spawn request failed");
                }
            }
            NodeTask::CleanupHost { host } => {
                if let Err(e) = self.handle_cleanup(&host).await {
                    warn!(%host, error = %e, "pinned-worker cleanup failed");
                }
            }
            NodeTask::Shutdown => {}
        }
    }

    /// Exact ordering from §11: local idempotency check, re-read
    /// capacity, claim via `HSetNX`, spawn, roll back the claim if the
    /// spawn fails, only increment `count` once the spawn is confirmed.
    pub async fn handle_spawn(&mut self, host: String) -> Result<()> {
        if self.pinned.contains_key(&host) {
            return Ok(());
        }

        let node_info = self.read_node_info().await?;
        if !node_info.has_capacity() {
            return Err(Error::NodePreempted(self.hostname.clone()));
        }

        let claimed = self
            .store
            .hsetnx(keys::HOST_TO_NODE_MAP, &host, &self.hostname)
            .await?;
        if !claimed {
            return Err(Error::HostAlreadyPinned(host));
        }

        let handle = match self.spawn_pinned(host.clone()) {
            Ok(h) => h,
            Err(e) => {
                self.store.hdel(keys::HOST_TO_NODE_MAP, &host).await.ok();
                return Err(e);
            }
        };
        self.pinned.insert(host.clone(), handle);

        let mut node_info = node_info;
        node_info.count += 1;
        self.persist_node_info(&node_info).await?;
        info!(%host, node = %self.hostname, count = node_info.count, "host pinned");
        Ok(())
    }

    fn spawn_pinned(&self, host: String) -> Result<JoinHandle<()>> {
        let store = self.store.clone();
        let driver = (self.driver_factory)();
        let node_hostname = self.hostname.clone();
        let exit_tx = self.exit_tx.clone();
        let worker_name = pinned_worker_name(&node_hostname, &host);
        let host_for_task = host.clone();
        Ok(tokio::spawn(async move {
            match PinnedWorker::start(store, &host_for_task, worker_name, driver).await {
                Ok(worker) => worker.run().await,
                Err(e) => error!(host = %host_for_task, error = %e, "pinned worker failed to start"),
            }
            let _ = exit_tx.send(host_for_task).await;
        }))
    }

    async fn enqueue_cleanup(&self, host: &str) -> Result<()> {
        Self::submit(
            self.store.as_ref(),
            &self.hostname,
            &NodeTask::CleanupHost {
                host: host.to_string(),
            },
        )
        .await
    }

    pub async fn handle_cleanup(&mut self, host: &str) -> Result<()> {
        self.pinned.remove(host);
        let owner = self.store.hget(keys::HOST_TO_NODE_MAP, host).await?;
        if owner.as_deref() != Some(self.hostname.as_str()) {
            return Ok(());
        }
        self.store.hdel(keys::HOST_TO_NODE_MAP, host).await?;
        let mut node_info = self.read_node_info().await?;
        node_info.count = node_info.count.saturating_sub(1);
        self.persist_node_info(&node_info).await?;
        info!(%host, node = %self.hostname, count = node_info.count, "host unpinned");
        Ok(())
    }

    async fn read_node_info(&self) -> Result<NodeInfo> {
        let raw = self
            .store
            .hget(keys::NODE_INFO_MAP, &self.hostname)
            .await?
            .ok_or_else(|| Error::Store(format!("missing NodeInfo for {}", self.hostname)))?;
        Ok(serde_json::from_str(&raw)?)
    }

    async fn persist_node_info(&self, node_info: &NodeInfo) -> Result<()> {
        self.store
            .hset(
                keys::NODE_INFO_MAP,
                &self.hostname,
                &serde_json::to_string(node_info)?,
            )
            .await
    }

    /// Clean shutdown (§4.3): stop consuming, pipeline-delete every
    /// binding this node owns plus its own `NodeInfo`, and send shutdown
    /// commands to each `PinnedWorker` still registered.
    async fn shutdown(mut self) {
        let hosts: Vec<String> = self.pinned.keys().cloned().collect();
        for handle in self.pinned.values() {
            handle.abort();
        }
        self.pinned.clear();

        let mut ops = vec![PipelineOp::HDel {
            key: keys::NODE_INFO_MAP.to_string(),
            field: self.hostname.clone(),
        }];
        for host in &hosts {
            ops.push(PipelineOp::HDel {
                key: keys::HOST_TO_NODE_MAP.to_string(),
                field: host.clone(),
            });
        }
        if let Err(e) = self.store.commit_pipeline(ops).await {
            error!(error = %e, "shutdown pipeline failed");
        }
        for host in &hosts {
            let worker_name = pinned_worker_name(&self.hostname, host);
            self.store.mark_worker_dead(&worker_name).await.ok();
        }
        if let Err(e) = self.identity.retire().await {
            error!(error = %e, "failed to retire node worker registration");
        }
        info!(hostname = %self.hostname, "node worker shut down cleanly");
    }
}

/// Worker-registry name for the `PinnedWorker` owning `host`.
pub fn pinned_worker_name(node_hostname: &str, host: &str) -> String {
    format!("{node_hostname}_{host}")
}

/// Worker-registry name a `NodeWorker` registers itself under (see
/// `WorkerIdentity::register`'s `<hostname>_<queue>` convention applied to
/// its own `NodeQ_<hostname>`).
pub fn node_worker_name(hostname: &str) -> String {
    format!("{hostname}_{}", keys::node_queue_name(hostname))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::NoopDriver;
    use crate::store::MemoryStore;

    fn factory() -> DriverFactory {
        Arc::new(|| Box::new(NoopDriver::default()) as Box<dyn Driver>)
    }

    fn test_config() -> WorkerConfig {
        let mut cfg = WorkerConfig::default();
        cfg.lock_dir = std::env::temp_dir().join(format!("netpulse-node-test-{}", uuid::Uuid::new_v4()));
        cfg
    }

    #[tokio::test]
    async fn start_creates_node_info_with_zero_count() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let cfg = test_config();
        let node = NodeWorker::start(store.clone(), &cfg, "node-a".into(), factory())
            .await
            .unwrap();

        let info: NodeInfo = serde_json::from_str(
            &store
                .hget(keys::NODE_INFO_MAP, "node-a")
                .await
                .unwrap()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(info.count, 0);
        assert_eq!(info.capacity, cfg.pinned_per_node);
        drop(node);
    }

    #[tokio::test]
    async fn spawn_respects_capacity() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let mut cfg = test_config();
        cfg.pinned_per_node = 1;
        let mut node = NodeWorker::start(store.clone(), &cfg, "node-a".into(), factory())
            .await
            .unwrap();

        node.handle_spawn("10.0.0.1".into()).await.unwrap();
        let err = node.handle_spawn("10.0.0.2".into()).await.unwrap_err();
        assert!(matches!(err, Error::NodePreempted(_)));
    }

    #[tokio::test]
    async fn spawn_is_idempotent_for_already_pinned_host_in_process() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let cfg = test_config();
        let mut node = NodeWorker::start(store.clone(), &cfg, "node-a".into(), factory())
            .await
            .unwrap();

        node.handle_spawn("10.0.0.1".into()).await.unwrap();
        assert!(node.handle_spawn("10.0.0.1".into()).await.is_ok());
    }

    #[tokio::test]
    async fn spawn_fails_when_host_already_bound_elsewhere() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let cfg = test_config();
        store
            .hsetnx(keys::HOST_TO_NODE_MAP, "10.0.0.1", "other-node")
            .await
            .unwrap();
        let mut node = NodeWorker::start(store.clone(), &cfg, "node-a".into(), factory())
            .await
            .unwrap();

        let err = node.handle_spawn("10.0.0.1".into()).await.unwrap_err();
        assert!(matches!(err, Error::HostAlreadyPinned(_)));
    }

    #[tokio::test]
    async fn cleanup_decrements_count_and_clears_binding() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let cfg = test_config();
        let mut node = NodeWorker::start(store.clone(), &cfg, "node-a".into(), factory())
            .await
            .unwrap();
        node.handle_spawn("10.0.0.1".into()).await.unwrap();
        node.handle_cleanup("10.0.0.1").await.unwrap();

        let info: NodeInfo = serde_json::from_str(
            &store.hget(keys::NODE_INFO_MAP, "node-a").await.unwrap().unwrap(),
        )
        .unwrap();
        assert_eq!(info.count, 0);
        assert!(store.hget(keys::HOST_TO_NODE_MAP, "10.0.0.1").await.unwrap().is_none());
    }
}
