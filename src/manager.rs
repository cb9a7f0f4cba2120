//! The dispatcher (§4.6): turns an [`ExecutionRequest`] into a queued
//! [`Job`] on the right queue, running the FIFO or PINNED assignment
//! lifecycle and absorbing the node-churn errors a `NodeWorker` can raise
//! along the way.

use crate::config::{JobConfig, WorkerConfig};
use crate::error::{Error, Result};
use crate::model::{BatchFailedItem, ExecutionRequest, Job, JobStatus, NodeInfo, QueueStrategy};
use crate::queue::{EnqueueOptions, Queue};
use crate::scheduler;
use crate::store::{keys, PipelineOp, StateStore, WorkerRecord};
use crate::worker::node::{self, NodeTask, NodeWorker};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// §11: the `NodePreempted` retry loop in `DispatchRPCJob` gives up after
/// this many attempts.
const MAX_RETRIES: usize = 3;

pub struct Manager {
    store: Arc<dyn StateStore>,
    job_config: JobConfig,
    worker_config: WorkerConfig,
}

impl Manager {
    pub fn new(store: Arc<dyn StateStore>, job_config: JobConfig, worker_config: WorkerConfig) -> Self {
        Self {
            store,
            job_config,
            worker_config,
        }
    }

    /// `ExecuteOnDevice` (§4.6): validate, pick a strategy, dispatch.
    pub async fn execute_on_device(&self, req: ExecutionRequest, opts: EnqueueOptions) -> Result<Job> {
        let req = req.validate_and_normalize()?;
        self.dispatch_rpc_job(req, opts).await
    }

    /// `ExecuteOnBulkDevices` (§4.6).
    pub async fn execute_on_bulk_devices(
        &self,
        reqs: Vec<ExecutionRequest>,
        opts: EnqueueOptions,
    ) -> Result<(Vec<Job>, Vec<BatchFailedItem>)> {
        let mut normalized = Vec::with_capacity(reqs.len());
        let mut failed = Vec::new();
        for req in reqs {
            let host = req.host().unwrap_or_default().to_string();
            match req.validate_and_normalize() {
                Ok(r) => normalized.push(r),
                Err(e) => failed.push(BatchFailedItem {
                    host,
                    reason: e.to_string(),
                }),
            }
        }
        let (mut succeeded, mut more_failed) = self.dispatch_bulk_rpc_jobs(normalized, opts).await?;
        failed.append(&mut more_failed);
        succeeded.sort_by(|a, b| a.id.cmp(&b.id));
        Ok((succeeded, failed))
    }

    pub async fn dispatch_rpc_job(&self, payload: ExecutionRequest, opts: EnqueueOptions) -> Result<Job> {
        match payload.queue_strategy() {
            QueueStrategy::Fifo => self.dispatch_fifo(payload, opts).await,
            QueueStrategy::Pinned => self.dispatch_pinned(payload, opts).await,
        }
    }

    async fn dispatch_fifo(&self, payload: ExecutionRequest, opts: EnqueueOptions) -> Result<Job> {
        if !self.fifo_has_live_worker().await? {
            return Err(Error::WorkerUnavailable("no live FifoQ worker".into()));
        }
        Queue::fifo(self.store.clone()).enqueue(payload, opts).await
    }

    /// Steps 1-5 of §4.6's PINNED lifecycle.
    async fn dispatch_pinned(&self, payload: ExecutionRequest, opts: EnqueueOptions) -> Result<Job> {
        let host = payload
            .host()
            .ok_or_else(|| Error::Validation("pinned dispatch requires connection_args.host".into()))?
            .to_string();

        let node_hostname = self.assign_node(&host).await?;

        if !self.host_has_live_worker(&node_hostname, &host).await? {
            NodeWorker::submit(self.store.as_ref(), &node_hostname, &NodeTask::Spawn { host: host.clone() })
                .await?;
        }
        Queue::host(self.store.clone(), &host).enqueue(payload, opts).await
    }

    /// Resolve which node owns (or should own) `host`, retrying through
    /// dead-node recovery up to [`MAX_RETRIES`] times (§4.6 step 2).
    async fn assign_node(&self, host: &str) -> Result<String> {
        for _ in 0..MAX_RETRIES {
            if let Some(owner) = self.store.hget(keys::HOST_TO_NODE_MAP, host).await? {
                if self.node_has_live_worker(&owner).await? {
                    return Ok(owner);
                }
                self.force_delete_node(&owner).await?;
                continue;
            }

            let nodes = self.all_nodes().await?;
            let selected = scheduler::resolve(&self.worker_config.scheduler)?.select_one(&nodes, host)?;
            if self.node_has_live_worker(&selected.hostname).await? {
                return Ok(selected.hostname);
            }
            self.force_delete_node(&selected.hostname).await?;
        }
        Err(Error::WorkerUnavailable(format!(
            "no live node available for {host} after {MAX_RETRIES} attempts"
        )))
    }

    /// `DispatchBulkRPCJobs` (§4.6).
    pub async fn dispatch_bulk_rpc_jobs(
        &self,
        payloads: Vec<ExecutionRequest>,
        opts: EnqueueOptions,
    ) -> Result<(Vec<Job>, Vec<BatchFailedItem>)> {
        let mut fifo_payloads = Vec::new();
        let mut pinned_payloads = Vec::new();
        for p in payloads {
            match p.queue_strategy() {
                QueueStrategy::Fifo => fifo_payloads.push(p),
                QueueStrategy::Pinned => pinned_payloads.push(p),
            }
        }

        let mut succeeded = Vec::new();
        let mut failed = Vec::new();

        if !fifo_payloads.is_empty() {
            if self.fifo_has_live_worker().await? {
                succeeded.extend(
                    Queue::fifo(self.store.clone())
                        .enqueue_many(fifo_payloads, opts.clone())
                        .await?,
                );
            } else {
                for p in fifo_payloads {
                    failed.push(BatchFailedItem {
                        host: p.host().unwrap_or_default().to_string(),
                        reason: "no live FifoQ worker".into(),
                    });
                }
            }
        }

        if pinned_payloads.is_empty() {
            return Ok((succeeded, failed));
        }

        let host_node = self.assign_nodes_batch(&pinned_payloads, &mut failed).await?;
        self.spawn_missing_pinned_workers(&host_node).await;

        for payload in pinned_payloads {
            let Some(host) = payload.host().map(str::to_string) else {
                continue;
            };
            if !host_node.contains_key(&host) {
                continue;
            }
            match Queue::host(self.store.clone(), &host)
                .enqueue(payload, opts.clone())
                .await
            {
                Ok(job) => succeeded.push(job),
                Err(e) => failed.push(BatchFailedItem {
                    host,
                    reason: e.to_string(),
                }),
            }
        }

        Ok((succeeded, failed))
    }

    /// Partition `payloads`' hosts into already-assigned vs. unassigned,
    /// then `BatchNodeSelect` the unassigned ones (§4.6).
    async fn assign_nodes_batch(
        &self,
        payloads: &[ExecutionRequest],
        failed: &mut Vec<BatchFailedItem>,
    ) -> Result<HashMap<String, String>> {
        let mut host_node = HashMap::new();
        let mut unassigned = Vec::new();

        for p in payloads {
            let Some(host) = p.host() else {
                failed.push(BatchFailedItem {
                    host: String::new(),
                    reason: "pinned dispatch requires connection_args.host".into(),
                });
                continue;
            };
            if let Some(owner) = self.store.hget(keys::HOST_TO_NODE_MAP, host).await? {
                if self.node_has_live_worker(&owner).await? {
                    host_node.insert(host.to_string(), owner);
                    continue;
                }
                self.force_delete_node(&owner).await?;
            }
            unassigned.push(host.to_string());
        }

        if !unassigned.is_empty() {
            let nodes = self.all_nodes().await?;
            match scheduler::resolve(&self.worker_config.scheduler)?.select_batch(&nodes, unassigned.len()) {
                Ok(selected) => {
                    for (host, node) in unassigned.into_iter().zip(selected.into_iter()) {
                        host_node.insert(host, node.hostname);
                    }
                }
                Err(e) => {
                    for host in unassigned {
                        failed.push(BatchFailedItem {
                            host,
                            reason: e.to_string(),
                        });
                    }
                }
            }
        }

        Ok(host_node)
    }

    async fn spawn_missing_pinned_workers(&self, host_node: &HashMap<String, String>) {
        for (host, node_hostname) in host_node {
            match self.host_has_live_worker(node_hostname, host).await {
                Ok(true) => {}
                Ok(false) => {
                    if let Err(e) =
                        NodeWorker::submit(self.store.as_ref(), node_hostname, &NodeTask::Spawn { host: host.clone() })
                            .await
                    {
                        warn!(%host, error = %e, "failed to submit spawn task during bulk dispatch");
                    }
                }
                Err(e) => warn!(%host, error = %e, "failed to check pinned worker liveness"),
            }
        }
    }

    async fn all_nodes(&self) -> Result<Vec<NodeInfo>> {
        let raw = self.store.hgetall(keys::NODE_INFO_MAP).await?;
        raw.into_iter()
            .map(|(_, v)| serde_json::from_str(&v).map_err(Error::from))
            .collect()
    }

    async fn node_has_live_worker(&self, node_hostname: &str) -> Result<bool> {
        Ok(self
            .store
            .get_worker(&node::node_worker_name(node_hostname))
            .await?
            .map(|w| w.is_alive(self.job_config.timeout, self.worker_config.ttl))
            .unwrap_or(false))
    }

    async fn host_has_live_worker(&self, node_hostname: &str, host: &str) -> Result<bool> {
        Ok(self
            .store
            .get_worker(&node::pinned_worker_name(node_hostname, host))
            .await?
            .map(|w| w.is_alive(self.job_config.timeout, self.worker_config.ttl))
            .unwrap_or(false))
    }

    async fn fifo_has_live_worker(&self) -> Result<bool> {
        let fifo = keys::fifo_queue_name();
        Ok(self.store.list_workers().await?.iter().any(|w| {
            w.queues.iter().any(|q| *q == fifo) && w.is_alive(self.job_config.timeout, self.worker_config.ttl)
        }))
    }

    /// Force-delete (§4.6, §11): pipeline-delete every binding this dead
    /// node owns plus its `NodeInfo`, then mark the orphaned
    /// `PinnedWorker`/`NodeWorker` registry records dead so no later
    /// liveness check waits on them again.
    async fn force_delete_node(&self, node_hostname: &str) -> Result<()> {
        let bindings = self.store.hgetall(keys::HOST_TO_NODE_MAP).await?;
        let affected: Vec<String> = bindings
            .into_iter()
            .filter(|(_, owner)| owner == node_hostname)
            .map(|(host, _)| host)
            .collect();

        let mut ops: Vec<PipelineOp> = affected
            .iter()
            .map(|host| PipelineOp::HDel {
                key: keys::HOST_TO_NODE_MAP.to_string(),
                field: host.clone(),
            })
            .collect();
        ops.push(PipelineOp::HDel {
            key: keys::NODE_INFO_MAP.to_string(),
            field: node_hostname.to_string(),
        });
        self.store.commit_pipeline(ops).await?;

        for host in &affected {
            self.store
                .mark_worker_dead(&node::pinned_worker_name(node_hostname, host))
                .await
                .ok();
        }
        self.store
            .mark_worker_dead(&node::node_worker_name(node_hostname))
            .await
            .ok();
        warn!(node = %node_hostname, affected = affected.len(), "force-deleted stale node state");
        Ok(())
    }

    /// `GetJobListByIds`: fetch-many, silently dropping ids that no
    /// longer resolve (§6 `GET /job?id=`, §7 `JobOperationError`).
    pub async fn get_job(&self, id: &str) -> Result<Option<Job>> {
        // The id alone doesn't carry which queue a job lives on, so every
        // known queue is probed; a job key is unique across queues.
        for queue_name in self.known_queue_names().await? {
            if let Some(job) = Queue::new(self.store.clone(), queue_name).fetch(id).await? {
                return Ok(Some(job));
            }
        }
        Ok(None)
    }

    /// `GetJobList` (§6 `GET /job?queue=&status=&node=&host=`). A `None`
    /// queue searches every queue this dispatcher currently knows about.
    pub async fn list_jobs(&self, queue: Option<&str>, status: Option<JobStatus>) -> Result<Vec<Job>> {
        let queues = match queue {
            Some(q) => vec![q.to_string()],
            None => self.known_queue_names().await?,
        };
        let statuses = match status {
            Some(s) => vec![s],
            None => vec![
                JobStatus::Queued,
                JobStatus::Started,
                JobStatus::Finished,
                JobStatus::Failed,
                JobStatus::Canceled,
            ],
        };

        let mut jobs = Vec::new();
        for queue_name in queues {
            let q = Queue::new(self.store.clone(), queue_name);
            for s in &statuses {
                let ids = q.list_ids_by_status(*s).await?;
                jobs.extend(q.fetch_many(&ids).await?);
            }
        }
        Ok(jobs)
    }

    /// `CancelJob` (§6 `DELETE /job?id=` or `?queue=`). Only `queued`
    /// jobs transition; anything else is silently skipped rather than
    /// raised (§7 `JobOperationError` policy).
    pub async fn cancel_job(&self, id: Option<&str>, queue: Option<&str>) -> Result<Vec<String>> {
        if let Some(id) = id {
            for queue_name in self.known_queue_names().await? {
                let q = Queue::new(self.store.clone(), queue_name);
                if q.cancel(id).await? {
                    return Ok(vec![id.to_string()]);
                }
            }
            return Ok(Vec::new());
        }

        let Some(queue) = queue else {
            return Ok(Vec::new());
        };
        let q = Queue::new(self.store.clone(), queue.to_string());
        let mut canceled = Vec::new();
        for id in q.list_ids_by_status(JobStatus::Queued).await? {
            if q.cancel(&id).await? {
                canceled.push(id);
            }
        }
        Ok(canceled)
    }

    /// `GetWorkerList` (§6 `GET /worker?queue=&node=&host=` — node/host
    /// are pre-resolved to a queue name by the caller, same as the
    /// original's `g_config.get_node_queue_name`/`get_host_queue_name`).
    pub async fn list_workers(&self, queue: Option<&str>) -> Result<Vec<WorkerRecord>> {
        let all = self.store.list_workers().await?;
        Ok(match queue {
            Some(q) => all
                .into_iter()
                .filter(|w| w.queues.iter().any(|wq| wq == q))
                .collect(),
            None => all,
        })
    }

    /// `KillWorker` (§6 `DELETE /worker?name=|queue=`). A direct name
    /// overrides any queue filter. There is no live process to signal in
    /// this runtime, so "kill" means marking the registry record dead —
    /// the worker's own loop notices on its next heartbeat-adjacent
    /// liveness check and the dispatcher stops scheduling onto it.
    pub async fn kill_worker(&self, name: Option<&str>, queue: Option<&str>) -> Result<Vec<String>> {
        if let Some(name) = name {
            self.store.mark_worker_dead(name).await?;
            return Ok(vec![name.to_string()]);
        }
        let Some(queue) = queue else {
            return Ok(Vec::new());
        };
        let mut killed = Vec::new();
        for w in self.list_workers(Some(queue)).await? {
            self.store.mark_worker_dead(&w.name).await?;
            killed.push(w.name);
        }
        Ok(killed)
    }

    /// Every queue name this dispatcher currently has bookkeeping for:
    /// the shared `FifoQ`, one `NodeQ_<hostname>` per known node, and one
    /// `HostQ_<host>` per live binding. There is no global job registry
    /// to enumerate independently of these (§9's "queue abstraction"
    /// replaces rq's central job index).
    async fn known_queue_names(&self) -> Result<Vec<String>> {
        let mut names = vec![keys::fifo_queue_name()];
        for (hostname, _) in self.store.hgetall(keys::NODE_INFO_MAP).await? {
            names.push(keys::node_queue_name(&hostname));
        }
        for (host, _) in self.store.hgetall(keys::HOST_TO_NODE_MAP).await? {
            names.push(keys::host_queue_name(&host));
        }
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DriverConnectionArgs, DriverName, Payload};
    use crate::store::{MemoryStore, WorkerRecord, WorkerState};
    use std::collections::HashMap as StdHashMap;

    fn manager(store: Arc<dyn StateStore>) -> Manager {
        Manager::new(store, JobConfig::default(), WorkerConfig::default())
    }

    fn sample_request(host: &str, strategy: QueueStrategy) -> ExecutionRequest {
        ExecutionRequest {
            driver: if strategy == QueueStrategy::Pinned {
                DriverName::Netmiko
            } else {
                DriverName::Pyeapi
            },
            connection_args: DriverConnectionArgs {
                device_type: None,
                host: Some(host.into()),
                username: Some("admin".into()),
                password: Some("admin".into()),
                credential_ref: None,
                extra: StdHashMap::new(),
            },
            command: Some(Payload::Single("show version".into())),
            config: None,
            driver_args: None,
            rendering: None,
            parsing: None,
            queue_strategy: Some(strategy),
            ttl: None,
            webhook: None,
        }
    }

    async fn seed_live_worker(store: &Arc<dyn StateStore>, name: &str, queues: Vec<String>) {
        store
            .register_worker(&WorkerRecord {
                name: name.to_string(),
                state: WorkerState::Idle,
                last_heartbeat: chrono::Utc::now(),
                birth: chrono::Utc::now(),
                pid: 1,
                queues,
                death_date: None,
                hostname: Some(name.to_string()),
                successful_job_count: 0,
                failed_job_count: 0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn fifo_dispatch_fails_without_live_worker() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let mgr = manager(store);
        let err = mgr
            .dispatch_rpc_job(sample_request("10.0.0.1", QueueStrategy::Fifo), EnqueueOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkerUnavailable(_)));
    }

    #[tokio::test]
    async fn fifo_dispatch_enqueues_with_live_worker() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        seed_live_worker(&store, "node-a", vec![keys::fifo_queue_name()]).await;
        let mgr = manager(store.clone());
        let job = mgr
            .dispatch_rpc_job(sample_request("10.0.0.1", QueueStrategy::Fifo), EnqueueOptions::default())
            .await
            .unwrap();
        assert_eq!(job.queue, "FifoQ");
    }

    #[tokio::test]
    async fn pinned_dispatch_fails_without_any_node() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let mgr = manager(store);
        let err = mgr
            .dispatch_rpc_job(sample_request("10.0.0.1", QueueStrategy::Pinned), EnqueueOptions::default())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WorkerUnavailable(_)));
    }

    #[tokio::test]
    async fn pinned_dispatch_assigns_and_spawns() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let node_info = NodeInfo::new("node-a", 4, keys::node_queue_name("node-a"));
        store
            .hset(keys::NODE_INFO_MAP, "node-a", &serde_json::to_string(&node_info).unwrap())
            .await
            .unwrap();
        seed_live_worker(&store, &node::node_worker_name("node-a"), vec![keys::node_queue_name("node-a")]).await;

        let mgr = manager(store.clone());
        let job = mgr
            .dispatch_rpc_job(sample_request("10.0.0.1", QueueStrategy::Pinned), EnqueueOptions::default())
            .await
            .unwrap();
        assert_eq!(job.queue, "HostQ_10.0.0.1");

        // A spawn task should have been queued on the node's own queue.
        let raw = store.pop(&keys::node_queue_name("node-a")).await.unwrap().unwrap();
        let task: NodeTask = serde_json::from_str(&raw).unwrap();
        assert!(matches!(task, NodeTask::Spawn { host } if host == "10.0.0.1"));
    }

    #[tokio::test]
    async fn pinned_dispatch_reuses_existing_binding() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let node_info = NodeInfo::new("node-a", 4, keys::node_queue_name("node-a"));
        store
            .hset(keys::NODE_INFO_MAP, "node-a", &serde_json::to_string(&node_info).unwrap())
            .await
            .unwrap();
        seed_live_worker(&store, &node::node_worker_name("node-a"), vec![keys::node_queue_name("node-a")]).await;
        seed_live_worker(
            &store,
            &node::pinned_worker_name("node-a", "10.0.0.1"),
            vec![keys::host_queue_name("10.0.0.1")],
        )
        .await;
        store
            .hsetnx(keys::HOST_TO_NODE_MAP, "10.0.0.1", "node-a")
            .await
            .unwrap();

        let mgr = manager(store.clone());
        mgr.dispatch_rpc_job(sample_request("10.0.0.1", QueueStrategy::Pinned), EnqueueOptions::default())
            .await
            .unwrap();

        // Host already has a live pinned worker, so no spawn task is queued.
        assert!(store.pop(&keys::node_queue_name("node-a")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn bulk_dispatch_reports_failures_and_successes() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        seed_live_worker(&store, "node-a", vec![keys::fifo_queue_name()]).await;
        let mgr = manager(store);

        let (succeeded, failed) = mgr
            .dispatch_bulk_rpc_jobs(
                vec![
                    sample_request("10.0.0.1", QueueStrategy::Fifo),
                    sample_request("10.0.0.2", QueueStrategy::Pinned),
                ],
                EnqueueOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(succeeded.len(), 1);
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].host, "10.0.0.2");
    }

    #[tokio::test]
    async fn get_job_finds_job_across_queues_without_a_queue_hint() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        seed_live_worker(&store, "node-a", vec![keys::fifo_queue_name()]).await;
        let mgr = manager(store.clone());
        let job = mgr
            .dispatch_rpc_job(sample_request("10.0.0.1", QueueStrategy::Fifo), EnqueueOptions::default())
            .await
            .unwrap();

        let found = mgr.get_job(&job.id.to_string()).await.unwrap().unwrap();
        assert_eq!(found.id, job.id);
        assert!(mgr.get_job("not-a-real-id").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_jobs_filters_by_queue_and_status() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        seed_live_worker(&store, "node-a", vec![keys::fifo_queue_name()]).await;
        let mgr = manager(store.clone());
        mgr.dispatch_rpc_job(sample_request("10.0.0.1", QueueStrategy::Fifo), EnqueueOptions::default())
            .await
            .unwrap();

        let jobs = mgr.list_jobs(Some("FifoQ"), Some(JobStatus::Queued)).await.unwrap();
        assert_eq!(jobs.len(), 1);
        let jobs = mgr.list_jobs(Some("FifoQ"), Some(JobStatus::Finished)).await.unwrap();
        assert!(jobs.is_empty());
    }

    #[tokio::test]
    async fn cancel_job_by_id_only_transitions_queued() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        seed_live_worker(&store, "node-a", vec![keys::fifo_queue_name()]).await;
        let mgr = manager(store.clone());
        let job = mgr
            .dispatch_rpc_job(sample_request("10.0.0.1", QueueStrategy::Fifo), EnqueueOptions::default())
            .await
            .unwrap();

        let canceled = mgr.cancel_job(Some(&job.id.to_string()), None).await.unwrap();
        assert_eq!(canceled, vec![job.id.to_string()]);
        assert_eq!(mgr.cancel_job(Some(&job.id.to_string()), None).await.unwrap(), Vec::<String>::new());
    }

    #[tokio::test]
    async fn list_and_kill_workers_by_queue() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        seed_live_worker(&store, "node-a", vec![keys::fifo_queue_name()]).await;
        let mgr = manager(store.clone());

        let workers = mgr.list_workers(Some("FifoQ")).await.unwrap();
        assert_eq!(workers.len(), 1);

        let killed = mgr.kill_worker(None, Some("FifoQ")).await.unwrap();
        assert_eq!(killed, vec!["node-a".to_string()]);
        let record = store.get_worker("node-a").await.unwrap().unwrap();
        assert!(record.death_date.is_some());
    }
}
