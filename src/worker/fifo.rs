//! [`FifoWorker`]: singleton-per-node consumer of the shared `FifoQ`
//! (§4.3, §5). Unlike [`super::pinned::PinnedWorker`] it holds no session
//! across jobs — `FifoQ` only ever carries stateless-driver jobs (§3's
//! driver-dependent default), so a fresh `Driver` is resolved per job.

use crate::config::WorkerConfig;
use crate::driver::{self, Driver};
use crate::error::Result;
use crate::model::{Job, JobResult, JobResultKind, JobStatus};
use crate::queue::Queue;
use crate::store::{StateStore, WorkerState};
use crate::worker::WorkerIdentity;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

pub struct FifoWorker {
    queue: Queue,
    identity: Arc<WorkerIdentity>,
    _lock_file: std::fs::File,
}

impl FifoWorker {
    /// Acquire `fifo.lock` (one `FifoWorker` per node, mirroring
    /// `node.lock`'s singleton enforcement — §4.3) and register in the
    /// worker registry under the plain hostname.
    pub async fn start(store: Arc<dyn StateStore>, config: &WorkerConfig, hostname: String) -> Result<Self> {
        let lock_path = config.lock_dir.join("fifo.lock");
        let lock_file =
            crate::worker::acquire_singleton_lock(&lock_path, Duration::from_secs(3)).await?;

        let queue = Queue::fifo(store.clone());
        let identity = Arc::new(
            WorkerIdentity::register(store, &hostname, None, vec![queue.name().to_string()]).await?,
        );
        identity.spawn_heartbeat_loop();

        info!(%hostname, "fifo worker started");
        Ok(Self {
            queue,
            identity,
            _lock_file: lock_file,
        })
    }

    /// Pop and run jobs one at a time, forever. There is no supervising
    /// `NodeWorker` for this variant: the process itself is the unit the
    /// operator restarts.
    pub async fn run(self) {
        loop {
            match self.queue.dequeue().await {
                Ok(Some(mut job)) => {
                    self.identity.heartbeat(WorkerState::Busy).await.ok();
                    self.process(&mut job).await;
                    self.identity.heartbeat(WorkerState::Idle).await.ok();
                }
                Ok(None) => tokio::time::sleep(Duration::from_millis(200)).await,
                Err(e) => {
                    warn!(error = %e, "fifo queue read failed");
                    tokio::time::sleep(Duration::from_millis(500)).await;
                }
            }
        }
    }

    async fn process(&self, job: &mut Job) {
        job.mark_started(self.identity.name.clone());
        if let Err(e) = self.queue.transition(job, JobStatus::Queued, "started").await {
            warn!(job = %job.id, error = %e, "failed to record job as started");
        }

        let mut driver: Box<dyn Driver> = driver::resolve(job.payload.driver);
        let outcome = crate::executor::run(job.payload.clone(), &mut *driver, false).await;
        match outcome {
            Ok(retval) => job.mark_finished(JobResult {
                kind: JobResultKind::Successful,
                retval: Some(retval),
                error: None,
            }),
            Err(e) => job.mark_failed(JobResult {
                kind: JobResultKind::Failed,
                retval: None,
                error: Some(serde_json::json!(e.to_string())),
            }),
        }
        let to_registry = if job.status == JobStatus::Finished { "finished" } else { "failed" };
        if let Err(e) = self.queue.transition(job, JobStatus::Started, to_registry).await {
            warn!(job = %job.id, error = %e, "failed to record job completion status");
        }
        crate::callback::fire(job).await;
        if let Err(e) = self.queue.persist(job).await {
            warn!(job = %job.id, error = %e, "failed to persist callback metadata");
        }
        info!(job = %job.id, status = ?job.status, "job processed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DriverConnectionArgs, DriverName, ExecutionRequest, Payload};
    use crate::queue::EnqueueOptions;
    use crate::store::MemoryStore;
    use std::collections::HashMap;

    fn test_config() -> WorkerConfig {
        let mut cfg = WorkerConfig::default();
        cfg.lock_dir = std::env::temp_dir().join(format!("netpulse-fifo-test-{}", uuid::Uuid::new_v4()));
        cfg
    }

    fn sample_request() -> ExecutionRequest {
        ExecutionRequest {
            driver: DriverName::Pyeapi,
            connection_args: DriverConnectionArgs {
                device_type: None,
                host: Some("10.0.0.1".into()),
                username: Some("admin".into()),
                password: Some("admin".into()),
                credential_ref: None,
                extra: HashMap::new(),
            },
            command: Some(Payload::Single("show version".into())),
            config: None,
            driver_args: None,
            rendering: None,
            parsing: None,
            queue_strategy: None,
            ttl: None,
            webhook: None,
        }
    }

    #[tokio::test]
    async fn process_marks_job_finished() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let cfg = test_config();
        let worker = FifoWorker::start(store.clone(), &cfg, "node-a".into()).await.unwrap();

        let queue = Queue::fifo(store.clone());
        let mut job = queue
            .enqueue(sample_request(), EnqueueOptions::default())
            .await
            .unwrap();

        worker.process(&mut job).await;
        assert_eq!(job.status, crate::model::JobStatus::Finished);
    }

    #[tokio::test]
    async fn process_moves_job_between_status_registries() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let cfg = test_config();
        let worker = FifoWorker::start(store.clone(), &cfg, "node-a".into()).await.unwrap();

        let queue = Queue::fifo(store.clone());
        let mut job = queue
            .enqueue(sample_request(), EnqueueOptions::default())
            .await
            .unwrap();
        assert_eq!(queue.list_ids_by_status(JobStatus::Queued).await.unwrap().len(), 1);

        worker.process(&mut job).await;

        assert!(queue.list_ids_by_status(JobStatus::Queued).await.unwrap().is_empty());
        assert!(queue.list_ids_by_status(JobStatus::Started).await.unwrap().is_empty());
        assert_eq!(
            queue.list_ids_by_status(JobStatus::Finished).await.unwrap(),
            vec![job.id.to_string()]
        );
    }

    #[tokio::test]
    async fn start_registers_worker_under_plain_hostname() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStore::new());
        let cfg = test_config();
        let worker = FifoWorker::start(store.clone(), &cfg, "node-a".into()).await.unwrap();
        assert_eq!(worker.identity.name, "node-a");
    }
}
