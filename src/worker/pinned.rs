//! [`PinnedWorker`]: the sole consumer of one `HostQ_<host>` (§4.3, §5).
//! Holds a single `Driver` instance across jobs so a session-oriented
//! driver's handshake is paid once per host, not once per job, and runs a
//! background keepalive probe so a half-dead session is caught between
//! jobs rather than surfacing as a mysterious mid-command failure.

use crate::driver::Driver;
use crate::error::Result;
use crate::model::{DriverConnectionArgs, JobResult, JobResultKind, JobStatus};
use crate::queue::Queue;
use crate::store::{StateStore, WorkerState};
use crate::worker::WorkerIdentity;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Keepalive cadence used when a worker config isn't threaded through a
/// `NodeWorker`-spawned task (§11 default).
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

pub struct PinnedWorker {
    host: String,
    queue: Queue,
    identity: Arc<WorkerIdentity>,
    driver: Mutex<Box<dyn Driver>>,
    last_connection_args: Mutex<Option<DriverConnectionArgs>>,
}

impl PinnedWorker {
    pub async fn start(
        store: Arc<dyn StateStore>,
        host: &str,
        worker_name: String,
        driver: Box<dyn Driver>,
    ) -> Result<Self> {
        let queue = Queue::host(store.clone(), host);
        let identity = Arc::new(
            WorkerIdentity::register_named(
                store,
                worker_name,
                host.to_string(),
                vec![queue.name().to_string()],
            )
            .await?,
        );
        identity.spawn_heartbeat_loop();
        Ok(Self {
            host: host.to_string(),
            queue,
            identity,
            driver: Mutex::new(driver),
            last_connection_args: Mutex::new(None),
        })
    }

    /// Consume `HostQ_<host>` until the owning `NodeWorker` aborts this
    /// task, or the background keepalive probe reports the session dead.
    /// A dead session ends the task rather than silently reconnecting, so
    /// the node can rebind the host to a freshly spawned worker instead of
    /// papering over a transport fault.
    pub async fn run(self) {
        let shared = Arc::new(self);
        let (fail_tx, mut fail_rx) = mpsc::channel::<String>(1);
        let keepalive_handle = spawn_keepalive_loop(shared.clone(), fail_tx);

        loop {
            tokio::select! {
                reason = fail_rx.recv() => {
                    if let Some(reason) = reason {
                        warn!(host = %shared.host, %reason, "pinned worker stopping after keepalive failure");
                    }
                    break;
                }
                popped = shared.queue.dequeue() => {
                    match popped {
                        Ok(Some(mut job)) => {
                            shared.identity.heartbeat(WorkerState::Busy).await.ok();
                            shared.process(&mut job).await;
                            shared.identity.heartbeat(WorkerState::Idle).await.ok();
                        }
                        Ok(None) => {
                            tokio::time::sleep(Duration::from_millis(200)).await;
                        }
                        Err(e) => {
                            warn!(host = %shared.host, error = %e, "host queue read failed");
                            tokio::time::sleep(Duration::from_millis(500)).await;
                        }
                    }
                }
            }
        }

        keepalive_handle.abort();
        if let Err(e) = shared.identity.retire().await {
            warn!(host = %shared.host, error = %e, "failed to retire pinned worker registration");
        }
    }

    async fn process(&self, job: &mut crate::model::Job) {
        job.mark_started(self.identity.name.clone());
        if let Err(e) = self.queue.transition(job, JobStatus::Queued, "started").await {
            warn!(host = %self.host, job = %job.id, error = %e, "failed to record job as started");
        }

        let new_args = job.payload.connection_args.clone();
        let session_reused = {
            let driver = self.driver.lock().await;
            let last = self.last_connection_args.lock().await;
            driver
                .as_session_reusable()
                .map(|sr| sr.reusable_with(&new_args))
                .unwrap_or(false)
                && last.as_ref().is_some()
        };
        if !session_reused {
            let mut driver = self.driver.lock().await;
            if let Err(e) = driver.disconnect(true).await {
                debug!(host = %self.host, error = %e, "reset disconnect before reconnect failed");
            }
        }

        let outcome = {
            let mut driver = self.driver.lock().await;
            crate::executor::run(job.payload.clone(), &mut **driver, session_reused).await
        };
        *self.last_connection_args.lock().await = Some(new_args);

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
            warn!(host = %self.host, job = %job.id, error = %e, "failed to record job completion status");
        }
        crate::callback::fire(job).await;
        if let Err(e) = self.queue.persist(job).await {
            warn!(host = %self.host, job = %job.id, error = %e, "failed to persist callback metadata");
        }
        info!(host = %self.host, job = %job.id, status = ?job.status, "job processed");
    }
}

fn spawn_keepalive_loop(worker: Arc<PinnedWorker>, fail_tx: mpsc::Sender<String>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(DEFAULT_KEEPALIVE_INTERVAL);
        loop {
            ticker.tick().await;
            let has_session = worker.last_connection_args.lock().await.is_some();
            if !has_session {
                continue;
            }
            let mut driver = worker.driver.lock().await;
            if !driver.supports_keepalive() {
                continue;
            }
            if let Err(e) = driver.keepalive().await {
                let _ = fail_tx.send(e.to_string()).await;
                return;
            }
        }
    })
}
