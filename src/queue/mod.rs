//! Named queues, job enqueue/cancel/fetch, and per-status registries
//! (§4.2). Grounded on the key-namespacing and tracking-data pattern in
//! `examples/other_examples/2e48ff2c_dimfeld-ergo__src-queues-mod.rs.rs`.

use crate::error::{Error, Result};
use crate::model::{CallbackRef, ExecutionRequest, Job, JobStatus};
use crate::store::{keys, PipelineOp, StateStore};
use std::sync::Arc;

/// A named queue backed by a [`StateStore`]. Cheap to clone — wraps an
/// `Arc` to the shared store.
#[derive(Clone)]
pub struct Queue {
    store: Arc<dyn StateStore>,
    name: String,
}

/// Options accepted by [`Queue::enqueue`], mirroring the original
/// `Queue(name).Enqueue(...)` contract.
#[derive(Default, Clone)]
pub struct EnqueueOptions {
    pub timeout: Option<u64>,
    pub ttl: Option<u64>,
    pub result_ttl: Option<u64>,
    pub on_success: Option<CallbackRef>,
    pub on_failure: Option<CallbackRef>,
}

impl Queue {
    pub fn new(store: Arc<dyn StateStore>, name: impl Into<String>) -> Self {
        Self {
            store,
            name: name.into(),
        }
    }

    pub fn fifo(store: Arc<dyn StateStore>) -> Self {
        Self::new(store, keys::fifo_queue_name())
    }

    pub fn node(store: Arc<dyn StateStore>, hostname: &str) -> Self {
        Self::new(store, keys::node_queue_name(hostname))
    }

    pub fn host(store: Arc<dyn StateStore>, host: &str) -> Self {
        Self::new(store, keys::host_queue_name(host))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Construct a job and commit it (payload + registry entry) through a
    /// single pipeline.
    pub async fn enqueue(
        &self,
        payload: ExecutionRequest,
        opts: EnqueueOptions,
    ) -> Result<Job> {
        let mut job = Job::new(
            &self.name,
            payload,
            opts.ttl.unwrap_or(1800),
            opts.timeout.unwrap_or(300),
            opts.result_ttl.unwrap_or(300),
        );
        job.on_success = opts.on_success;
        job.on_failure = opts.on_failure;
        job.enqueued_at = Some(chrono::Utc::now());

        let job_json = serde_json::to_string(&job)?;
        self.store
            .commit_pipeline(vec![
                PipelineOp::HSet {
                    key: keys::job_key(&job.id.to_string()),
                    field: "data".to_string(),
                    value: job_json,
                },
                PipelineOp::Push {
                    queue: self.name.clone(),
                    value: job.id.to_string(),
                },
                PipelineOp::HSet {
                    key: keys::registry_key(&self.name, "queued"),
                    field: job.id.to_string(),
                    value: "1".to_string(),
                },
            ])
            .await?;
        Ok(job)
    }

    /// Prepare and commit several jobs via one pipeline (§4.2
    /// `EnqueueMany`).
    pub async fn enqueue_many(
        &self,
        payloads: Vec<ExecutionRequest>,
        opts: EnqueueOptions,
    ) -> Result<Vec<Job>> {
        let mut ops = Vec::with_capacity(payloads.len() * 3);
        let mut jobs = Vec::with_capacity(payloads.len());
        for payload in payloads {
            let mut job = Job::new(
                &self.name,
                payload,
                opts.ttl.unwrap_or(1800),
                opts.timeout.unwrap_or(300),
                opts.result_ttl.unwrap_or(300),
            );
            job.on_success = opts.on_success.clone();
            job.on_failure = opts.on_failure.clone();
            job.enqueued_at = Some(chrono::Utc::now());

            let job_json = serde_json::to_string(&job)?;
            ops.push(PipelineOp::HSet {
                key: keys::job_key(&job.id.to_string()),
                field: "data".to_string(),
                value: job_json,
            });
            ops.push(PipelineOp::Push {
                queue: self.name.clone(),
                value: job.id.to_string(),
            });
            ops.push(PipelineOp::HSet {
                key: keys::registry_key(&self.name, "queued"),
                field: job.id.to_string(),
                value: "1".to_string(),
            });
            jobs.push(job);
        }
        self.store.commit_pipeline(ops).await?;
        Ok(jobs)
    }

    /// Pop the next job id and load its payload, transitioning registry
    /// bookkeeping. Returns `None` if the queue is empty.
    pub async fn dequeue(&self) -> Result<Option<Job>> {
        let Some(job_id) = self.store.pop(&self.name).await? else {
            return Ok(None);
        };
        self.fetch(&job_id).await
    }

    pub async fn fetch(&self, job_id: &str) -> Result<Option<Job>> {
        let raw = self.store.hget(&keys::job_key(job_id), "data").await?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Fetch-many returns only existing jobs (§4.2).
    pub async fn fetch_many(&self, job_ids: &[String]) -> Result<Vec<Job>> {
        let mut out = Vec::with_capacity(job_ids.len());
        for id in job_ids {
            if let Some(job) = self.fetch(id).await? {
                out.push(job);
            }
        }
        Ok(out)
    }

    pub async fn persist(&self, job: &Job) -> Result<()> {
        let job_json = serde_json::to_string(job)?;
        self.store
            .hset(&keys::job_key(&job.id.to_string()), "data", &job_json)
            .await
    }

    /// Cancel allowed only from `queued`; any other state is a no-op
    /// (§4.2, §8 law 9). Returns `true` if this call transitioned the job.
    pub async fn cancel(&self, job_id: &str) -> Result<bool> {
        let Some(mut job) = self.fetch(job_id).await? else {
            return Ok(false);
        };
        if !job.try_cancel() {
            return Ok(false);
        }
        self.store.remove(&self.name, job_id).await?;
        self.transition(&mut job, JobStatus::Queued, "canceled").await?;
        Ok(true)
    }

    /// List job ids currently tracked in the named status registry for
    /// this queue.
    pub async fn list_ids_by_status(&self, status: JobStatus) -> Result<Vec<String>> {
        let status_name = match status {
            JobStatus::Queued => "queued",
            JobStatus::Started => "started",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        };
        let entries = self
            .store
            .hgetall(&keys::registry_key(&self.name, status_name))
            .await?;
        Ok(entries.into_iter().map(|(k, _)| k).collect())
    }

    pub async fn len(&self) -> Result<usize> {
        self.store.len(&self.name).await
    }

    /// Update a job's status and move it between per-status registries
    /// atomically with its own persisted payload.
    pub async fn transition(&self, job: &mut Job, from: JobStatus, to_registry: &str) -> Result<()> {
        let from_name = match from {
            JobStatus::Queued => "queued",
            JobStatus::Started => "started",
            JobStatus::Finished => "finished",
            JobStatus::Failed => "failed",
            JobStatus::Canceled => "canceled",
        };
        if from_name == to_registry {
            return Err(Error::JobOperation(
                "no-op transition requested".to_string(),
            ));
        }
        let job_json = serde_json::to_string(job)?;
        self.store
            .commit_pipeline(vec![
                PipelineOp::HSet {
                    key: keys::job_key(&job.id.to_string()),
                    field: "data".to_string(),
                    value: job_json,
                },
                PipelineOp::HDel {
                    key: keys::registry_key(&self.name, from_name),
                    field: job.id.to_string(),
                },
                PipelineOp::HSet {
                    key: keys::registry_key(&self.name, to_registry),
                    field: job.id.to_string(),
                    value: "1".to_string(),
                },
            ])
            .await
    }
}
