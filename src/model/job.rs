//! [`Job`] and its terminal-result shape.

use crate::model::ExecutionRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// §3 job status lattice. Terminal states (`Finished`, `Failed`,
/// `Canceled`) are sticky — once reached a job never transitions again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Queued,
    Started,
    Finished,
    Failed,
    Canceled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Finished | JobStatus::Failed | JobStatus::Canceled
        )
    }
}

/// Named callback reference stored on a job; resolved by name against a
/// static registry at execute time (§4.8, §9 "Callbacks by name").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CallbackRef {
    pub name: String,
    pub timeout_seconds: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobResultKind {
    Successful = 1,
    Failed = 2,
    Stopped = 3,
    Retried = 4,
}

/// Terminal outcome of a job, stored once it leaves `started`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobResult {
    #[serde(rename = "type")]
    pub kind: JobResultKind,
    #[serde(default)]
    pub retval: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

/// Free-form metadata bag analogous to `rq.Job.meta`; used to stash the
/// normalized `(exc_type, exc_value)` pair written by
/// `rpc_exception_callback`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JobMeta {
    #[serde(default)]
    pub error: Option<(String, String)>,
    #[serde(default)]
    pub task_id: Option<String>,
}

/// One submitted unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub queue: String,
    pub status: JobStatus,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub enqueued_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub worker: Option<String>,
    pub payload: ExecutionRequest,
    #[serde(default)]
    pub meta: JobMeta,
    #[serde(default)]
    pub result: Option<JobResult>,
    pub job_ttl: u64,
    pub timeout: u64,
    pub result_ttl: u64,
    #[serde(default)]
    pub on_success: Option<CallbackRef>,
    #[serde(default)]
    pub on_failure: Option<CallbackRef>,
}

impl Job {
    pub fn new(
        queue: impl Into<String>,
        payload: ExecutionRequest,
        job_ttl: u64,
        timeout: u64,
        result_ttl: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            queue: queue.into(),
            status: JobStatus::Queued,
            created_at: Utc::now(),
            enqueued_at: None,
            started_at: None,
            ended_at: None,
            worker: None,
            payload,
            meta: JobMeta::default(),
            result: None,
            job_ttl,
            timeout,
            result_ttl,
            on_success: None,
            on_failure: None,
        }
    }

    /// Only `queued` jobs can be canceled (§4.2, §8 law 9). Returns
    /// whether the transition happened.
    pub fn try_cancel(&mut self) -> bool {
        if self.status == JobStatus::Queued {
            self.status = JobStatus::Canceled;
            self.ended_at = Some(Utc::now());
            true
        } else {
            false
        }
    }

    pub fn mark_started(&mut self, worker: impl Into<String>) {
        self.status = JobStatus::Started;
        self.started_at = Some(Utc::now());
        self.worker = Some(worker.into());
    }

    pub fn mark_finished(&mut self, result: JobResult) {
        self.status = JobStatus::Finished;
        self.ended_at = Some(Utc::now());
        self.result = Some(result);
    }

    pub fn mark_failed(&mut self, result: JobResult) {
        self.status = JobStatus::Failed;
        self.ended_at = Some(Utc::now());
        self.result = Some(result);
    }

    /// §3: after `job_ttl` elapses while still queued the job is expired.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        if self.status != JobStatus::Queued {
            return false;
        }
        let age = now
            .signed_duration_since(self.created_at)
            .num_seconds()
            .max(0) as u64;
        age > self.job_ttl
    }
}

/// `{host, reason}` for a device that could not be enqueued in a bulk
/// request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchFailedItem {
    pub host: String,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DriverConnectionArgs, DriverName, Payload};
    use std::collections::HashMap;

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

    #[test]
    fn cancel_only_from_queued() {
        let mut job = Job::new("FifoQ", sample_request(), 1800, 300, 300);
        assert!(job.try_cancel());
        // Canceling twice is idempotent-false (law 9: second call returns []).
        assert!(!job.try_cancel());
    }

    #[test]
    fn cancel_after_start_is_noop() {
        let mut job = Job::new("FifoQ", sample_request(), 1800, 300, 300);
        job.mark_started("worker-1");
        assert!(!job.try_cancel());
        assert_eq!(job.status, JobStatus::Started);
    }

    #[test]
    fn expiry_only_applies_while_queued() {
        let mut job = Job::new("FifoQ", sample_request(), 10, 300, 300);
        job.created_at = Utc::now() - chrono::Duration::seconds(20);
        assert!(job.is_expired(Utc::now()));
        job.mark_started("w");
        assert!(!job.is_expired(Utc::now()));
    }
}
