//! State store client (§4.1): a thin, async wrapper over a key-value store
//! providing the hash/queue/pipeline/worker-registry primitives the rest of
//! NetPulse is built on.
//!
//! [`StateStore`] is the trait every other component programs against;
//! [`RedisStore`] is the production implementation and [`MemoryStore`] is
//! the in-memory substitute required by §4.1's "test-mode" clause.

pub mod keys;
pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A worker's presence record, as listed in `/worker` and consulted by the
/// dispatcher's liveness check (§4.6).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRecord {
    pub name: String,
    pub state: WorkerState,
    pub last_heartbeat: DateTime<Utc>,
    pub birth: DateTime<Utc>,
    pub pid: u32,
    pub queues: Vec<String>,
    #[serde(default)]
    pub death_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub successful_job_count: u64,
    #[serde(default)]
    pub failed_job_count: u64,
}

impl WorkerRecord {
    pub fn is_alive(&self, job_timeout: u64, worker_ttl: u64) -> bool {
        if self.death_date.is_some() {
            return false;
        }
        let budget = match self.state {
            WorkerState::Busy => job_timeout.max(worker_ttl) + 5,
            WorkerState::Idle => worker_ttl + 5,
        };
        let age = Utc::now()
            .signed_duration_since(self.last_heartbeat)
            .num_seconds()
            .max(0) as u64;
        age <= budget
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkerState {
    Busy,
    Idle,
}

/// One mutation queued into an atomic pipeline. Kept as plain data (rather
/// than a boxed closure) so both the Redis and in-memory backends can apply
/// the same op list deterministically.
#[derive(Debug, Clone)]
pub enum PipelineOp {
    HSet {
        key: String,
        field: String,
        value: String,
    },
    HDel {
        key: String,
        field: String,
    },
    Push {
        queue: String,
        value: String,
    },
}

/// Primitives every other NetPulse component is built on top of.
#[async_trait]
pub trait StateStore: Send + Sync {
    // -- hash ops --
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>>;
    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>>;
    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()>;
    /// Set-if-absent; returns whether the field was newly set.
    async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool>;
    async fn hdel(&self, key: &str, field: &str) -> Result<()>;
    async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>>;

    // -- queue ops (lists) --
    async fn push(&self, queue: &str, value: &str) -> Result<()>;
    async fn pop(&self, queue: &str) -> Result<Option<String>>;
    async fn len(&self, queue: &str) -> Result<usize>;
    async fn range(&self, queue: &str, start: isize, stop: isize) -> Result<Vec<String>>;
    async fn remove(&self, queue: &str, value: &str) -> Result<()>;

    /// Atomic batched writes. A partial failure is reported to the caller
    /// (§4.1: "the client does not attempt to hide partial writes").
    async fn commit_pipeline(&self, ops: Vec<PipelineOp>) -> Result<()>;

    // -- worker registry --
    async fn register_worker(&self, record: &WorkerRecord) -> Result<()>;
    async fn heartbeat(&self, name: &str, state: WorkerState) -> Result<()>;
    async fn mark_worker_dead(&self, name: &str) -> Result<()>;
    async fn get_worker(&self, name: &str) -> Result<Option<WorkerRecord>>;
    async fn list_workers(&self) -> Result<Vec<WorkerRecord>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_alive_busy_uses_job_timeout() {
        let rec = WorkerRecord {
            name: "n".into(),
            state: WorkerState::Busy,
            last_heartbeat: Utc::now() - chrono::Duration::seconds(100),
            birth: Utc::now(),
            pid: 1,
            queues: vec![],
            death_date: None,
            hostname: None,
            successful_job_count: 0,
            failed_job_count: 0,
        };
        assert!(rec.is_alive(300, 60)); // max(300,60)+5 = 305 >= 100
        assert!(!rec.is_alive(10, 10)); // max(10,10)+5 = 15 < 100
    }

    #[test]
    fn worker_with_death_date_is_never_alive() {
        let rec = WorkerRecord {
            name: "n".into(),
            state: WorkerState::Idle,
            last_heartbeat: Utc::now(),
            birth: Utc::now(),
            pid: 1,
            queues: vec![],
            death_date: Some(Utc::now()),
            hostname: None,
            successful_job_count: 0,
            failed_job_count: 0,
        };
        assert!(!rec.is_alive(300, 300));
    }
}
