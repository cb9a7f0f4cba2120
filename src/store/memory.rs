//! In-memory [`StateStore`] substitute for tests (§4.1 "test-mode" clause).
//!
//! Mirrors the Redis backend's semantics closely enough that the same unit
//! tests exercise both `worker`/`scheduler`/`manager` logic without a live
//! Redis instance.

use super::{PipelineOp, StateStore, WorkerRecord, WorkerState};
use crate::error::Result;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

#[derive(Default)]
struct Inner {
    hashes: HashMap<String, HashMap<String, String>>,
    lists: HashMap<String, VecDeque<String>>,
    workers: HashMap<String, WorkerRecord>,
}

/// An in-process store backed by `parking_lot::Mutex`, standing in for a
/// live Redis instance in unit tests.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn apply_op(inner: &mut Inner, op: PipelineOp) {
        match op {
            PipelineOp::HSet { key, field, value } => {
                inner.hashes.entry(key).or_default().insert(field, value);
            }
            PipelineOp::HDel { key, field } => {
                if let Some(h) = inner.hashes.get_mut(&key) {
                    h.remove(&field);
                }
            }
            PipelineOp::Push { queue, value } => {
                inner.lists.entry(queue).or_default().push_back(value);
            }
        }
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        Ok(self
            .inner
            .lock()
            .hashes
            .get(key)
            .and_then(|h| h.get(field).cloned()))
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        Ok(self
            .inner
            .lock()
            .hashes
            .get(key)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
        Ok(())
    }

    async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let mut inner = self.inner.lock();
        let h = inner.hashes.entry(key.to_string()).or_default();
        if h.contains_key(field) {
            Ok(false)
        } else {
            h.insert(field.to_string(), value.to_string());
            Ok(true)
        }
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<()> {
        if let Some(h) = self.inner.lock().hashes.get_mut(key) {
            h.remove(field);
        }
        Ok(())
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        let inner = self.inner.lock();
        let h = inner.hashes.get(key);
        Ok(fields
            .iter()
            .map(|f| h.and_then(|h| h.get(f).cloned()))
            .collect())
    }

    async fn push(&self, queue: &str, value: &str) -> Result<()> {
        self.inner
            .lock()
            .lists
            .entry(queue.to_string())
            .or_default()
            .push_back(value.to_string());
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<Option<String>> {
        Ok(self
            .inner
            .lock()
            .lists
            .get_mut(queue)
            .and_then(VecDeque::pop_front))
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        Ok(self
            .inner
            .lock()
            .lists
            .get(queue)
            .map(VecDeque::len)
            .unwrap_or(0))
    }

    async fn range(&self, queue: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let inner = self.inner.lock();
        let Some(list) = inner.lists.get(queue) else {
            return Ok(Vec::new());
        };
        let len = list.len() as isize;
        let norm = |i: isize| -> isize {
            if i < 0 {
                (len + i).max(0)
            } else {
                i.min(len)
            }
        };
        let (s, e) = (norm(start), norm(stop));
        if s > e || s >= len {
            return Ok(Vec::new());
        }
        Ok(list
            .iter()
            .skip(s as usize)
            .take((e - s + 1).max(0) as usize)
            .cloned()
            .collect())
    }

    async fn remove(&self, queue: &str, value: &str) -> Result<()> {
        if let Some(list) = self.inner.lock().lists.get_mut(queue) {
            list.retain(|v| v != value);
        }
        Ok(())
    }

    async fn commit_pipeline(&self, ops: Vec<PipelineOp>) -> Result<()> {
        let mut inner = self.inner.lock();
        for op in ops {
            Self::apply_op(&mut inner, op);
        }
        Ok(())
    }

    async fn register_worker(&self, record: &WorkerRecord) -> Result<()> {
        self.inner
            .lock()
            .workers
            .insert(record.name.clone(), record.clone());
        Ok(())
    }

    async fn heartbeat(&self, name: &str, state: WorkerState) -> Result<()> {
        if let Some(w) = self.inner.lock().workers.get_mut(name) {
            w.state = state;
            w.last_heartbeat = chrono::Utc::now();
        }
        Ok(())
    }

    async fn mark_worker_dead(&self, name: &str) -> Result<()> {
        if let Some(w) = self.inner.lock().workers.get_mut(name) {
            w.death_date = Some(chrono::Utc::now());
        }
        Ok(())
    }

    async fn get_worker(&self, name: &str) -> Result<Option<WorkerRecord>> {
        Ok(self.inner.lock().workers.get(name).cloned())
    }

    async fn list_workers(&self) -> Result<Vec<WorkerRecord>> {
        Ok(self.inner.lock().workers.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn hsetnx_claims_once() {
        let store = MemoryStore::new();
        assert!(store.hsetnx("h", "f", "v1").await.unwrap());
        assert!(!store.hsetnx("h", "f", "v2").await.unwrap());
        assert_eq!(store.hget("h", "f").await.unwrap(), Some("v1".to_string()));
    }

    #[tokio::test]
    async fn queue_is_fifo() {
        let store = MemoryStore::new();
        store.push("q", "a").await.unwrap();
        store.push("q", "b").await.unwrap();
        assert_eq!(store.pop("q").await.unwrap(), Some("a".to_string()));
        assert_eq!(store.pop("q").await.unwrap(), Some("b".to_string()));
        assert_eq!(store.pop("q").await.unwrap(), None);
    }

    #[tokio::test]
    async fn pipeline_applies_all_ops() {
        let store = MemoryStore::new();
        store
            .commit_pipeline(vec![
                PipelineOp::HSet {
                    key: "h".into(),
                    field: "f1".into(),
                    value: "1".into(),
                },
                PipelineOp::HDel {
                    key: "h".into(),
                    field: "f1".into(),
                },
                PipelineOp::Push {
                    queue: "q".into(),
                    value: "x".into(),
                },
            ])
            .await
            .unwrap();
        assert_eq!(store.hget("h", "f1").await.unwrap(), None);
        assert_eq!(store.len("q").await.unwrap(), 1);
    }
}
