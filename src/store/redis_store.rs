//! Production [`StateStore`] backed by a Redis-compatible server, pooled
//! through `deadpool-redis`.
//!
//! Grounded on `examples/original_source/netpulse/services/rediz.py` for
//! the connection/TLS/keepalive shape and on
//! `examples/other_examples/2e48ff2c_dimfeld-ergo__src-queues-mod.rs.rs`
//! for the idiomatic pooled-client wrapper this module follows.

use super::{PipelineOp, StateStore, WorkerRecord, WorkerState};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use deadpool_redis::{Config as PoolConfig, Connection, Pool, Runtime};
use redis::AsyncCommands;

/// Thin pooled wrapper over a Redis connection. TLS and Sentinel discovery
/// are configured at pool-build time; retry-with-keepalive on transient
/// connection loss is handled by `deadpool_redis`'s connection manager
/// (each checked-out connection is revalidated before use).
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn connect(config: &StoreConfig) -> Result<Self> {
        let url = config.connection_url();
        let pool = PoolConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::Store(format!("failed to build redis pool: {e}")))?;
        Ok(Self { pool })
    }

    /// Construct directly from a connection URL, primarily for tests
    /// against a real Redis instance (`#[ignore]`d by default).
    pub fn from_url(url: &str) -> Result<Self> {
        let pool = PoolConfig::from_url(url)
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| Error::Store(format!("failed to build redis pool: {e}")))?;
        Ok(Self { pool })
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| Error::Store(format!("failed to check out connection: {e}")))
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        conn.hget(key, field)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, String)>> {
        let mut conn = self.conn().await?;
        let map: std::collections::HashMap<String, String> = conn
            .hgetall(key)
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        Ok(map.into_iter().collect())
    }

    async fn hset(&self, key: &str, field: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.hset::<_, _, _, ()>(key, field, value)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn hsetnx(&self, key: &str, field: &str, value: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        conn.hset_nx(key, field, value)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.hdel::<_, _, ()>(key, field)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn hmget(&self, key: &str, fields: &[String]) -> Result<Vec<Option<String>>> {
        if fields.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        conn.hget(key, fields)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn push(&self, queue: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.rpush::<_, _, ()>(queue, value)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn pop(&self, queue: &str) -> Result<Option<String>> {
        let mut conn = self.conn().await?;
        conn.lpop(queue, None)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn len(&self, queue: &str) -> Result<usize> {
        let mut conn = self.conn().await?;
        conn.llen(queue).await.map_err(|e| Error::Store(e.to_string()))
    }

    async fn range(&self, queue: &str, start: isize, stop: isize) -> Result<Vec<String>> {
        let mut conn = self.conn().await?;
        conn.lrange(queue, start as isize, stop as isize)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn remove(&self, queue: &str, value: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.lrem::<_, _, ()>(queue, 0, value)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn commit_pipeline(&self, ops: Vec<PipelineOp>) -> Result<()> {
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        pipe.atomic();
        for op in &ops {
            match op {
                PipelineOp::HSet { key, field, value } => {
                    pipe.hset(key, field, value);
                }
                PipelineOp::HDel { key, field } => {
                    pipe.hdel(key, field);
                }
                PipelineOp::Push { queue, value } => {
                    pipe.rpush(queue, value);
                }
            }
        }
        // `execute(raise_on_error=true)` semantics: any failure in the
        // atomic pipeline surfaces as one error, never a partial commit
        // silently reported as success.
        pipe.query_async::<_, ()>(&mut conn)
            .await
            .map_err(|e| Error::StorePipeline(e.to_string()))
    }

    async fn register_worker(&self, record: &WorkerRecord) -> Result<()> {
        let mut conn = self.conn().await?;
        let key = super::keys::worker_key(&record.name);
        let payload = serde_json::to_string(record)?;
        conn.set::<_, _, ()>(key, payload)
            .await
            .map_err(|e| Error::Store(e.to_string()))
    }

    async fn heartbeat(&self, name: &str, state: WorkerState) -> Result<()> {
        if let Some(mut record) = self.get_worker(name).await? {
            record.state = state;
            record.last_heartbeat = chrono::Utc::now();
            self.register_worker(&record).await?;
        }
        Ok(())
    }

    async fn mark_worker_dead(&self, name: &str) -> Result<()> {
        if let Some(mut record) = self.get_worker(name).await? {
            record.death_date = Some(chrono::Utc::now());
            self.register_worker(&record).await?;
        }
        Ok(())
    }

    async fn get_worker(&self, name: &str) -> Result<Option<WorkerRecord>> {
        let mut conn = self.conn().await?;
        let key = super::keys::worker_key(name);
        let raw: Option<String> = conn.get(key).await.map_err(|e| Error::Store(e.to_string()))?;
        match raw {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    async fn list_workers(&self) -> Result<Vec<WorkerRecord>> {
        let mut conn = self.conn().await?;
        let keys: Vec<String> = conn
            .keys("netpulse:worker:*")
            .await
            .map_err(|e| Error::Store(e.to_string()))?;
        let mut out = Vec::with_capacity(keys.len());
        for key in keys {
            let raw: Option<String> = conn.get(key).await.map_err(|e| Error::Store(e.to_string()))?;
            if let Some(s) = raw {
                out.push(serde_json::from_str(&s)?);
            }
        }
        Ok(out)
    }
}
