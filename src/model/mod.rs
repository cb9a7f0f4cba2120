//! Core data model shared by the store, queue, worker, scheduler, and API
//! layers.
//!
//! Types here mirror §3 of the specification: [`NodeInfo`] and host binding
//! for the scheduler's capacity view, [`Job`]/[`JobStatus`] for the queue
//! abstraction, [`DriverExecutionResult`] for per-command outcomes, and
//! [`ExecutionRequest`] for the typed REST payload.

mod execution_request;
mod job;

pub use execution_request::{CredentialReference, DriverConnectionArgs, DriverArgs, ExecutionRequest, Payload, RenderSpec, ParseSpec};
pub use job::{BatchFailedItem, CallbackRef, Job, JobResult, JobResultKind, JobStatus};

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One per worker-host container; tracks how many hosts it currently has
/// pinned against its configured capacity.
///
/// Invariant: `0 <= count <= capacity` at every observed instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    pub hostname: String,
    pub count: u32,
    pub capacity: u32,
    pub queue: String,
}

impl NodeInfo {
    pub fn new(hostname: impl Into<String>, capacity: u32, queue: impl Into<String>) -> Self {
        Self {
            hostname: hostname.into(),
            count: 0,
            capacity,
            queue: queue.into(),
        }
    }

    pub fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.count)
    }

    pub fn has_capacity(&self) -> bool {
        self.count < self.capacity
    }
}

// NodeInfo identity is by hostname alone, matching the original's
// `__hash__`/`__eq__` override (two records for the same hostname are the
// same node even if count/capacity differ across a read).
impl std::hash::Hash for NodeInfo {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.hostname.hash(state);
    }
}

/// Queue-strategy tag on an [`ExecutionRequest`] — selects `FifoQ` vs.
/// `HostQ_<host>` dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStrategy {
    Fifo,
    Pinned,
}

/// Supported driver tags. Concrete protocol implementations are out of
/// scope; this enum only carries the discriminator used to resolve a
/// driver and pick its default queue strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverName {
    Napalm,
    Netmiko,
    Paramiko,
    Pyeapi,
}

impl DriverName {
    /// Session-oriented drivers default to `pinned`; stateless ones to
    /// `fifo` (§3 `ExecutionRequest` invariant).
    pub fn is_session_oriented(&self) -> bool {
        matches!(self, DriverName::Netmiko | DriverName::Napalm)
    }

    pub fn default_queue_strategy(&self) -> QueueStrategy {
        if self.is_session_oriented() {
            QueueStrategy::Pinned
        } else {
            QueueStrategy::Fifo
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DriverName::Napalm => "napalm",
            DriverName::Netmiko => "netmiko",
            DriverName::Paramiko => "paramiko",
            DriverName::Pyeapi => "pyeapi",
        }
    }
}

/// Per-command or per-config-set outcome returned by a [`crate::driver::Driver`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DriverExecutionResult {
    /// Raw output, type depends on the driver/parser.
    #[serde(default)]
    pub output: serde_json::Value,
    /// Non-empty iff the command/config failed.
    #[serde(default)]
    pub error: String,
    /// 0 on success.
    #[serde(default)]
    pub exit_status: i32,
    /// `duration_seconds`, `host`, `session_reused`, etc.
    #[serde(default)]
    pub telemetry: HashMap<String, serde_json::Value>,
    /// Populated by the parse stage when `req.parsing` is present.
    #[serde(default)]
    pub parsed: Option<serde_json::Value>,
}

impl DriverExecutionResult {
    pub fn success(output: serde_json::Value) -> Self {
        Self {
            output,
            error: String::new(),
            exit_status: 0,
            telemetry: HashMap::new(),
            parsed: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            output: serde_json::Value::Null,
            error: error.into(),
            exit_status: 1,
            telemetry: HashMap::new(),
            parsed: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.exit_status == 0 && self.error.is_empty()
    }
}

/// Outbound webhook spec carried on a job's payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebHook {
    #[serde(default = "WebHook::default_name")]
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub method: WebHookMethod,
    #[serde(default)]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default)]
    pub cookies: Option<HashMap<String, String>>,
    /// (username, password) for HTTP basic auth.
    #[serde(default)]
    pub auth: Option<(String, String)>,
    #[serde(default = "WebHook::default_timeout")]
    pub timeout: f64,
}

impl WebHook {
    fn default_name() -> String {
        "basic".to_string()
    }

    fn default_timeout() -> f64 {
        5.0
    }

    /// Clamp to the spec's bounded range (0.5s..=120s, default 5s).
    pub fn clamped_timeout(&self) -> f64 {
        self.timeout.clamp(0.5, 120.0)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WebHookMethod {
    #[default]
    Post,
    Get,
    Put,
    Delete,
    Patch,
}

impl WebHookMethod {
    pub fn as_http_method(&self) -> reqwest::Method {
        match self {
            WebHookMethod::Get => reqwest::Method::GET,
            WebHookMethod::Post => reqwest::Method::POST,
            WebHookMethod::Put => reqwest::Method::PUT,
            WebHookMethod::Delete => reqwest::Method::DELETE,
            WebHookMethod::Patch => reqwest::Method::PATCH,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_info_remaining_saturates() {
        let n = NodeInfo::new("n1", 2, "NodeQ_n1");
        assert_eq!(n.remaining(), 2);
        assert!(n.has_capacity());
    }

    #[test]
    fn node_info_equality_is_by_hostname() {
        let mut a = NodeInfo::new("n1", 2, "NodeQ_n1");
        let b = NodeInfo::new("n1", 99, "NodeQ_n1");
        a.count = 1;
        assert_eq!(a, b);
    }

    #[test]
    fn driver_name_default_queue_strategy() {
        assert_eq!(
            DriverName::Netmiko.default_queue_strategy(),
            QueueStrategy::Pinned
        );
        assert_eq!(
            DriverName::Pyeapi.default_queue_strategy(),
            QueueStrategy::Fifo
        );
    }

    #[test]
    fn webhook_timeout_is_clamped() {
        let wh = WebHook {
            name: "basic".into(),
            url: "http://x".into(),
            method: WebHookMethod::Post,
            headers: None,
            cookies: None,
            auth: None,
            timeout: 1000.0,
        };
        assert_eq!(wh.clamped_timeout(), 120.0);
    }
}
