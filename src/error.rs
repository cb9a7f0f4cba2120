//! Error types for NetPulse.
//!
//! This module defines the error taxonomy shared by the dispatcher, the
//! worker runtimes, and the REST API. The API layer (`api::error`) maps
//! these onto HTTP status codes and the `{code:-1, message, data?}`
//! envelope; the dispatcher itself inspects specific variants to drive
//! retry/absorb logic (`NodePreempted`, `HostAlreadyPinned`).

use thiserror::Error;

/// Result type alias for NetPulse operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for NetPulse.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Request validation
    // ========================================================================
    /// A request failed construction-time validation (§3 `ExecutionRequest`
    /// invariants: exclusive command/config, dict-requires-rendering, etc).
    #[error("validation error: {0}")]
    Validation(String),

    // ========================================================================
    // Authentication
    // ========================================================================
    /// Missing or invalid API key.
    #[error("authentication error: missing or invalid API key")]
    Authentication,

    // ========================================================================
    // Dispatcher / scheduling errors
    // ========================================================================
    /// No capacity in the scheduler, or no alive worker for the target queue.
    #[error("worker unavailable: {0}")]
    WorkerUnavailable(String),

    /// The node selected by the scheduler was claimed by another dispatcher
    /// between decision and commit. Caller should retry (bounded).
    #[error("node '{0}' was preempted by another dispatcher")]
    NodePreempted(String),

    /// Another node already claimed the host binding first; treat as
    /// success of binding (use the existing binding), no retry needed.
    #[error("host '{0}' is already pinned to a node")]
    HostAlreadyPinned(String),

    /// Cancel/fetch against a non-cancelable or non-existent job. Per
    /// policy this never propagates to the caller as an error; components
    /// that can observe it return an empty result instead.
    #[error("job operation error: {0}")]
    JobOperation(String),

    // ========================================================================
    // Driver errors
    // ========================================================================
    /// A driver-level error. Captured inside `DriverExecutionResult.error`
    /// for per-command failures; this variant is used when a driver cannot
    /// even be resolved or constructed.
    #[error("driver error: {0}")]
    Driver(String),

    /// Queued TTL or in-flight wall-clock execution limit expired.
    #[error("timeout after {0} seconds")]
    Timeout(u64),

    /// Webhook HTTP delivery failed.
    #[error("webhook delivery failed: {0}")]
    Webhook(String),

    // ========================================================================
    // State store
    // ========================================================================
    /// Transport-level failure talking to the key-value store.
    #[error("store error: {0}")]
    Store(String),

    /// A pipeline committed only some of its writes.
    #[error("store pipeline partially failed: {0}")]
    StorePipeline(String),

    // ========================================================================
    // Configuration
    // ========================================================================
    /// Configuration failed to load or did not pass validation.
    #[error("configuration error: {0}")]
    Config(String),

    // ========================================================================
    // Generic
    // ========================================================================
    /// Serialization/deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Wrapped I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Machine-readable error kind, stable across message wording changes.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "ValidationError",
            Error::Authentication => "AuthenticationError",
            Error::WorkerUnavailable(_) => "WorkerUnavailable",
            Error::NodePreempted(_) => "NodePreempted",
            Error::HostAlreadyPinned(_) => "HostAlreadyPinned",
            Error::JobOperation(_) => "JobOperationError",
            Error::Driver(_) => "DriverError",
            Error::Timeout(_) => "TimeoutError",
            Error::Webhook(_) => "WebhookError",
            Error::Store(_) | Error::StorePipeline(_) => "StoreError",
            Error::Config(_) => "ConfigError",
            Error::Serialization(_) => "SerializationError",
            Error::Io(_) => "IoError",
        }
    }
}
