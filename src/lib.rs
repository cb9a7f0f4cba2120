//! # NetPulse
//!
//! A distributed job dispatcher for executing commands and pushing
//! configuration against network and server devices over SSH-family
//! transports.
//!
//! ## Core Concepts
//!
//! - **Dispatcher**: turns an [`model::ExecutionRequest`] into a queued
//!   [`model::Job`], picking between a shared FIFO queue and a host-pinned
//!   queue depending on the driver's session semantics.
//! - **Queues**: named, store-backed job lists with per-status registries
//!   (`queued`, `started`, `finished`, `failed`, `canceled`).
//! - **Workers**: `NodeWorker` owns a node's capacity and spawns
//!   `PinnedWorker`s for individual hosts; `FifoWorker` drains the shared
//!   queue directly.
//! - **Drivers**: the seam between the execute pipeline and a concrete
//!   device protocol.
//! - **Callbacks**: name-resolved hooks fired after a job reaches a
//!   terminal state (webhook delivery, exception normalization).
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                         REST API (api::)                             │
//! │              API-key auth, /device, /job, /worker, /template         │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!                                    ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                      Dispatcher (manager::Manager)                    │
//! │         FIFO vs PINNED assignment, liveness checks, retries          │
//! └─────────────────────────────────────────────────────────────────────┘
//!                                    │
//!          ┌─────────────────────────┼─────────────────────────┐
//!          ▼                         ▼                         ▼
//! ┌─────────────────┐   ┌─────────────────────┐   ┌─────────────────────┐
//! │   Queue (queue::)│   │  Scheduler          │   │  Store (store::)    │
//! │   FifoQ/NodeQ/   │   │  (least_load, ...)  │   │  Redis or in-memory │
//! │   HostQ          │   │                      │   │                    │
//! └─────────────────┘   └─────────────────────┘   └─────────────────────┘
//!          │
//!          ▼
//! ┌─────────────────────────────────────────────────────────────────────┐
//! │                  Workers (worker::{node,pinned,fifo})                 │
//! │      execute pipeline: render -> driver connect/send -> parse        │
//! └─────────────────────────────────────────────────────────────────────┘
//! ```

#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

/// Error types and result alias shared across every module.
pub mod error;

/// Core data model: [`model::ExecutionRequest`], [`model::Job`], node and
/// worker bookkeeping types.
pub mod model;

/// Layered configuration (env -> YAML -> defaults).
pub mod config;

/// State store client: the [`store::StateStore`] trait plus the Redis and
/// in-memory implementations.
pub mod store;

/// Named job queues and per-status registries.
pub mod queue;

/// Node-selection strategies consulted by the dispatcher.
pub mod scheduler;

/// Protocol driver contract and built-in drivers.
pub mod driver;

/// The execute pipeline: render, connect, send/config, disconnect, parse.
pub mod executor;

/// Named callback plugins fired on job completion.
pub mod callback;

/// Worker runtimes: `NodeWorker`, `PinnedWorker`, `FifoWorker`.
pub mod worker;

/// The dispatcher: turns requests into queued jobs and manages node/host
/// bindings.
pub mod manager;

/// REST API server, gated behind the `api` feature.
#[cfg(feature = "api")]
pub mod api;

/// Returns the current version of NetPulse.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
