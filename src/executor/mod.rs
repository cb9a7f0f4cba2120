//! The execute pipeline (§4.7): render, normalize, connect, send/config,
//! disconnect, parse. [`pipeline::run`] is the single entry point a worker
//! calls once it has popped a [`crate::model::Job`] and resolved a driver
//! for it.

pub mod parse;
pub mod pipeline;
pub mod render;

pub use pipeline::run;
