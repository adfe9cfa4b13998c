// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the [`BuildAction`] trait the worker pool calls,
//!   plus the per-invocation [`BuildContext`].
//! - [`pool`] owns the bounded [`WorkerPool`] that runs actions and reports
//!   completions back to the engine.
//! - [`output`] multiplexes the console output of concurrently building
//!   modules.
//! - [`command`] is the production action: run the module's shell command.

pub mod backend;
pub mod command;
pub mod output;
pub mod pool;

pub use backend::{BuildAction, BuildContext, BuildFuture};
pub use command::CommandAction;
pub use output::{OutputMux, UnitOutput};
pub use pool::WorkerPool;
