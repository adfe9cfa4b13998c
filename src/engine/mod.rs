// src/engine/mod.rs

//! Orchestration engine for the reactor.
//!
//! This module ties together:
//! - the per-segment dependency tracker
//! - the bounded worker pool that runs build actions
//! - run-scoped halt / interrupt state
//! - accumulation of completions and failures into a [`RunResult`]
//!
//! The pure per-segment state machine lives in [`core`]; the async shell that
//! drives the pool is [`runtime`].

use std::time::Duration;

use crate::errors::BuildError;
use crate::types::BuildUnit;

/// Terminal outcome of one submitted unit.
#[derive(Debug)]
pub enum UnitOutcome {
    /// The build action returned `Ok`.
    Success,
    /// The build action returned an error, panicked, or was abandoned.
    Failed(BuildError),
    /// The run halted before the unit got a worker; its action never ran.
    Skipped,
}

/// Completion record delivered by the pool, in arrival order.
#[derive(Debug)]
pub struct UnitCompletion {
    pub unit: BuildUnit,
    pub outcome: UnitOutcome,
    /// Time spent inside the build action (zero for skipped units).
    pub elapsed: Duration,
}

pub mod core;
pub mod result;
pub mod runtime;
pub mod status;

pub use self::core::{CoreStep, SegmentCore, SegmentEvent};
pub use result::{BuildSummary, RunFailure, RunLedger, RunResult, SummaryStatus};
pub use runtime::{effective_concurrency, run, ConcurrentScheduler, SchedulerOptions};
pub use status::{BuildStatus, HaltHandle};
pub use crate::types::FailureBehaviour;
