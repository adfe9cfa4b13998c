// src/exec/backend.rs

//! Pluggable build action abstraction.
//!
//! The worker pool talks to a [`BuildAction`] instead of spawning processes
//! directly. Production uses [`crate::exec::CommandAction`], which runs the
//! module's shell command; tests provide their own implementation that
//! records calls, sleeps or fails on demand.
//!
//! Any `Fn(BuildUnit, BuildContext) -> impl Future` closure is also a
//! `BuildAction`, which keeps one-off actions in tests short.

use std::future::Future;
use std::pin::Pin;

use crate::engine::HaltHandle;
use crate::errors::BuildError;
use crate::exec::output::UnitOutput;
use crate::types::BuildUnit;

pub type BuildFuture = Pin<Box<dyn Future<Output = Result<(), BuildError>> + Send>>;

/// Builds one module.
///
/// Called at most once per unit per run, from a worker task. The returned
/// future must be `'static`: clone whatever the action needs out of `self`.
pub trait BuildAction: Send + Sync + 'static {
    fn build(&self, unit: BuildUnit, ctx: BuildContext) -> BuildFuture;
}

impl<F, Fut> BuildAction for F
where
    F: Fn(BuildUnit, BuildContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), BuildError>> + Send + 'static,
{
    fn build(&self, unit: BuildUnit, ctx: BuildContext) -> BuildFuture {
        Box::pin(self(unit, ctx))
    }
}

/// Per-invocation context handed to a build action.
#[derive(Debug, Clone)]
pub struct BuildContext {
    unit: BuildUnit,
    segment: String,
    output: UnitOutput,
    halt: HaltHandle,
}

impl BuildContext {
    pub fn new(unit: BuildUnit, segment: impl Into<String>, output: UnitOutput, halt: HaltHandle) -> Self {
        Self {
            unit,
            segment: segment.into(),
            output,
            halt,
        }
    }

    pub fn unit(&self) -> &BuildUnit {
        &self.unit
    }

    pub fn segment(&self) -> &str {
        &self.segment
    }

    /// Line sink for this unit's console output.
    pub fn output(&self) -> &UnitOutput {
        &self.output
    }

    /// Lets an action stop the rest of the run.
    pub fn halt_handle(&self) -> &HaltHandle {
        &self.halt
    }
}
