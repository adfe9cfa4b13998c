// src/exec/pool.rs

//! Bounded worker pool.
//!
//! Every submitted unit gets its own Tokio task, but only `size` of them may
//! hold a permit (and therefore run their build action) at any time. Each
//! submission produces exactly one [`UnitCompletion`] on the pool's
//! completion channel, in the order units actually finish:
//!
//! - `Success` / `Failed(..)` once the action returned,
//! - `Failed(Panicked)` if the action panicked,
//! - `Skipped` if the run halted while the unit was still waiting for a
//!   permit (its action never ran),
//! - `Failed(Abandoned)` if the worker task went away without reporting.

use std::any::Any;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::engine::{BuildStatus, HaltHandle, UnitCompletion, UnitOutcome};
use crate::errors::BuildError;
use crate::exec::backend::{BuildAction, BuildContext};
use crate::exec::output::OutputMux;
use crate::types::BuildUnit;

pub struct WorkerPool<A: BuildAction> {
    action: Arc<A>,
    permits: Arc<Semaphore>,
    size: usize,
    status: Arc<BuildStatus>,
    output: OutputMux,
    tasks: JoinSet<()>,
    completion_tx: mpsc::UnboundedSender<UnitCompletion>,
    completion_rx: mpsc::UnboundedReceiver<UnitCompletion>,
}

impl<A: BuildAction> std::fmt::Debug for WorkerPool<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("size", &self.size)
            .field("available", &self.permits.available_permits())
            .field("tasks", &self.tasks.len())
            .finish_non_exhaustive()
    }
}

impl<A: BuildAction> WorkerPool<A> {
    /// `size` is clamped to at least one worker.
    pub fn new(action: Arc<A>, size: usize, status: Arc<BuildStatus>, output: OutputMux) -> Self {
        let size = size.max(1);
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            action,
            permits: Arc::new(Semaphore::new(size)),
            size,
            status,
            output,
            tasks: JoinSet::new(),
            completion_tx,
            completion_rx,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Queue `unit` for building. Never blocks; the worker task waits for a
    /// permit on its own.
    pub fn submit(&mut self, unit: BuildUnit, segment: &str) {
        debug!(unit = %unit, segment, "submitting unit to worker pool");

        let action = Arc::clone(&self.action);
        let permits = Arc::clone(&self.permits);
        let status = Arc::clone(&self.status);
        let output = self.output.clone();
        let segment = segment.to_string();
        let guard = CompletionGuard::new(unit.clone(), self.completion_tx.clone(), output.clone());

        self.tasks.spawn(async move {
            let permit = match permits.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    warn!(unit = %unit, "worker permits closed; abandoning unit");
                    return;
                }
            };

            if status.is_halted() {
                drop(permit);
                debug!(unit = %unit, "reactor halted before unit started; skipping");
                guard.report(UnitOutcome::Skipped, Duration::ZERO);
                return;
            }

            let ctx = BuildContext::new(
                unit.clone(),
                segment,
                output.unit(&unit),
                HaltHandle::new(status),
            );

            debug!(unit = %unit, "starting build action");
            let started = Instant::now();
            // Run the action in its own task so a panic surfaces as a
            // JoinError instead of tearing down this worker.
            let joined = tokio::spawn(async move { action.build(unit, ctx).await }).await;
            let elapsed = started.elapsed();

            let outcome = match joined {
                Ok(Ok(())) => UnitOutcome::Success,
                Ok(Err(err)) => UnitOutcome::Failed(err),
                Err(join_err) if join_err.is_panic() => UnitOutcome::Failed(BuildError::Panicked(
                    panic_message(join_err.into_panic()),
                )),
                Err(_) => UnitOutcome::Failed(BuildError::Abandoned),
            };

            drop(permit);
            guard.report(outcome, elapsed);
        });
    }

    /// Next completion in arrival order. Only meaningful while something is
    /// outstanding; otherwise it waits forever.
    pub async fn next_completion(&mut self) -> Option<UnitCompletion> {
        let completion = self.completion_rx.recv().await;

        while let Some(res) = self.tasks.try_join_next() {
            if let Err(e) = res {
                warn!(error = %e, "worker task ended abnormally");
            }
        }

        completion
    }

    /// Wait for every worker task to exit.
    pub async fn shutdown(mut self) {
        while let Some(res) = self.tasks.join_next().await {
            if let Err(e) = res {
                warn!(error = %e, "worker task ended abnormally");
            }
        }
        debug!("worker pool shut down");
    }
}

/// Sends the unit's completion exactly once: explicitly through
/// [`CompletionGuard::report`], or as `Failed(Abandoned)` when dropped
/// without reporting.
struct CompletionGuard {
    unit: BuildUnit,
    tx: mpsc::UnboundedSender<UnitCompletion>,
    output: OutputMux,
    reported: bool,
}

impl CompletionGuard {
    fn new(unit: BuildUnit, tx: mpsc::UnboundedSender<UnitCompletion>, output: OutputMux) -> Self {
        Self {
            unit,
            tx,
            output,
            reported: false,
        }
    }

    fn report(mut self, outcome: UnitOutcome, elapsed: Duration) {
        self.send(outcome, elapsed);
    }

    fn send(&mut self, outcome: UnitOutcome, elapsed: Duration) {
        self.reported = true;
        // Buffered output lands before the coordinator sees the completion.
        self.output.finish(&self.unit);

        let completion = UnitCompletion {
            unit: self.unit.clone(),
            outcome,
            elapsed,
        };
        if self.tx.send(completion).is_err() {
            debug!(unit = %self.unit, "completion receiver gone; dropping completion");
        }
    }
}

impl Drop for CompletionGuard {
    fn drop(&mut self) {
        if !self.reported {
            self.send(UnitOutcome::Failed(BuildError::Abandoned), Duration::ZERO);
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
