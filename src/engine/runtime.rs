// src/engine/runtime.rs

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::dag::{DependencyGraph, RootPolicy, TaskSegment};
use crate::exec::{BuildAction, OutputMux, WorkerPool};
use crate::types::{BuildUnit, FailureBehaviour, OutputMode};

use super::core::{SegmentCore, SegmentEvent};
use super::result::{RunLedger, RunResult};
use super::status::{BuildStatus, HaltHandle};

/// Worker count actually used: the request clamped to `1..=total_units`
/// (at least one even when there is nothing to build).
pub fn effective_concurrency(requested: usize, total_units: usize) -> usize {
    requested.clamp(1, total_units.max(1))
}

#[derive(Debug, Clone)]
pub struct SchedulerOptions {
    /// Requested worker count, before clamping.
    pub concurrency: usize,
    pub failure_behaviour: FailureBehaviour,
    pub root_policy: RootPolicy,
    pub output: OutputMux,
}

impl Default for SchedulerOptions {
    fn default() -> Self {
        Self {
            concurrency: 1,
            failure_behaviour: FailureBehaviour::default(),
            root_policy: RootPolicy::default(),
            output: OutputMux::stdout(OutputMode::default()),
        }
    }
}

impl SchedulerOptions {
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }

    pub fn with_failure_behaviour(mut self, behaviour: FailureBehaviour) -> Self {
        self.failure_behaviour = behaviour;
        self
    }

    pub fn with_root_policy(mut self, policy: RootPolicy) -> Self {
        self.root_policy = policy;
        self
    }

    pub fn with_output(mut self, output: OutputMux) -> Self {
        self.output = output;
        self
    }
}

/// Builds task segments in order, each one concurrently across a bounded
/// worker pool, honouring the dependency graph inside the segment.
///
/// This is the async IO shell around [`SegmentCore`], which decides what to
/// submit. The scheduler itself only moves completions and interrupts from
/// the pool into the core and submissions from the core into the pool.
pub struct ConcurrentScheduler<A: BuildAction> {
    action: Arc<A>,
    options: SchedulerOptions,
    status: Arc<BuildStatus>,
}

impl<A: BuildAction> fmt::Debug for ConcurrentScheduler<A> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrentScheduler")
            .field("options", &self.options)
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

impl<A: BuildAction> ConcurrentScheduler<A> {
    pub fn new(action: A, options: SchedulerOptions) -> Self {
        Self {
            action: Arc::new(action),
            options,
            status: Arc::new(BuildStatus::new()),
        }
    }

    /// Handle for halting or interrupting the run from elsewhere (signal
    /// handlers, tests). Grab it before calling [`ConcurrentScheduler::run`].
    pub fn halt_handle(&self) -> HaltHandle {
        HaltHandle::new(Arc::clone(&self.status))
    }

    pub fn options(&self) -> &SchedulerOptions {
        &self.options
    }

    /// Run every segment in order.
    ///
    /// Never returns an error: build failures, interrupts and graph
    /// inconsistencies are all reported through the [`RunResult`]. Returns
    /// only after every submitted unit has reported back.
    pub async fn run<G>(self, segments: &[TaskSegment], graph: &G) -> RunResult
    where
        G: DependencyGraph + ?Sized,
    {
        let mut ledger = RunLedger::default();
        let segments_to_build = claim_units(segments, &mut ledger);
        let total_units: usize = segments_to_build.iter().map(TaskSegment::len).sum();
        let concurrency = effective_concurrency(self.options.concurrency, total_units);

        info!(
            segments = segments.len(),
            units = total_units,
            requested = self.options.concurrency,
            concurrency,
            behaviour = ?self.options.failure_behaviour,
            "reactor run started"
        );

        let mut pool = WorkerPool::new(
            Arc::clone(&self.action),
            concurrency,
            Arc::clone(&self.status),
            self.options.output.clone(),
        );

        for segment in segments_to_build.iter() {
            if self.status.is_interrupted() {
                ledger.record_interrupted();
                self.status.halt();
            }
            if self.status.is_halted() {
                info!(segment = %segment.name(), "reactor halted; not starting segment");
                break;
            }

            self.run_segment(segment, graph, &mut pool, &mut ledger).await;
        }

        pool.shutdown().await;

        let halted = self.status.is_halted();
        let result = ledger.into_result(segments, halted, concurrency);

        info!(
            completed = result.completed.len(),
            failures = result.failures.len(),
            never_attempted = result.never_attempted.len(),
            halted,
            "reactor run finished"
        );

        result
    }

    async fn run_segment<G>(
        &self,
        segment: &TaskSegment,
        graph: &G,
        pool: &mut WorkerPool<A>,
        ledger: &mut RunLedger,
    ) where
        G: DependencyGraph + ?Sized,
    {
        info!(segment = %segment.name(), units = segment.len(), "building segment");

        let mut core = SegmentCore::new(
            graph,
            segment,
            self.options.failure_behaviour,
            self.options.root_policy,
        );

        let step = core.seed(&self.status, ledger);
        dispatch(pool, segment.name(), step.submit);
        let mut keep_running = step.keep_running;
        let mut interrupt_seen = false;

        while keep_running {
            let event = tokio::select! {
                completion = pool.next_completion() => match completion {
                    Some(completion) => SegmentEvent::Completed(completion),
                    None => {
                        warn!(segment = %segment.name(), "completion channel closed with units outstanding");
                        break;
                    }
                },
                _ = self.status.wait_for_interrupt(), if !interrupt_seen => {
                    interrupt_seen = true;
                    SegmentEvent::Interrupted
                }
            };

            debug!(segment = %segment.name(), ?event, "segment event");

            let step = core.step(event, &self.status, ledger);
            dispatch(pool, segment.name(), step.submit);
            keep_running = step.keep_running;
        }

        debug!(
            segment = %segment.name(),
            finished = core.tracker().finished_count(),
            "segment drained"
        );
    }
}

/// Keep each unit in the first segment that lists it. Later repeats are
/// recorded as graph inconsistencies and never built.
fn claim_units(segments: &[TaskSegment], ledger: &mut RunLedger) -> Vec<TaskSegment> {
    let mut claimed: HashSet<&BuildUnit> = HashSet::new();

    segments
        .iter()
        .map(|segment| {
            let mut repeats = Vec::new();
            let kept: Vec<BuildUnit> = segment
                .units()
                .iter()
                .filter(|unit| {
                    if claimed.insert(*unit) {
                        true
                    } else {
                        repeats.push((*unit).clone());
                        false
                    }
                })
                .cloned()
                .collect();

            for unit in repeats {
                warn!(segment = %segment.name(), unit = %unit, "unit already belongs to an earlier segment; skipping");
                ledger.record_inconsistency(
                    Some(&unit),
                    format!(
                        "unit '{}' in segment '{}' already belongs to an earlier segment",
                        unit,
                        segment.name()
                    ),
                );
            }

            TaskSegment::new(segment.name(), kept)
        })
        .collect()
}

fn dispatch<A: BuildAction>(pool: &mut WorkerPool<A>, segment: &str, units: Vec<BuildUnit>) {
    for unit in units {
        pool.submit(unit, segment);
    }
}

/// Convenience wrapper: run `segments` with default options and the given
/// worker count.
pub async fn run<G, A>(
    segments: &[TaskSegment],
    graph: &G,
    action: A,
    concurrency: usize,
) -> RunResult
where
    G: DependencyGraph + ?Sized,
    A: BuildAction,
{
    let options = SchedulerOptions::default().with_concurrency(concurrency);
    ConcurrentScheduler::new(action, options)
        .run(segments, graph)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn concurrency_is_clamped_to_the_unit_count() {
        assert_eq!(effective_concurrency(8, 1), 1);
        assert_eq!(effective_concurrency(2, 5), 2);
        assert_eq!(effective_concurrency(0, 5), 1);
        assert_eq!(effective_concurrency(4, 0), 1);
    }

    #[test]
    fn repeated_units_stay_in_their_first_segment() {
        let segments = vec![
            TaskSegment::new("one", ["X"]),
            TaskSegment::new("two", ["X", "Y"]),
            TaskSegment::new("three", ["Y", "Z"]),
        ];
        let mut ledger = RunLedger::default();

        let claimed = claim_units(&segments, &mut ledger);

        let names: Vec<Vec<&str>> = claimed
            .iter()
            .map(|s| s.units().iter().map(BuildUnit::name).collect())
            .collect();
        assert_eq!(names, vec![vec!["X"], vec!["Y"], vec!["Z"]]);
        assert_eq!(ledger.failures().len(), 2);
        assert!(ledger.failures().iter().all(|f| matches!(
            f,
            crate::engine::RunFailure::GraphInconsistency { unit: Some(_), .. }
        )));
    }
}
