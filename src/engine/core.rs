// src/engine/core.rs

//! Pure per-segment state machine.
//!
//! [`SegmentCore`] consumes completion events and produces the units the
//! async shell (`engine::runtime::ConcurrentScheduler`) should submit next.
//! It owns the segment's [`DependencyTracker`] and the count of outstanding
//! submissions, and writes results into the run's [`RunLedger`].
//!
//! The core has no channels and performs no IO, so it can be stepped by hand
//! in tests.

use std::collections::HashSet;

use tracing::{debug, info, warn};

use crate::dag::{downstream_closure, DependencyGraph, DependencyTracker, RootPolicy, TaskSegment};
use crate::engine::result::RunLedger;
use crate::engine::status::BuildStatus;
use crate::engine::{UnitCompletion, UnitOutcome};
use crate::types::{BuildUnit, FailureBehaviour};

/// Input to [`SegmentCore::step`].
#[derive(Debug)]
pub enum SegmentEvent {
    /// A submitted unit reached a terminal state.
    Completed(UnitCompletion),
    /// The operator interrupted the run while the coordinator was waiting.
    Interrupted,
}

/// Decision returned by the core after seeding or handling one event.
#[derive(Debug, Clone, Default)]
pub struct CoreStep {
    /// Units to hand to the worker pool now.
    pub submit: Vec<BuildUnit>,
    /// Whether the coordinator should keep waiting for completions in this
    /// segment (`false` once nothing is outstanding).
    pub keep_running: bool,
}

#[derive(Debug)]
pub struct SegmentCore<'g, G: ?Sized> {
    graph: &'g G,
    tracker: DependencyTracker<'g, G>,
    behaviour: FailureBehaviour,
    /// Every unit ever handed out; guards against double submission.
    submitted: HashSet<BuildUnit>,
    in_flight: usize,
}

impl<'g, G> SegmentCore<'g, G>
where
    G: DependencyGraph + ?Sized,
{
    pub fn new(
        graph: &'g G,
        segment: &TaskSegment,
        behaviour: FailureBehaviour,
        root_policy: RootPolicy,
    ) -> Self {
        Self {
            graph,
            tracker: DependencyTracker::new(graph, segment).with_root_policy(root_policy),
            behaviour,
            submitted: HashSet::new(),
            in_flight: 0,
        }
    }

    pub fn segment_name(&self) -> &str {
        self.tracker.segment_name()
    }

    /// Submissions that have not reported back yet.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn tracker(&self) -> &DependencyTracker<'g, G> {
        &self.tracker
    }

    /// Hand out the segment's initially eligible units.
    pub fn seed(&mut self, status: &BuildStatus, ledger: &mut RunLedger) -> CoreStep {
        match self.tracker.root_eligible_units() {
            Ok(roots) => {
                debug!(segment = %self.segment_name(), ?roots, "segment roots");
                let submit = self.admit(roots, status);
                CoreStep {
                    submit,
                    keep_running: self.in_flight > 0,
                }
            }
            Err(err) => {
                warn!(segment = %self.segment_name(), error = %err, "cannot seed segment");
                ledger.record_inconsistency(None, err.to_string());
                status.halt();
                CoreStep::default()
            }
        }
    }

    /// Handle a single event, updating the tracker and ledger.
    pub fn step(
        &mut self,
        event: SegmentEvent,
        status: &BuildStatus,
        ledger: &mut RunLedger,
    ) -> CoreStep {
        let submit = match event {
            SegmentEvent::Completed(completion) => self.on_completion(completion, status, ledger),
            SegmentEvent::Interrupted => {
                warn!(
                    segment = %self.segment_name(),
                    in_flight = self.in_flight,
                    "build interrupted; draining running modules"
                );
                ledger.record_interrupted();
                status.halt();
                Vec::new()
            }
        };

        CoreStep {
            submit,
            keep_running: self.in_flight > 0,
        }
    }

    fn on_completion(
        &mut self,
        completion: UnitCompletion,
        status: &BuildStatus,
        ledger: &mut RunLedger,
    ) -> Vec<BuildUnit> {
        let UnitCompletion {
            unit,
            outcome,
            elapsed,
        } = completion;

        if !self.submitted.contains(&unit) {
            warn!(unit = %unit, "completion for a unit this segment never submitted; ignoring");
            return Vec::new();
        }
        self.in_flight = self.in_flight.saturating_sub(1);

        let segment = self.tracker.segment_name().to_string();

        match outcome {
            UnitOutcome::Success => {
                info!(segment = %segment, unit = %unit, elapsed_ms = elapsed.as_millis() as u64, "module built");
                ledger.record_success(&unit, &segment, elapsed);

                match self.tracker.mark_finished(&unit) {
                    Ok(eligible) => self.admit(eligible, status),
                    Err(err) => {
                        warn!(unit = %unit, error = %err, "dependency tracking failed; halting");
                        ledger.record_inconsistency(Some(&unit), err.to_string());
                        status.halt();
                        Vec::new()
                    }
                }
            }
            UnitOutcome::Failed(error) => {
                warn!(segment = %segment, unit = %unit, error = %error, "module failed");
                ledger.record_failure(&unit, &segment, error, elapsed);

                match self.behaviour {
                    FailureBehaviour::FailFast => status.halt(),
                    FailureBehaviour::FailAtEnd | FailureBehaviour::FailNever => {
                        status.blacklist(downstream_closure(self.graph, &unit));
                    }
                }
                Vec::new()
            }
            UnitOutcome::Skipped => {
                debug!(segment = %segment, unit = %unit, "module skipped");
                ledger.record_skipped(&unit, &segment);
                Vec::new()
            }
        }
    }

    /// Filter candidates down to what may actually be submitted and count
    /// them as in flight.
    fn admit(&mut self, candidates: Vec<BuildUnit>, status: &BuildStatus) -> Vec<BuildUnit> {
        if status.is_halted() {
            if !candidates.is_empty() {
                debug!(count = candidates.len(), "reactor halted; not submitting eligible units");
            }
            return Vec::new();
        }

        let mut admitted = Vec::with_capacity(candidates.len());
        for unit in candidates {
            if status.is_blacklisted(&unit) {
                debug!(unit = %unit, "upstream failed; unit will not be built");
                continue;
            }
            if !self.submitted.insert(unit.clone()) {
                warn!(unit = %unit, "unit already submitted; not submitting again");
                continue;
            }
            admitted.push(unit);
        }

        self.in_flight += admitted.len();
        admitted
    }
}
