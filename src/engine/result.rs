// src/engine/result.rs

//! Failure records, per-unit summaries and the final [`RunResult`].

use std::collections::HashSet;
use std::fmt::Write as _;
use std::time::Duration;

use thiserror::Error;

use crate::dag::TaskSegment;
use crate::errors::BuildError;
use crate::types::{BuildUnit, FailureBehaviour};

/// A failure accumulated during a run. Failures never escape `run` as
/// errors; the caller decides what they mean.
#[derive(Debug, Error)]
pub enum RunFailure {
    /// A unit's build action failed. Its dependents are never attempted.
    #[error("module '{unit}' failed: {error}")]
    BuildAction { unit: BuildUnit, error: BuildError },

    /// The run was interrupted by the operator.
    #[error("build interrupted")]
    Interrupted,

    /// The graph or segments broke the scheduler's contract.
    #[error("graph inconsistency: {message}")]
    GraphInconsistency {
        unit: Option<BuildUnit>,
        message: String,
    },
}

impl RunFailure {
    /// The unit this failure is attributed to, if any.
    pub fn unit(&self) -> Option<&BuildUnit> {
        match self {
            RunFailure::BuildAction { unit, .. } => Some(unit),
            RunFailure::GraphInconsistency { unit, .. } => unit.as_ref(),
            RunFailure::Interrupted => None,
        }
    }

    pub fn is_build_failure(&self) -> bool {
        matches!(self, RunFailure::BuildAction { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStatus {
    Success,
    Failure,
    Skipped,
}

/// One line of the reactor summary.
#[derive(Debug, Clone)]
pub struct BuildSummary {
    pub unit: BuildUnit,
    pub segment: String,
    pub status: SummaryStatus,
    pub elapsed: Duration,
}

/// Outcome of a whole run.
///
/// `completed`, `failed_units()` and `never_attempted` are pairwise disjoint
/// and together cover every unit of every segment handed to the run.
#[derive(Debug)]
pub struct RunResult {
    /// Units whose build action succeeded, in completion order.
    pub completed: Vec<BuildUnit>,
    /// Failures in the order they were recorded.
    pub failures: Vec<RunFailure>,
    /// Units whose build action never ran, in segment order.
    pub never_attempted: Vec<BuildUnit>,
    /// One entry per unit that reached a worker (including skipped ones).
    pub summaries: Vec<BuildSummary>,
    /// Whether the halt flag was raised at any point, by fail-fast, an
    /// interrupt, an inconsistency or a `HaltHandle`. Set even when every
    /// unit had already finished.
    pub halted_early: bool,
    /// Worker count actually used.
    pub concurrency: usize,
}

impl RunResult {
    /// Units whose build action failed, in failure order.
    pub fn failed_units(&self) -> Vec<BuildUnit> {
        self.failures
            .iter()
            .filter_map(|f| match f {
                RunFailure::BuildAction { unit, .. } => Some(unit.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.halted_early
    }

    /// Success as judged under a failure behaviour: with `FailNever`, build
    /// failures alone do not fail the run.
    pub fn is_success_for(&self, behaviour: FailureBehaviour) -> bool {
        match behaviour {
            FailureBehaviour::FailNever => {
                !self.halted_early && self.failures.iter().all(RunFailure::is_build_failure)
            }
            FailureBehaviour::FailFast | FailureBehaviour::FailAtEnd => self.is_success(),
        }
    }

    pub fn was_interrupted(&self) -> bool {
        self.failures
            .iter()
            .any(|f| matches!(f, RunFailure::Interrupted))
    }

    /// Human-readable reactor summary, one line per unit.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "Reactor Summary ({} workers):", self.concurrency);

        let width = self
            .summaries
            .iter()
            .map(|s| s.unit.name().len())
            .chain(self.never_attempted.iter().map(|u| u.name().len()))
            .max()
            .unwrap_or(0)
            + 2;

        for summary in self.summaries.iter() {
            let label = match summary.status {
                SummaryStatus::Success => "SUCCESS",
                SummaryStatus::Failure => "FAILURE",
                SummaryStatus::Skipped => "SKIPPED",
            };
            let _ = writeln!(
                out,
                "  {:.<width$} {} [{:.3} s]",
                format!("{} ", summary.unit),
                label,
                summary.elapsed.as_secs_f64(),
                width = width
            );
        }

        let skipped: HashSet<&BuildUnit> = self
            .summaries
            .iter()
            .filter(|s| s.status == SummaryStatus::Skipped)
            .map(|s| &s.unit)
            .collect();
        for unit in self.never_attempted.iter().filter(|u| !skipped.contains(u)) {
            let _ = writeln!(out, "  {:.<width$} NOT BUILT", format!("{unit} "), width = width);
        }

        for failure in self.failures.iter() {
            let _ = writeln!(out, "  error: {failure}");
        }

        let verdict = if self.is_success() { "BUILD SUCCESS" } else { "BUILD FAILURE" };
        let _ = writeln!(out, "{verdict}");
        out
    }
}

/// Accumulates completions and failures across every segment of a run.
#[derive(Debug, Default)]
pub struct RunLedger {
    completed: Vec<BuildUnit>,
    failed: HashSet<BuildUnit>,
    failures: Vec<RunFailure>,
    summaries: Vec<BuildSummary>,
    interrupted: bool,
}

impl RunLedger {
    pub fn record_success(&mut self, unit: &BuildUnit, segment: &str, elapsed: Duration) {
        self.completed.push(unit.clone());
        self.summaries.push(BuildSummary {
            unit: unit.clone(),
            segment: segment.to_string(),
            status: SummaryStatus::Success,
            elapsed,
        });
    }

    pub fn record_failure(
        &mut self,
        unit: &BuildUnit,
        segment: &str,
        error: BuildError,
        elapsed: Duration,
    ) {
        self.failed.insert(unit.clone());
        self.summaries.push(BuildSummary {
            unit: unit.clone(),
            segment: segment.to_string(),
            status: SummaryStatus::Failure,
            elapsed,
        });
        self.failures.push(RunFailure::BuildAction {
            unit: unit.clone(),
            error,
        });
    }

    pub fn record_skipped(&mut self, unit: &BuildUnit, segment: &str) {
        self.summaries.push(BuildSummary {
            unit: unit.clone(),
            segment: segment.to_string(),
            status: SummaryStatus::Skipped,
            elapsed: Duration::ZERO,
        });
    }

    pub fn record_inconsistency(&mut self, unit: Option<&BuildUnit>, message: impl Into<String>) {
        self.failures.push(RunFailure::GraphInconsistency {
            unit: unit.cloned(),
            message: message.into(),
        });
    }

    /// Recorded at most once per run.
    pub fn record_interrupted(&mut self) {
        if !self.interrupted {
            self.interrupted = true;
            self.failures.push(RunFailure::Interrupted);
        }
    }

    pub fn completed(&self) -> &[BuildUnit] {
        &self.completed
    }

    pub fn failures(&self) -> &[RunFailure] {
        &self.failures
    }

    /// Close the ledger. Every segment unit that neither completed nor
    /// failed is reported as never attempted.
    pub fn into_result(
        self,
        segments: &[TaskSegment],
        halted_early: bool,
        concurrency: usize,
    ) -> RunResult {
        let done: HashSet<&BuildUnit> = self.completed.iter().chain(self.failed.iter()).collect();
        let mut seen = HashSet::new();

        let never_attempted = segments
            .iter()
            .flat_map(|s| s.units().iter())
            .filter(|unit| !done.contains(*unit) && seen.insert(*unit))
            .cloned()
            .collect();

        RunResult {
            completed: self.completed,
            failures: self.failures,
            never_attempted,
            summaries: self.summaries,
            halted_early,
            concurrency,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u(name: &str) -> BuildUnit {
        BuildUnit::from(name)
    }

    #[test]
    fn ledger_partitions_units_into_three_disjoint_sets() {
        let segments = vec![
            TaskSegment::new("one", ["A", "B"]),
            TaskSegment::new("two", ["C", "D"]),
        ];
        let mut ledger = RunLedger::default();
        ledger.record_success(&u("A"), "one", Duration::from_millis(5));
        ledger.record_failure(&u("B"), "one", BuildError::ExitStatus(2), Duration::ZERO);
        ledger.record_skipped(&u("C"), "two");

        let result = ledger.into_result(&segments, true, 2);

        assert_eq!(result.completed, vec![u("A")]);
        assert_eq!(result.failed_units(), vec![u("B")]);
        assert_eq!(result.never_attempted, vec![u("C"), u("D")]);
        assert!(!result.is_success());
    }

    #[test]
    fn fail_never_ignores_build_failures_but_not_interrupts() {
        let segments = vec![TaskSegment::new("one", ["A"])];
        let mut ledger = RunLedger::default();
        ledger.record_failure(&u("A"), "one", BuildError::msg("boom"), Duration::ZERO);
        let result = ledger.into_result(&segments, false, 1);
        assert!(result.is_success_for(FailureBehaviour::FailNever));
        assert!(!result.is_success_for(FailureBehaviour::FailAtEnd));

        let mut ledger = RunLedger::default();
        ledger.record_interrupted();
        ledger.record_interrupted();
        let result = ledger.into_result(&segments, true, 1);
        assert_eq!(result.failures.len(), 1);
        assert!(result.was_interrupted());
        assert!(!result.is_success_for(FailureBehaviour::FailNever));
    }

    #[test]
    fn summary_lists_every_unit() {
        let segments = vec![TaskSegment::new("one", ["core", "app"])];
        let mut ledger = RunLedger::default();
        ledger.record_failure(&u("core"), "one", BuildError::ExitStatus(1), Duration::ZERO);
        let text = ledger.into_result(&segments, false, 4).render_summary();

        assert!(text.contains("core"));
        assert!(text.contains("FAILURE"));
        assert!(text.contains("app"));
        assert!(text.contains("NOT BUILT"));
        assert!(text.contains("BUILD FAILURE"));
    }
}
