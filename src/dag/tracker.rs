// src/dag/tracker.rs

//! Per-segment scheduling state.
//!
//! The tracker answers two questions for the coordinator: "what can start
//! now" ([`DependencyTracker::root_eligible_units`]) and "what can start now
//! that this unit is done" ([`DependencyTracker::mark_finished`]). Both only
//! look at upstream edges that stay inside the segment; anything upstream in
//! another segment is considered satisfied.
//!
//! There is no locking here: a single coordinator owns the tracker.

use std::collections::HashSet;

use tracing::{debug, warn};

use crate::dag::graph::DependencyGraph;
use crate::dag::segment::TaskSegment;
use crate::errors::{ReactorError, Result};
use crate::types::BuildUnit;

/// What to do when a non-empty segment has no unit without in-segment
/// upstream dependencies. That can only happen when the graph has a cycle
/// inside the segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RootPolicy {
    /// Schedule the segment's first unit anyway so the run makes progress.
    #[default]
    FirstUnit,
    /// Report a [`ReactorError::GraphInconsistency`].
    Strict,
}

#[derive(Debug)]
pub struct DependencyTracker<'g, G: ?Sized> {
    graph: &'g G,
    segment: String,
    /// Segment units in the segment's own order.
    units: Vec<BuildUnit>,
    members: HashSet<BuildUnit>,
    finished: HashSet<BuildUnit>,
    root_policy: RootPolicy,
}

impl<'g, G> DependencyTracker<'g, G>
where
    G: DependencyGraph + ?Sized,
{
    pub fn new(graph: &'g G, segment: &TaskSegment) -> Self {
        Self {
            graph,
            segment: segment.name().to_string(),
            units: segment.units().to_vec(),
            members: segment.units().iter().cloned().collect(),
            finished: HashSet::new(),
            root_policy: RootPolicy::default(),
        }
    }

    pub fn with_root_policy(mut self, policy: RootPolicy) -> Self {
        self.root_policy = policy;
        self
    }

    pub fn segment_name(&self) -> &str {
        &self.segment
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn is_finished(&self, unit: &BuildUnit) -> bool {
        self.finished.contains(unit)
    }

    pub fn finished_count(&self) -> usize {
        self.finished.len()
    }

    /// Units with no in-segment upstream, in segment order.
    ///
    /// Never empty for a non-empty segment under [`RootPolicy::FirstUnit`].
    pub fn root_eligible_units(&self) -> Result<Vec<BuildUnit>> {
        let roots: Vec<BuildUnit> = self
            .units
            .iter()
            .filter(|unit| self.segment_upstream(unit).next().is_none())
            .cloned()
            .collect();

        if !roots.is_empty() || self.units.is_empty() {
            return Ok(roots);
        }

        match self.root_policy {
            RootPolicy::FirstUnit => {
                let first = self.units[0].clone();
                warn!(
                    segment = %self.segment,
                    unit = %first,
                    "no unit in segment is free of in-segment dependencies; scheduling first unit"
                );
                Ok(vec![first])
            }
            RootPolicy::Strict => Err(ReactorError::GraphInconsistency(format!(
                "segment '{}' has {} units but none without in-segment dependencies",
                self.segment,
                self.units.len()
            ))),
        }
    }

    /// Record `unit` as finished and return the in-segment downstream units
    /// that just became eligible.
    ///
    /// Each unit may be marked at most once. The unit stays recorded as
    /// finished even if an unknown downstream reference is reported.
    pub fn mark_finished(&mut self, unit: &BuildUnit) -> Result<Vec<BuildUnit>> {
        if !self.members.contains(unit) {
            return Err(ReactorError::GraphInconsistency(format!(
                "unit '{}' finished but is not a member of segment '{}'",
                unit, self.segment
            )));
        }
        if !self.finished.insert(unit.clone()) {
            return Err(ReactorError::GraphInconsistency(format!(
                "unit '{}' was marked finished twice in segment '{}'",
                unit, self.segment
            )));
        }

        let graph = self.graph;
        let mut eligible = Vec::new();

        for candidate in graph.downstream(unit) {
            if !graph.contains(candidate) {
                return Err(ReactorError::GraphInconsistency(format!(
                    "unit '{}' lists unknown downstream unit '{}'",
                    unit, candidate
                )));
            }
            if !self.members.contains(candidate) || self.finished.contains(candidate) {
                continue;
            }
            if self
                .segment_upstream(candidate)
                .all(|up| self.finished.contains(up))
            {
                eligible.push(candidate.clone());
            }
        }

        debug!(
            segment = %self.segment,
            unit = %unit,
            newly_eligible = eligible.len(),
            "unit marked finished"
        );

        Ok(eligible)
    }

    /// Segment units not yet finished, in segment order.
    pub fn unfinished_units(&self) -> Vec<BuildUnit> {
        self.units
            .iter()
            .filter(|unit| !self.finished.contains(*unit))
            .cloned()
            .collect()
    }

    /// In-segment upstream units of `unit` that are still unfinished.
    pub fn active_upstream(&self, unit: &BuildUnit) -> Vec<BuildUnit> {
        self.segment_upstream(unit)
            .filter(|up| !self.finished.contains(*up))
            .cloned()
            .collect()
    }

    fn segment_upstream<'a>(&'a self, unit: &'a BuildUnit) -> impl Iterator<Item = &'a BuildUnit> + 'a {
        self.graph
            .upstream(unit)
            .iter()
            .filter(move |up| self.members.contains(*up))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dag::graph::DagGraph;

    fn u(name: &str) -> BuildUnit {
        BuildUnit::from(name)
    }

    fn diamond() -> DagGraph {
        DagGraph::builder()
            .edge("A", "B")
            .edge("A", "C")
            .edge("B", "D")
            .edge("C", "D")
            .build()
    }

    #[test]
    fn diamond_releases_d_only_after_both_branches() {
        let graph = diamond();
        let segment = TaskSegment::new("build", ["A", "B", "C", "D"]);
        let mut tracker = DependencyTracker::new(&graph, &segment);

        assert_eq!(tracker.root_eligible_units().unwrap(), vec![u("A")]);
        assert_eq!(tracker.mark_finished(&u("A")).unwrap(), vec![u("B"), u("C")]);
        assert!(tracker.is_finished(&u("A")));
        assert!(tracker.mark_finished(&u("C")).unwrap().is_empty());
        assert_eq!(tracker.active_upstream(&u("D")), vec![u("B")]);
        assert_eq!(tracker.mark_finished(&u("B")).unwrap(), vec![u("D")]);
        assert_eq!(tracker.unfinished_units(), vec![u("D")]);
    }

    #[test]
    fn upstream_outside_the_segment_counts_as_satisfied() {
        let graph = DagGraph::builder()
            .edge("A", "B")
            .edge("B", "C")
            .edge("C", "D")
            .build();
        let second = TaskSegment::new("second", ["C", "D"]);
        let mut tracker = DependencyTracker::new(&graph, &second);

        assert_eq!(tracker.root_eligible_units().unwrap(), vec![u("C")]);
        assert_eq!(tracker.mark_finished(&u("C")).unwrap(), vec![u("D")]);
    }

    #[test]
    fn cycle_in_segment_falls_back_to_first_unit() {
        let graph = DagGraph::builder().edge("A", "B").edge("B", "A").build();
        let segment = TaskSegment::new("loop", ["B", "A"]);
        let tracker = DependencyTracker::new(&graph, &segment);

        assert_eq!(tracker.root_eligible_units().unwrap(), vec![u("B")]);
    }

    #[test]
    fn cycle_in_segment_is_an_error_under_strict_policy() {
        let graph = DagGraph::builder().edge("A", "B").edge("B", "A").build();
        let segment = TaskSegment::new("loop", ["A", "B"]);
        let tracker = DependencyTracker::new(&graph, &segment).with_root_policy(RootPolicy::Strict);

        match tracker.root_eligible_units() {
            Err(ReactorError::GraphInconsistency(msg)) => assert!(msg.contains("loop")),
            other => panic!("expected GraphInconsistency, got {other:?}"),
        }
    }

    #[test]
    fn marking_twice_or_outside_the_segment_is_rejected() {
        let graph = diamond();
        let segment = TaskSegment::new("front", ["A", "B"]);
        let mut tracker = DependencyTracker::new(&graph, &segment);

        tracker.mark_finished(&u("A")).unwrap();
        assert!(matches!(
            tracker.mark_finished(&u("A")),
            Err(ReactorError::GraphInconsistency(_))
        ));
        assert!(matches!(
            tracker.mark_finished(&u("D")),
            Err(ReactorError::GraphInconsistency(_))
        ));
        assert_eq!(tracker.finished_count(), 1);
    }

    /// Graph whose `A` points at a dependent the graph does not contain.
    struct DanglingGraph {
        a: Vec<BuildUnit>,
        none: Vec<BuildUnit>,
    }

    impl DependencyGraph for DanglingGraph {
        fn contains(&self, unit: &BuildUnit) -> bool {
            unit.name() == "A"
        }

        fn upstream(&self, _unit: &BuildUnit) -> &[BuildUnit] {
            &self.none
        }

        fn downstream(&self, unit: &BuildUnit) -> &[BuildUnit] {
            if unit.name() == "A" { &self.a } else { &self.none }
        }
    }

    #[test]
    fn unknown_downstream_reference_is_an_inconsistency() {
        let graph = DanglingGraph {
            a: vec![u("ghost")],
            none: Vec::new(),
        };
        let segment = TaskSegment::new("build", ["A"]);
        let mut tracker = DependencyTracker::new(&graph, &segment);

        assert_eq!(tracker.root_eligible_units().unwrap(), vec![u("A")]);
        match tracker.mark_finished(&u("A")) {
            Err(ReactorError::GraphInconsistency(msg)) => assert!(msg.contains("ghost")),
            other => panic!("expected GraphInconsistency, got {other:?}"),
        }
        assert!(tracker.is_finished(&u("A")));
    }

    #[test]
    fn empty_segment_has_no_roots() {
        let graph = diamond();
        let segment = TaskSegment::new("nothing", Vec::<BuildUnit>::new());
        let tracker = DependencyTracker::new(&graph, &segment);

        assert!(tracker.root_eligible_units().unwrap().is_empty());
        assert!(tracker.is_empty());
    }
}
