// src/dag/mod.rs

//! Module graph and per-segment dependency tracking.
//!
//! - [`graph`] holds the read-only dependency graph and the
//!   [`DependencyGraph`] trait the scheduler consumes.
//! - [`segment`] defines [`TaskSegment`], an ordered group of units.
//! - [`tracker`] contains [`DependencyTracker`], which decides which units
//!   of a segment are eligible as others finish.

pub mod graph;
pub mod segment;
pub mod tracker;

pub use graph::{downstream_closure, DagGraph, DagGraphBuilder, DependencyGraph};
pub use segment::TaskSegment;
pub use tracker::{DependencyTracker, RootPolicy};
