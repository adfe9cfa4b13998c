// src/dag/segment.rs

use std::collections::HashSet;

use crate::config::model::ConfigFile;
use crate::types::BuildUnit;

/// A named group of units that must be fully built (or halted) before the
/// next segment starts.
///
/// Membership is fixed at construction. Duplicates are dropped, keeping the
/// first occurrence, so iteration order is stable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSegment {
    name: String,
    units: Vec<BuildUnit>,
}

impl TaskSegment {
    pub fn new<I, U>(name: impl Into<String>, units: I) -> Self
    where
        I: IntoIterator<Item = U>,
        U: Into<BuildUnit>,
    {
        let mut seen = HashSet::new();
        let units = units
            .into_iter()
            .map(Into::into)
            .filter(|unit: &BuildUnit| seen.insert(unit.clone()))
            .collect();

        Self {
            name: name.into(),
            units,
        }
    }

    /// Segments declared in a validated reactor file, in order.
    pub fn from_config(cfg: &ConfigFile) -> Vec<TaskSegment> {
        cfg.segment
            .iter()
            .map(|s| TaskSegment::new(s.name.clone(), s.modules.iter().map(String::as_str)))
            .collect()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn units(&self) -> &[BuildUnit] {
        &self.units
    }

    pub fn contains(&self, unit: &BuildUnit) -> bool {
        self.units.contains(unit)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
