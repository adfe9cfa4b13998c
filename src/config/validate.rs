// src/config/validate.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::config::model::{ConfigFile, RawConfigFile, SegmentConfig};
use crate::errors::{ReactorError, Result};
use crate::types::Threads;

/// Name of the segment used when the reactor file declares none.
pub const DEFAULT_SEGMENT: &str = "build";

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::ReactorError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        let threads = validate_raw_config(&raw)?;

        let segment = if raw.segment.is_empty() {
            vec![SegmentConfig {
                name: DEFAULT_SEGMENT.to_string(),
                modules: raw.module.keys().cloned().collect(),
            }]
        } else {
            raw.segment
        };

        Ok(ConfigFile::new_unchecked(raw.reactor, threads, raw.module, segment))
    }
}

/// Returns the parsed worker count.
fn validate_raw_config(cfg: &RawConfigFile) -> Result<Threads> {
    ensure_has_modules(cfg)?;
    let threads = validate_reactor_section(cfg)?;
    validate_module_dependencies(cfg)?;
    validate_dag(cfg)?;
    validate_segments(cfg)?;
    Ok(threads)
}

fn ensure_has_modules(cfg: &RawConfigFile) -> Result<()> {
    if cfg.module.is_empty() {
        return Err(ReactorError::ConfigError(
            "reactor file must contain at least one [module.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_reactor_section(cfg: &RawConfigFile) -> Result<Threads> {
    // `fail` and `output` are strongly typed and checked during
    // deserialization.
    cfg.reactor
        .threads
        .parse::<Threads>()
        .map_err(|e| ReactorError::ConfigError(format!("[reactor].threads: {e}")))
}

fn validate_module_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, module) in cfg.module.iter() {
        for dep in module.after.iter() {
            if dep == name {
                return Err(ReactorError::ConfigError(format!(
                    "module '{}' cannot depend on itself in `after`",
                    name
                )));
            }
            if !cfg.module.contains_key(dep) {
                return Err(ReactorError::ConfigError(format!(
                    "module '{}' has unknown dependency '{}' in `after`",
                    name, dep
                )));
            }
        }
    }
    Ok(())
}

fn validate_dag(cfg: &RawConfigFile) -> Result<()> {
    // Edge direction: dep -> module
    // For:
    //   [module.B]
    //   after = ["A"]
    // we add edge A -> B.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for name in cfg.module.keys() {
        graph.add_node(name.as_str());
    }

    for (name, module) in cfg.module.iter() {
        for dep in module.after.iter() {
            graph.add_edge(dep.as_str(), name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(_order) => Ok(()),
        Err(cycle) => Err(ReactorError::DagCycle(format!(
            "cycle detected in module graph involving module '{}'",
            cycle.node_id()
        ))),
    }
}

/// Explicit segments must partition the module set: every module appears in
/// exactly one segment and no segment is empty.
fn validate_segments(cfg: &RawConfigFile) -> Result<()> {
    if cfg.segment.is_empty() {
        return Ok(());
    }

    let mut owner: HashMap<&str, &str> = HashMap::new();

    for segment in cfg.segment.iter() {
        if segment.modules.is_empty() {
            return Err(ReactorError::ConfigError(format!(
                "segment '{}' lists no modules",
                segment.name
            )));
        }

        for module in segment.modules.iter() {
            if !cfg.module.contains_key(module) {
                return Err(ReactorError::ConfigError(format!(
                    "segment '{}' references unknown module '{}'",
                    segment.name, module
                )));
            }
            if let Some(previous) = owner.insert(module.as_str(), segment.name.as_str()) {
                if previous == segment.name {
                    return Err(ReactorError::ConfigError(format!(
                        "module '{}' is listed twice in segment '{}'",
                        module, segment.name
                    )));
                }
                return Err(ReactorError::ConfigError(format!(
                    "module '{}' appears in both segment '{}' and segment '{}'",
                    module, previous, segment.name
                )));
            }
        }
    }

    if let Some(missing) = cfg.module.keys().find(|m| !owner.contains_key(m.as_str())) {
        return Err(ReactorError::ConfigError(format!(
            "module '{}' is not assigned to any segment",
            missing
        )));
    }

    validate_segment_order(cfg)
}

/// An `after` dependency must sit in the same segment as its dependent or in
/// an earlier one.
fn validate_segment_order(cfg: &RawConfigFile) -> Result<()> {
    let position: HashMap<&str, usize> = cfg
        .segment
        .iter()
        .enumerate()
        .flat_map(|(idx, segment)| segment.modules.iter().map(move |m| (m.as_str(), idx)))
        .collect();

    for (name, module) in cfg.module.iter() {
        let Some(&own) = position.get(name.as_str()) else {
            continue;
        };
        for dep in module.after.iter() {
            if let Some(&dep_pos) = position.get(dep.as_str()) {
                if dep_pos > own {
                    return Err(ReactorError::ConfigError(format!(
                        "module '{}' in segment '{}' depends on '{}' from later segment '{}'",
                        name, cfg.segment[own].name, dep, cfg.segment[dep_pos].name
                    )));
                }
            }
        }
    }
    Ok(())
}
