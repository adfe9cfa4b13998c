#![allow(dead_code)]

use std::collections::BTreeMap;

use reactor::config::{ConfigFile, ModuleConfig, RawConfigFile, ReactorSection, SegmentConfig};
use reactor::dag::DagGraph;
use reactor::errors::Result;
use reactor::types::{BuildUnit, FailureBehaviour};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                reactor: ReactorSection::default(),
                module: BTreeMap::new(),
                segment: Vec::new(),
            },
        }
    }

    pub fn with_module(mut self, name: &str, module: ModuleConfig) -> Self {
        self.config.module.insert(name.to_string(), module);
        self
    }

    pub fn with_segment(mut self, name: &str, modules: &[&str]) -> Self {
        self.config.segment.push(SegmentConfig {
            name: name.to_string(),
            modules: modules.iter().map(|m| m.to_string()).collect(),
        });
        self
    }

    pub fn with_threads(mut self, threads: &str) -> Self {
        self.config.reactor.threads = threads.to_string();
        self
    }

    pub fn with_fail(mut self, behaviour: FailureBehaviour) -> Self {
        self.config.reactor.fail = behaviour;
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        ConfigFile::try_from(self.config)
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ModuleConfig`.
pub struct ModuleConfigBuilder {
    module: ModuleConfig,
}

impl ModuleConfigBuilder {
    pub fn new(cmd: &str) -> Self {
        Self {
            module: ModuleConfig {
                cmd: cmd.to_string(),
                after: vec![],
                dir: None,
            },
        }
    }

    pub fn after(mut self, dep: &str) -> Self {
        self.module.after.push(dep.to_string());
        self
    }

    pub fn dir(mut self, dir: &str) -> Self {
        self.module.dir = Some(dir.to_string());
        self
    }

    pub fn build(self) -> ModuleConfig {
        self.module
    }
}

pub fn units(names: &[&str]) -> Vec<BuildUnit> {
    names.iter().map(|n| BuildUnit::from(*n)).collect()
}

/// Graph with the given standalone units and `(upstream, downstream)` edges.
pub fn graph(unit_names: &[&str], edges: &[(&str, &str)]) -> DagGraph {
    let mut builder = DagGraph::builder();
    for name in unit_names {
        builder = builder.unit(*name);
    }
    for (from, to) in edges {
        builder = builder.edge(*from, *to);
    }
    builder.build()
}

/// A → B, A → C, B → D, C → D.
pub fn diamond() -> DagGraph {
    graph(
        &["A", "B", "C", "D"],
        &[("A", "B"), ("A", "C"), ("B", "D"), ("C", "D")],
    )
}
