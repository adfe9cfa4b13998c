// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::types::{FailureBehaviour, OutputMode, Threads};

/// Reactor file as read from TOML, before validation.
///
/// ```toml
/// [reactor]
/// threads = "4"
/// fail = "fail-at-end"
///
/// [module.core]
/// cmd = "make -C core"
///
/// [module.app]
/// cmd = "make -C app"
/// after = ["core"]
///
/// [[segment]]
/// name = "build"
/// modules = ["core", "app"]
/// ```
///
/// All sections except `module` are optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub reactor: ReactorSection,

    /// All modules from `[module.<name>]`, keyed by module name.
    #[serde(default)]
    pub module: BTreeMap<String, ModuleConfig>,

    /// Ordered task segments from `[[segment]]`.
    #[serde(default)]
    pub segment: Vec<SegmentConfig>,
}

/// Validated reactor file.
///
/// Only obtainable through `ConfigFile::try_from(RawConfigFile)` (see
/// `config::validate`), so holders may assume:
/// - every `after` reference names a known module,
/// - the module graph is acyclic,
/// - the segments (explicit or the default one) partition the modules,
/// - no module depends on a module from a later segment.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub reactor: ReactorSection,
    pub module: BTreeMap<String, ModuleConfig>,
    pub segment: Vec<SegmentConfig>,
    threads: Threads,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(
        reactor: ReactorSection,
        threads: Threads,
        module: BTreeMap<String, ModuleConfig>,
        segment: Vec<SegmentConfig>,
    ) -> Self {
        Self {
            reactor,
            module,
            segment,
            threads,
        }
    }

    /// `[reactor].threads`, parsed during validation.
    pub fn threads(&self) -> Threads {
        self.threads
    }
}

/// `[reactor]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ReactorSection {
    /// Worker count, `"4"` or `"1C"`. Kept as a string here and parsed during
    /// validation so the error can name the offending value.
    #[serde(default = "default_threads")]
    pub threads: String,

    #[serde(default)]
    pub fail: FailureBehaviour,

    #[serde(default)]
    pub output: OutputMode,

    /// Refuse to schedule a segment that has no module without in-segment
    /// dependencies, instead of picking its first module.
    #[serde(default)]
    pub strict_roots: bool,
}

fn default_threads() -> String {
    "1".to_string()
}

impl Default for ReactorSection {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            fail: FailureBehaviour::default(),
            output: OutputMode::default(),
            strict_roots: false,
        }
    }
}

/// `[module.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
    /// Shell command that builds the module.
    pub cmd: String,

    /// Modules that must be built before this one.
    #[serde(default)]
    pub after: Vec<String>,

    /// Working directory for `cmd`, relative to the reactor file.
    #[serde(default)]
    pub dir: Option<String>,
}

/// `[[segment]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct SegmentConfig {
    pub name: String,
    pub modules: Vec<String>,
}
