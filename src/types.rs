// src/types.rs

//! Small value types shared by the config layer, the DAG and the engine.

use std::fmt;
use std::str::FromStr;

use serde::Deserialize;

/// Identity of one schedulable module.
///
/// The scheduler never looks inside a unit; it only compares, hashes and
/// orders them. Cloning is cheap enough for the sizes reactors deal with.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(transparent)]
pub struct BuildUnit(String);

impl BuildUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BuildUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for BuildUnit {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

impl From<String> for BuildUnit {
    fn from(name: String) -> Self {
        Self(name)
    }
}

/// What the reactor does when a module's build action fails.
///
/// - `FailFast`: halt the run. Nothing new is submitted; in-flight modules
///   are drained.
/// - `FailAtEnd`: keep building every module that does not depend on the
///   failure. Dependents of the failed module (in any later segment too) are
///   never attempted.
/// - `FailNever`: scheduled exactly like `FailAtEnd`, but build failures do
///   not make the run unsuccessful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailureBehaviour {
    FailFast,
    FailAtEnd,
    FailNever,
}

impl Default for FailureBehaviour {
    fn default() -> Self {
        FailureBehaviour::FailAtEnd
    }
}

impl FromStr for FailureBehaviour {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "fail-fast" => Ok(FailureBehaviour::FailFast),
            "fail-at-end" => Ok(FailureBehaviour::FailAtEnd),
            "fail-never" => Ok(FailureBehaviour::FailNever),
            other => Err(format!(
                "invalid failure behaviour: {other} (expected \"fail-fast\", \"fail-at-end\" or \"fail-never\")"
            )),
        }
    }
}

/// How module output reaches the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputMode {
    /// Write each line as soon as it arrives, prefixed with the module name.
    Prefixed,
    /// Hold a module's lines until it finishes, then write them in one block.
    Buffered,
}

impl Default for OutputMode {
    fn default() -> Self {
        OutputMode::Prefixed
    }
}

/// Requested degree of concurrency.
///
/// Accepts either a plain positive integer (`"4"`) or a multiple of the
/// available cores (`"1.5C"`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Threads {
    Fixed(usize),
    PerCore(f32),
}

impl Threads {
    /// Resolve to a worker count using the machine's available parallelism.
    pub fn resolve(&self) -> usize {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.resolve_with_cores(cores)
    }

    pub fn resolve_with_cores(&self, cores: usize) -> usize {
        match *self {
            Threads::Fixed(n) => n.max(1),
            Threads::PerCore(multiplier) => ((multiplier * cores as f32) as usize).max(1),
        }
    }
}

impl FromStr for Threads {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(multiplier) = s.strip_suffix(['C', 'c']) {
            let value: f32 = multiplier.parse().map_err(|_| {
                format!("invalid threads value: '{s}' (supported are integers and floats ending with C)")
            })?;
            if !(value > 0.0) {
                return Err(format!(
                    "invalid threads core multiplier: '{s}' (value must be positive)"
                ));
            }
            return Ok(Threads::PerCore(value));
        }

        let value: usize = s.parse().map_err(|_| {
            format!("invalid threads value: '{s}' (supported are integers and floats ending with C)")
        })?;
        if value == 0 {
            return Err(format!("invalid threads value: '{s}' (value must be positive)"));
        }
        Ok(Threads::Fixed(value))
    }
}

impl fmt::Display for Threads {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threads::Fixed(n) => write!(f, "{n}"),
            Threads::PerCore(m) => write!(f, "{m}C"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn threads_parse_plain_and_core_multiplier() {
        assert_eq!("4".parse::<Threads>(), Ok(Threads::Fixed(4)));
        assert_eq!("1.5C".parse::<Threads>(), Ok(Threads::PerCore(1.5)));
        assert_eq!(Threads::PerCore(1.5).resolve_with_cores(4), 6);
        // A tiny multiplier still yields one worker.
        assert_eq!(Threads::PerCore(0.1).resolve_with_cores(2), 1);
    }

    #[test]
    fn threads_reject_zero_negative_and_garbage() {
        assert!("0".parse::<Threads>().is_err());
        assert!("-1C".parse::<Threads>().is_err());
        assert!("0C".parse::<Threads>().is_err());
        assert!("many".parse::<Threads>().is_err());
    }

    #[test]
    fn failure_behaviour_accepts_both_separators() {
        assert_eq!(
            "FAIL_FAST".parse::<FailureBehaviour>(),
            Ok(FailureBehaviour::FailFast)
        );
        assert_eq!(
            "fail-at-end".parse::<FailureBehaviour>(),
            Ok(FailureBehaviour::FailAtEnd)
        );
        assert!("sometimes".parse::<FailureBehaviour>().is_err());
    }
}
