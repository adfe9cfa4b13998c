// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{ArgGroup, Parser, ValueEnum};

use crate::types::{FailureBehaviour, OutputMode, Threads};

/// Command-line arguments for `reactor`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "reactor",
    version,
    about = "Build a set of interdependent modules concurrently, in dependency order.",
    long_about = None
)]
#[command(group(
    ArgGroup::new("failure")
        .args(["fail_fast", "fail_at_end", "fail_never"])
        .multiple(false)
))]
pub struct CliArgs {
    /// Path to the reactor file (TOML).
    #[arg(long, value_name = "PATH", default_value = "Reactor.toml")]
    pub config: String,

    /// Worker count: an integer, or a core multiplier such as `1.5C`.
    ///
    /// Overrides `[reactor].threads`.
    #[arg(short = 'T', long, value_name = "N", value_parser = parse_threads)]
    pub threads: Option<Threads>,

    /// Stop at the first module failure.
    #[arg(long)]
    pub fail_fast: bool,

    /// Keep building modules unaffected by failures; report at the end.
    #[arg(long)]
    pub fail_at_end: bool,

    /// Never fail the run because of module failures.
    #[arg(long)]
    pub fail_never: bool,

    /// How module output is written to the console.
    #[arg(long, value_enum, value_name = "MODE")]
    pub output: Option<OutputMode>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `REACTOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print modules and segments, but don't build anything.
    #[arg(long)]
    pub dry_run: bool,
}

impl CliArgs {
    /// Failure behaviour selected on the command line, if any.
    pub fn failure_behaviour(&self) -> Option<FailureBehaviour> {
        if self.fail_fast {
            Some(FailureBehaviour::FailFast)
        } else if self.fail_at_end {
            Some(FailureBehaviour::FailAtEnd)
        } else if self.fail_never {
            Some(FailureBehaviour::FailNever)
        } else {
            None
        }
    }
}

fn parse_threads(s: &str) -> Result<Threads, String> {
    s.parse()
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
