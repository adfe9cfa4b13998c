// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReactorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Cycle detected in module graph: {0}")]
    DagCycle(String),

    /// The graph or segment handed to the scheduler breaks its contract
    /// (unknown references, double completion, no schedulable root).
    #[error("Graph inconsistency: {0}")]
    GraphInconsistency(String),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Error returned by a module's build action.
#[derive(Error, Debug)]
pub enum BuildError {
    #[error("command exited with status {0}")]
    ExitStatus(i32),

    #[error("build action panicked: {0}")]
    Panicked(String),

    #[error("build action was dropped before reporting a result")]
    Abandoned,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Message(String),
}

impl BuildError {
    pub fn msg(message: impl Into<String>) -> Self {
        BuildError::Message(message.into())
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, ReactorError>;
