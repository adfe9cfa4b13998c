// src/config/mod.rs

//! Reactor file loading and validation.
//!
//! Responsibilities:
//! - Define the TOML-backed data model (`model.rs`).
//! - Load a reactor file from disk (`loader.rs`).
//! - Validate basic invariants like graph acyclicity (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{ConfigFile, ModuleConfig, RawConfigFile, ReactorSection, SegmentConfig};
pub use validate::DEFAULT_SEGMENT;
