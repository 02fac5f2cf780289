//! Configuration module for arbor-ci
//!
//! Provides the harness settings value, its built-in defaults, and the CLI
//! arguments of the inspection tool.

mod settings;

pub use settings::*;
