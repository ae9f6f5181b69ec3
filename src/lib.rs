//! Declarative configuration daemon for chained module processes.

#![warn(unused_crate_dependencies)]
// Test dependencies are only used in test code
#[cfg(test)]
use assert_cmd as _;
#[cfg(test)]
use predicates as _;

/// CLI parsing.
pub mod cli;

/// Config loading.
pub mod config;

/// Constants.
pub mod constants;

/// Daemon controller.
pub mod daemon;

/// Process state engine.
pub mod engine;

/// Errors.
pub mod error;

/// Logging sinks and filters.
pub mod logging;

/// Module traits and registry.
pub mod module;

/// Built-in modules.
pub mod modules;

/// Child process management.
pub mod procmgr;

/// Loaded process and statement templates.
pub mod program;

/// Event reactor and timers.
pub mod reactor;

/// Test utils.
#[doc(hidden)]
pub mod test_utils;

/// Value model.
pub mod value;
