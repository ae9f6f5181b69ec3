//! Error handling for chaind.
use thiserror::Error;

use crate::module::ModuleError;

/// Errors reading or parsing the configuration document.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Error reading or accessing the configuration file.
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    /// Error parsing YAML configuration.
    #[error("Invalid YAML format: {0}")]
    Parse(#[from] serde_yaml::Error),
}

/// Errors building a process template from the configuration.
///
/// Load failures are per-process atomic: the failing process is skipped and
/// the remaining processes still load.
#[derive(Debug, Error)]
pub enum LoadError {
    /// A statement names a module type the registry does not know.
    #[error("statement {index}: unknown module type '{module}'")]
    UnknownModule {
        /// Position of the statement within its process.
        index: usize,
        /// The unresolved module type name.
        module: String,
    },

    /// Two statements in one process share a local name.
    #[error("statement {index}: duplicate statement name '{name}'")]
    DuplicateName {
        /// Position of the statement within its process.
        index: usize,
        /// The clashing local name.
        name: String,
    },

    /// A variable reference has no target statement name.
    #[error("statement {index}: invalid variable reference '{var}'")]
    BadVariableReference {
        /// Position of the statement within its process.
        index: usize,
        /// The reference as written.
        var: String,
    },
}

/// Fatal startup errors for the daemon binary.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Configuration file could not be read or parsed.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Every declared process failed to load (or none were declared).
    #[error("no process could be loaded from the configuration")]
    NoProcesses,

    /// A module's one-shot global init hook failed.
    #[error("module '{module}' global init failed: {source}")]
    GlobalInit {
        /// The module type name.
        module: String,
        /// The failure reported by the module.
        #[source]
        source: ModuleError,
    },

    /// Signal handler installation failed.
    #[error("failed to install signal handler: {0}")]
    Signal(#[from] ctrlc::Error),

    /// Logging initialization failed.
    #[error("failed to initialize logging: {0}")]
    Logging(#[from] crate::logging::LoggingError),
}
