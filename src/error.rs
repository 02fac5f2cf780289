//! Error types for arbor-ci
//!
//! Every fallible operation in the crate returns [`CiConfigError`]. Most of
//! them come from loading or validating configuration, since nothing in this
//! crate talks to a scheduler or a build system directly.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for arbor-ci operations
#[derive(Error, Debug)]
pub enum CiConfigError {
    /// I/O error while reading or writing a file
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Settings file could not be parsed
    #[error("Settings parse error: {0}")]
    Parse(String),

    /// A `cluster:partition` string was malformed
    #[error("Invalid system name '{0}': expected 'cluster:partition'")]
    InvalidSystemName(String),

    /// Scheduler part of a `scheduler+launcher` string was not recognised
    #[error("Unknown scheduler: {0}")]
    UnknownScheduler(String),

    /// Launcher part of a `scheduler+launcher` string was not recognised
    #[error("Unknown launcher: {0}")]
    UnknownLauncher(String),

    /// Log level name was not recognised
    #[error("Unknown log level: {0}")]
    UnknownLogLevel(String),

    /// A composed build-flag list repeats a flag key
    #[error("Variant '{variant}' sets flag '{key}' more than once")]
    DuplicateFlag { variant: String, key: String },

    /// Success predicates need something to look for
    #[error("Success predicate literal must not be empty")]
    EmptyPredicate,

    /// No variant with the given name is registered
    #[error("Unknown variant: {0}")]
    UnknownVariant(String),

    /// The system or partition does not exist in the site catalog
    #[error("Unknown system: {0}")]
    UnknownSystem(String),

    /// The environment is not defined for the given cluster
    #[error("Unknown environment '{environ}' for system '{system}'")]
    UnknownEnvironment { system: String, environ: String },

    /// Variant cannot run on the requested target
    #[error("Variant '{variant}' does not apply to {system} with {environ}")]
    NotApplicable {
        variant: String,
        system: String,
        environ: String,
    },

    /// Logging configuration could not be installed
    #[error("Logging setup error: {0}")]
    Logging(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Multiple errors occurred
    #[error("Multiple errors occurred ({count} errors)")]
    MultipleErrors {
        count: usize,
        errors: Vec<CiConfigError>,
    },

    /// Generic error with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<CiConfigError>,
    },
}

impl CiConfigError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an unknown-environment error
    pub fn unknown_environment(system: impl Into<String>, environ: impl Into<String>) -> Self {
        Self::UnknownEnvironment {
            system: system.into(),
            environ: environ.into(),
        }
    }

    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        Self::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError(message.into())
    }

    /// Check if this error came from the settings file rather than the code
    pub fn is_user_config(&self) -> bool {
        match self {
            Self::Parse(_)
            | Self::InvalidSystemName(_)
            | Self::UnknownScheduler(_)
            | Self::UnknownLauncher(_)
            | Self::UnknownLogLevel(_)
            | Self::ConfigError(_) => true,
            Self::WithContext { source, .. } => source.is_user_config(),
            _ => false,
        }
    }

    /// Get the path associated with this error, if any
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            Self::Io { path, .. } => Some(path),
            Self::WithContext { source, .. } => source.path(),
            _ => None,
        }
    }
}

/// Result type alias for arbor-ci operations
pub type Result<T> = std::result::Result<T, CiConfigError>;

impl From<std::io::Error> for CiConfigError {
    fn from(err: std::io::Error) -> Self {
        CiConfigError::Io {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for CiConfigError {
    fn from(err: serde_json::Error) -> Self {
        CiConfigError::Parse(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| CiConfigError::io(path, e))
    }
}

/// Collects multiple results into a single result
pub fn collect_errors<T>(results: Vec<Result<T>>) -> Result<Vec<T>> {
    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(value) => successes.push(value),
            Err(e) => errors.push(e),
        }
    }

    match errors.len() {
        0 => Ok(successes),
        1 => Err(errors.remove(0)),
        count => Err(CiConfigError::MultipleErrors { count, errors }),
    }
}
