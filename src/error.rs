//! This module defines all error types used throughout the application.
//!
//! Only data-dependent failures live here. Broken structural invariants of
//! the partition graph or the synthesized automata are programming errors and
//! abort with an assertion instead.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the application
#[derive(Error, Debug)]
pub enum Error {
    /// IO errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Inconsistent or unusable trace input
    #[error("Trace error: {0}")]
    Trace(String),

    /// Trace file parsing errors
    #[error("Trace format error in {file:?}: {message}")]
    TraceFormat { file: PathBuf, message: String },

    /// Invariant input errors
    #[error("Invariant error: {0}")]
    Invariant(String),

    /// Model checker invocation failures
    #[error("Model checker error: {0}")]
    Checker(String),

    /// The checker rejected the model it was given
    #[error("Model checker syntax error: {0}")]
    CheckerSyntax(String),

    /// The checker's reply could not be understood
    #[error("Unrecognized model checker output: {0}")]
    CheckerOutput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Missing configuration
    #[error("Missing configuration: {0}")]
    MissingConfig(String),

    /// Generic error with custom message
    #[error("{0}")]
    Custom(String),

    /// Wrapped anyhow errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using our Error type
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create a custom error with a message
    pub fn custom(msg: impl Into<String>) -> Self {
        Self::Custom(msg.into())
    }

    /// Create a trace error
    pub fn trace(msg: impl Into<String>) -> Self {
        Self::Trace(msg.into())
    }

    /// Create a model checker error
    pub fn checker(msg: impl Into<String>) -> Self {
        Self::Checker(msg.into())
    }

    /// Whether the checker refused its input. Such failures are not retried.
    pub fn is_checker_syntax(&self) -> bool {
        matches!(self, Error::CheckerSyntax(_))
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Custom(format!("JSON error: {}", err))
    }
}

// Helper macros for creating errors

/// Create a custom error with formatting
#[macro_export]
macro_rules! custom_error {
    ($($arg:tt)*) => {
        $crate::error::Error::Custom(format!($($arg)*))
    };
}

/// Bail with a custom error message
#[macro_export]
macro_rules! bail {
    ($($arg:tt)*) => {
        return Err($crate::custom_error!($($arg)*))
    };
}

/// Ensure a condition is true or return error
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($($arg)*);
        }
    };
}
