//! Error types for Playbeacon.
//!
//! This module defines the error types used throughout the crate. Nothing in
//! the telemetry core is allowed to abort or alter the automation run it
//! observes, so these errors stay inside the crate boundary: lifecycle misuse
//! and configuration problems are surfaced to callers as values, logged, and
//! degraded to "telemetry lost".

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for Playbeacon operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Playbeacon.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Config file could not be read.
    #[error("Failed to read config file '{path}': {message}")]
    ConfigRead {
        /// Path to the config file
        path: PathBuf,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Run Lifecycle Errors
    // ========================================================================
    /// An outcome or finalize signal arrived before the run-start signal.
    #[error("Run has not been started")]
    RunNotStarted,

    /// An outcome arrived after the run was finalized.
    #[error("Run already completed; late signal rejected")]
    RunCompleted,

    // ========================================================================
    // IO and Serialization Errors
    // ========================================================================
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parse error: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),
}

impl Error {
    /// Creates a new configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Returns true if this error is a run-lifecycle usage error.
    ///
    /// Lifecycle errors indicate a misbehaving host runtime (signals out of
    /// order), not a telemetry failure, and are logged at warn level.
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Error::RunNotStarted | Error::RunCompleted)
    }
}
