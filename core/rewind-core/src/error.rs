//! Error types for rewind-core operations.

use std::path::PathBuf;

/// All errors that can surface from rewind-core.
#[derive(Debug, thiserror::Error)]
pub enum RewindError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Configuration read failed: {path}: {source}")]
    ConfigReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration write failed: {path}: {source}")]
    ConfigWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Configuration serialization failed: {0}")]
    ConfigSerialize(String),

    // ─────────────────────────────────────────────────────────────────────
    // Collaborator Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Gateway command not configured: {0}")]
    GatewayNotConfigured(&'static str),

    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },
}

/// Convenience type alias for Results using RewindError.
pub type Result<T> = std::result::Result<T, RewindError>;

impl From<RewindError> for String {
    fn from(err: RewindError) -> String {
        err.to_string()
    }
}
