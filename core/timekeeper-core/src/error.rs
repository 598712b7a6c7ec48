//! Error types for timekeeper-core operations.

use std::path::PathBuf;

/// Errors surfaced by the core outside of event dispatch.
///
/// Dispatch itself never fails: ignored events are no-ops and collaborator
/// failures are recorded as [`EffectFailure`]s.
#[derive(Debug, thiserror::Error)]
pub enum TimekeeperError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Configuration file malformed: {path}: {details}")]
    ConfigMalformed { path: PathBuf, details: String },

    #[error("Configuration value invalid: {field}: {reason}")]
    ConfigInvalid { field: String, reason: String },

    #[error("Timekeeper directory not found")]
    HomeNotFound,

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

/// Convenience type alias for Results using TimekeeperError.
pub type Result<T> = std::result::Result<T, TimekeeperError>;

/// Failure reported by an overlay publisher or results finalizer.
#[derive(Debug, thiserror::Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A collaborator call that failed while an effect was executing. The state
/// transition that issued it has already completed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EffectFailure {
    pub effect: &'static str,
    pub message: String,
}

// Conversion for string error compatibility
impl From<TimekeeperError> for String {
    fn from(err: TimekeeperError) -> String {
        err.to_string()
    }
}
