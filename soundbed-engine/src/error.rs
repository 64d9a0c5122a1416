//! Engine error taxonomy.
//!
//! Both variants are recoverable and surface synchronously from the call that
//! caused them. Resource leaks are not errors here; composition teardown makes
//! them impossible rather than detecting them.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The requested soundscape identifier is not one of the known presets.
    /// Rejected before any output resource is touched.
    #[error("unknown soundscape preset: {0:?}")]
    InvalidPreset(String),

    /// The audio output could not be acquired or started (no device, platform
    /// restriction, stream failure). Retry once the precondition is met.
    #[error("audio output unavailable: {0}")]
    EngineUnavailable(String),
}

impl EngineError {
    pub fn unavailable(reason: impl std::fmt::Display) -> Self {
        EngineError::EngineUnavailable(reason.to_string())
    }
}
