//! Interactive relay error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum RelayError {
    #[error("failed to spawn {command}: {message}")]
    SpawnFailed { command: String, message: String },

    /// Internal signal that no pseudo-terminal device could be allocated.
    /// The relay recovers by falling back to inherited standard streams.
    #[error("pseudo-terminal unavailable: {0}")]
    PtyUnavailable(String),
}
