//! Staging directory error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum StagingError {
    #[error("failed to create staging directory {path}: {message}")]
    CreationFailed { path: String, message: String },

    /// Benign: another instance owns the staging directory. Callers map
    /// this to the "nothing done" exit path.
    #[error("staging directory {path} is locked by another instance")]
    LockHeld { path: String },

    #[error("failed to promote {name} into the package cache: {message}")]
    PromotionFailed { name: String, message: String },
}
