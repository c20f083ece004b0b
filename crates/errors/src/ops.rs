//! Operation orchestration error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum OpsError {
    #[error("could not determine the APT archives directory: {message}")]
    CacheDirUnavailable { message: String },

    #[error("missing required component: {name}")]
    MissingComponent { name: String },

    #[error("operation failed: {message}")]
    OperationFailed { message: String },
}
