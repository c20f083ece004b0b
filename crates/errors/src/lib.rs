#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Error types for the rapt front end
//!
//! This crate provides fine-grained error types organized by domain. Every
//! error raised during the download/verify phase is fatal to the whole run;
//! the only locally recovered condition is staging lock contention, which
//! callers map to a successful no-op exit.

use thiserror::Error;

pub mod config;
pub mod hash;
pub mod network;
pub mod ops;
pub mod plan;
pub mod relay;
pub mod staging;

// Re-export all error types at the root
pub use config::ConfigError;
pub use hash::HashError;
pub use network::NetworkError;
pub use ops::OpsError;
pub use plan::PlanError;
pub use relay::RelayError;
pub use staging::StagingError;

/// Generic error type for cross-crate boundaries
#[derive(Debug, Error)]
pub enum Error {
    #[error("plan error: {0}")]
    Plan(#[from] PlanError),

    #[error("network error: {0}")]
    Network(#[from] NetworkError),

    #[error("checksum error: {0}")]
    Hash(#[from] HashError),

    #[error("staging error: {0}")]
    Staging(#[from] StagingError),

    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("ops error: {0}")]
    Ops(#[from] OpsError),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("I/O error: {message}")]
    Io {
        kind: std::io::ErrorKind,
        message: String,
        path: Option<std::path::PathBuf>,
    },
}

impl Error {
    /// Create an internal error with a message
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Create an Io error with an associated path
    pub fn io_with_path(err: &std::io::Error, path: impl Into<std::path::PathBuf>) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: Some(path.into()),
        }
    }

    /// True for conditions that end the run without doing anything wrong,
    /// such as another instance already holding the staging lock.
    #[must_use]
    pub fn is_benign(&self) -> bool {
        matches!(self, Error::Staging(StagingError::LockHeld { .. }))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            kind: err.kind(),
            message: err.to_string(),
            path: None,
        }
    }
}

/// Result type alias for rapt operations
pub type Result<T> = std::result::Result<T, Error>;
