//! Checksum error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum HashError {
    #[error("unknown checksum algorithm: {token}")]
    UnknownAlgorithm { token: String },

    #[error("invalid checksum value: {value}")]
    InvalidHex { value: String },

    #[error("checksum mismatch for {name}: expected {expected}, got {actual}")]
    Mismatch {
        name: String,
        expected: String,
        actual: String,
    },
}
