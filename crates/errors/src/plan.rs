//! Transaction-plan parsing error types

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum PlanError {
    #[error("failed to launch {command}: {message}")]
    LaunchFailure { command: String, message: String },

    #[error("{command} exited with {status} before producing complete output: {stderr}")]
    IncompleteOutput {
        command: String,
        status: i32,
        stderr: String,
    },
}
