//! Error types for the xten core library.
//!
//! Validation errors (bad ranges, infeasible targets, invalid quality) are
//! always raised before any child process is spawned, so they never leave
//! partial side effects behind.

use std::process::ExitStatus;
use thiserror::Error;

/// Custom error types for xten-core operations.
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Input file not found: {0}")]
    NotFound(String),

    #[error("Required external tool not found: {0}")]
    DependencyNotFound(String),

    #[error("Failed to start command '{0}': {1}")]
    CommandStart(String, std::io::Error),

    #[error("Command '{0}' failed (status {1}): {2}")]
    CommandFailed(String, ExitStatus, String),

    #[error("Failed to wait for command '{0}': {1}")]
    CommandWait(String, std::io::Error),

    #[error("Failed to parse ffprobe output: {0}")]
    FfprobeParse(String),

    #[error("Failed to parse JSON output: {0}")]
    JsonParseError(String),

    #[error("Infeasible compression target: {0}")]
    InfeasibleTarget(String),

    #[error("Invalid quality value: {0}")]
    InvalidQuality(String),

    #[error("Invalid trim range: {0}")]
    InvalidRange(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Output file already exists: {0} (pass --force to overwrite)")]
    OutputExists(String),

    #[error("Operation failed: {0}")]
    OperationFailed(String),
}

/// Result type for xten-core operations.
pub type CoreResult<T> = std::result::Result<T, CoreError>;

/// Creates a `CommandFailed` error from command context.
pub fn command_failed_error(
    cmd: impl Into<String>,
    status: ExitStatus,
    stderr: impl Into<String>,
) -> CoreError {
    CoreError::CommandFailed(cmd.into(), status, stderr.into())
}

/// Creates a `CommandStart` error from command context.
pub fn command_start_error(cmd: impl Into<String>, err: std::io::Error) -> CoreError {
    CoreError::CommandStart(cmd.into(), err)
}

/// Creates a `CommandWait` error from command context.
pub fn command_wait_error(cmd: impl Into<String>, err: std::io::Error) -> CoreError {
    CoreError::CommandWait(cmd.into(), err)
}

impl CoreError {
    /// True when the error was raised by input validation before any
    /// process spawned, i.e. the caller can fix the input and retry.
    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            CoreError::InfeasibleTarget(_)
                | CoreError::InvalidQuality(_)
                | CoreError::InvalidRange(_)
                | CoreError::InvalidConfig(_)
                | CoreError::OutputExists(_)
        )
    }
}
