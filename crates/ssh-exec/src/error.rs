use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("remote operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("remote command failed on {host}: {stderr}")]
    RemoteCommandFailed { host: String, stderr: String },

    #[error("local invocation failed: {0}")]
    TransientInvocation(String),

    #[error("authentication exhausted for {0}: no key or agent identity accepted")]
    AuthenticationExhausted(String),

    #[error("invalid target: {0}")]
    InvalidTarget(String),
}

/// Wire-level error category carried on [`crate::ExecutionResult`]. Per-host
/// failures travel as data, never as exceptions that abort sibling work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Timeout,
    RemoteCommandFailed,
    TransientInvocationFailure,
    AuthenticationExhausted,
    InvalidTarget,
}

impl ExecError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ExecError::Timeout(_) => ErrorKind::Timeout,
            ExecError::RemoteCommandFailed { .. } => ErrorKind::RemoteCommandFailed,
            ExecError::TransientInvocation(_) => ErrorKind::TransientInvocationFailure,
            ExecError::AuthenticationExhausted(_) => ErrorKind::AuthenticationExhausted,
            ExecError::InvalidTarget(_) => ErrorKind::InvalidTarget,
        }
    }
}
