//! Core error types for deployctl-core

use thiserror::Error;

use crate::state::DeploymentPhase;

/// Errors surfaced by artifact resolution and deployment orchestration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    /// Caller is not authenticated; log in again before retrying
    #[error("unauthorized, please log in first")]
    Unauthorized,

    /// An unfinished deployment with the same name already targets the device
    #[error("conflict: {0}")]
    Conflict(String),

    /// Requested entity does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Polling ran out of attempts before the deployment finished
    #[error("deployment still unfinished after {attempts} attempts")]
    Timeout {
        /// Number of status queries issued
        attempts: u32,
    },

    /// Backend or transport failure
    #[error("backend error{}: {message}", status_suffix(.status))]
    Backend {
        /// HTTP status reported by the backend, absent for transport failures
        status: Option<u16>,
        /// Error message
        message: String,
    },

    /// Invalid deployment state transition attempted
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// Current phase
        from: DeploymentPhase,
        /// Attempted target phase
        to: DeploymentPhase,
    },

    /// Request rejected before reaching the backend
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

impl CoreError {
    /// Backend failure with a reported HTTP status
    pub fn status(status: u16, message: impl Into<String>) -> Self {
        CoreError::Backend {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Backend failure without an HTTP status (connection, decoding)
    pub fn transport(message: impl Into<String>) -> Self {
        CoreError::Backend {
            status: None,
            message: message.into(),
        }
    }

    /// Check if the error only means the wait ran out
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, CoreError::Timeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_error_display() {
        assert_eq!(
            CoreError::status(500, "boom").to_string(),
            "backend error (500): boom"
        );
        assert_eq!(
            CoreError::transport("connection refused").to_string(),
            "backend error: connection refused"
        );
    }

    #[test]
    fn test_timeout_display() {
        let err = CoreError::Timeout { attempts: 32 };
        assert!(err.is_timeout());
        assert_eq!(
            err.to_string(),
            "deployment still unfinished after 32 attempts"
        );
    }
}
