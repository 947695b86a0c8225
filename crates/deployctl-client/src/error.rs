//! Error types for the deployctl client

use deployctl_core::CoreError;
use thiserror::Error;

/// Errors that can occur when talking to the management API
#[derive(Error, Debug)]
pub enum ClientError {
    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid URL
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Missing or rejected bearer token
    #[error("Unauthorized. Please login first")]
    Unauthorized,

    /// Unfinished deployment with the same name already targets the device
    #[error("{0}")]
    Conflict(String),

    /// Lookup returned no result
    #[error("{0}")]
    NotFound(String),

    /// API returned an error status
    #[error("API error ({status}): {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Error message from server
        message: String,
    },

    /// Invalid response format
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Result type for client operations
pub type Result<T> = std::result::Result<T, ClientError>;

impl From<ClientError> for CoreError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Unauthorized => CoreError::Unauthorized,
            ClientError::Conflict(message) => CoreError::Conflict(message),
            ClientError::NotFound(message) => CoreError::NotFound(message),
            ClientError::Api { status, message } => CoreError::status(status, message),
            ClientError::Http(e) => CoreError::Backend {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            other => CoreError::transport(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_survive_conversion() {
        assert_eq!(
            CoreError::from(ClientError::Unauthorized),
            CoreError::Unauthorized
        );
        assert_eq!(
            CoreError::from(ClientError::Conflict("dup".into())),
            CoreError::Conflict("dup".into())
        );
        assert_eq!(
            CoreError::from(ClientError::NotFound("no device found".into())),
            CoreError::NotFound("no device found".into())
        );
        assert_eq!(
            CoreError::from(ClientError::Api {
                status: 500,
                message: "oops".into()
            }),
            CoreError::status(500, "oops")
        );
        assert_eq!(
            CoreError::from(ClientError::InvalidResponse("no Location".into())),
            CoreError::transport("Invalid response: no Location")
        );
    }
}
