// ABOUTME: Error type shared by every control-plane call.
// ABOUTME: Distinguishes missing resources from remote and transport failures.

use super::http::HttpError;

/// Errors from control-plane operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The named resource does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The control plane rejected the call.
    #[error("{operation} failed: {code}: {message}")]
    Remote {
        operation: &'static str,
        code: String,
        message: String,
    },

    /// The request never produced a control-plane answer.
    #[error("{operation} transport error: {source}")]
    Transport {
        operation: &'static str,
        source: HttpError,
    },

    /// The response body did not match the expected shape.
    #[error("{operation} returned an unreadable response: {message}")]
    Decode {
        operation: &'static str,
        message: String,
    },
}

impl ApiError {
    pub fn remote(
        operation: &'static str,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ApiError::Remote {
            operation,
            code: code.into(),
            message: message.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::NotFound(_))
    }
}
