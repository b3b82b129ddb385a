//! Error types for the Spotify provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Spotify provider errors
#[derive(Error, Debug)]
pub enum SpotifyError {
    /// Token rejected by the API (401)
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// API request returned an error
    #[error("Spotify API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limit exceeded, retry after {retry_after_seconds} seconds")]
    RateLimitExceeded { retry_after_seconds: u64 },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

/// Result type for Spotify operations
pub type Result<T> = std::result::Result<T, SpotifyError>;

impl SpotifyError {
    /// Classify a non-success response.
    pub fn from_status(status_code: u16, retry_after: Option<&str>, body: &[u8]) -> Self {
        let message = String::from_utf8_lossy(body).to_string();
        match status_code {
            401 => SpotifyError::AuthenticationFailed(message),
            429 => SpotifyError::RateLimitExceeded {
                retry_after_seconds: retry_after
                    .and_then(|value| value.trim().parse().ok())
                    .unwrap_or(0),
            },
            _ => SpotifyError::ApiError {
                status_code,
                message,
            },
        }
    }
}

impl From<SpotifyError> for BridgeError {
    fn from(error: SpotifyError) -> Self {
        match error {
            SpotifyError::AuthenticationFailed(message) => BridgeError::RemoteStatus {
                status: 401,
                message: format!("Authentication failed: {}", message),
            },
            SpotifyError::ApiError {
                status_code,
                message,
            } => BridgeError::RemoteStatus {
                status: status_code,
                message,
            },
            SpotifyError::RateLimitExceeded {
                retry_after_seconds,
            } => BridgeError::RemoteStatus {
                status: 429,
                message: format!(
                    "Rate limit exceeded, retry after {} seconds",
                    retry_after_seconds
                ),
            },
            SpotifyError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            SpotifyError::NetworkError(msg) => {
                BridgeError::OperationFailed(format!("Network error: {}", msg))
            }
            SpotifyError::BridgeError(e) => e,
        }
    }
}
