//! Error types for the CDP client.

/// Errors returned by [`CdpApi`](super::CdpApi) implementations.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CdpError {
    /// The API answered with a non-success status.
    #[error("CDP API error (HTTP {status}): {message}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Error message from the response body.
        message: String,
    },

    /// Transport-level HTTP failure.
    #[error("CDP HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("failed to decode CDP response: {0}")]
    Decode(String),

    /// Polling gave up before the awaited state was reached.
    #[error("timed out waiting for {0}")]
    Timeout(String),

    /// The session was used after it was closed.
    #[error("CDP session is closed")]
    Closed,

    /// Any other failure.
    #[error("{0}")]
    Other(String),
}

impl CdpError {
    /// Create an API error.
    #[must_use]
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }
}

impl From<serde_json::Error> for CdpError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
