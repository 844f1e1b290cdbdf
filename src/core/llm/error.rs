use thiserror::Error;

/// Failure talking to the model backend.
///
/// Every variant carries a message meant for humans; it is forwarded as-is
/// into `error` events and JSON error bodies.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The backend could not be reached at all (connection refused, DNS, ...).
    #[error("{0}")]
    Unreachable(String),

    /// The request exceeded the configured timeout.
    #[error("{0}")]
    Timeout(String),

    /// The backend answered with a non-success HTTP status.
    #[error("{0}")]
    Status(String),

    /// The backend answered, but the payload could not be decoded.
    #[error("{0}")]
    Malformed(String),

    /// The backend reported an error or dropped the connection mid-stream.
    #[error("{0}")]
    Stream(String),
}

impl BackendError {
    pub fn from_reqwest(err: reqwest::Error, base_url: &str) -> Self {
        if err.is_timeout() {
            BackendError::Timeout(format!("Request to model backend at {} timed out", base_url))
        } else if err.is_connect() {
            BackendError::Unreachable(format!(
                "Model backend not reachable at {}. Start it with 'ollama serve'.",
                base_url
            ))
        } else if err.is_decode() {
            BackendError::Malformed(format!("Failed to decode backend response: {}", err))
        } else {
            BackendError::Stream(format!("Network error: {}", err))
        }
    }
}
