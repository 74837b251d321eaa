#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("invalid endpoint {url:?}: {reason}")]
    InvalidEndpoint { url: String, reason: String },

    #[error("channel is not connected")]
    NotConnected,

    #[error("connection closed")]
    Closed,

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to encode event: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("timed out waiting for the channel")]
    Timeout,
}

impl LinkError {
    pub fn invalid_endpoint(url: &str, reason: impl Into<String>) -> Self {
        Self::InvalidEndpoint {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}
