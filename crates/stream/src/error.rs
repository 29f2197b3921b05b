use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error("invalid stream url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode frame: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("failed to send frame: {0}")]
    Send(String),
}

impl StreamError {
    /// Socket-level failures move the connection into the `error` state;
    /// decode and send failures only get reported.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            StreamError::InvalidUrl { .. } | StreamError::Connect(_) | StreamError::Transport(_)
        )
    }
}
