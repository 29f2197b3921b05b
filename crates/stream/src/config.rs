use std::time::Duration;

/// Reconnect policy and close behaviour for a stream handle.
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// Unclean closes tolerated before the handle gives up.
    pub max_reconnect_attempts: u32,
    /// Delay unit; attempt `n` waits `n * base_reconnect_interval`.
    pub base_reconnect_interval: Duration,
    /// Master switch for automatic reconnects.
    pub should_reconnect: bool,
    /// Reason sent with the normal-closure frame on disconnect.
    pub close_reason: String,
}

impl StreamConfig {
    pub fn with_max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = attempts;
        self
    }

    pub fn with_base_reconnect_interval(mut self, interval: Duration) -> Self {
        self.base_reconnect_interval = interval;
        self
    }

    pub fn with_should_reconnect(mut self, should_reconnect: bool) -> Self {
        self.should_reconnect = should_reconnect;
        self
    }

    /// Delay before reconnect attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.base_reconnect_interval.saturating_mul(attempt)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: 3,
            base_reconnect_interval: Duration::from_millis(5000),
            should_reconnect: true,
            close_reason: "Disconnected by client".to_string(),
        }
    }
}
