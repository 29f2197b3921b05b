use serde::Serialize;

/// Normal closure, sent on explicit disconnect.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Reserved code for a connection that dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Lifecycle of a stream handle. Owned by the handle; observers only read it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
    Failed,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Error => "error",
            ConnectionState::Failed => "failed",
        }
    }

    /// A socket is being opened or is open.
    pub fn is_active(&self) -> bool {
        matches!(self, ConnectionState::Connecting | ConnectionState::Connected)
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseInfo {
    pub code: u16,
    pub reason: String,
    /// The closing handshake completed. Only unclean closes are retried.
    pub clean: bool,
}

impl CloseInfo {
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            clean: true,
        }
    }

    pub fn abnormal() -> Self {
        Self {
            code: ABNORMAL_CLOSURE,
            reason: String::new(),
            clean: false,
        }
    }
}
