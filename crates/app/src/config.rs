use std::env;
use std::str::FromStr;
use std::time::Duration;

use eventsync_core::auth::{Role, Session};
use eventsync_core::model::EntityId;
use eventsync_stream::StreamConfig;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{name} has invalid value {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Host the local status API binds to.
    pub host: String,
    /// Port the local status API binds to.
    pub port: u16,
    /// Base URL of the REST API, e.g. `http://localhost:8080/api`.
    pub api_base_url: String,
    /// Push endpoint.
    pub ws_url: String,
    /// Bearer token from the identity provider, if signed in.
    pub auth_token: Option<String>,
    pub user_id: String,
    pub user_email: String,
    pub user_role: Role,
    pub max_reconnect_attempts: u32,
    pub reconnect_interval_ms: u64,
    pub should_reconnect: bool,
    /// How long push-driven changes stay highlighted.
    pub highlight_ms: u64,
    /// Notice bus channel capacity.
    pub notice_bus_capacity: usize,
    /// Log level (e.g., "info", "debug", "trace").
    pub log_level: String,
}

impl AppConfig {
    /// Load configuration from environment variables with sensible defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let text =
            |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());
        Ok(Self {
            host: text("HOST", "127.0.0.1"),
            port: parsed(&lookup, "PORT", 3040)?,
            api_base_url: text("API_BASE_URL", "http://localhost:8080/api"),
            ws_url: text("WS_URL", "ws://localhost:8080/ws/events"),
            auth_token: lookup("AUTH_TOKEN").filter(|token| !token.trim().is_empty()),
            user_id: text("USER_ID", "anonymous"),
            user_email: text("USER_EMAIL", ""),
            user_role: Role::parse(&text("USER_ROLE", "user")),
            max_reconnect_attempts: parsed(&lookup, "MAX_RECONNECT_ATTEMPTS", 5)?,
            reconnect_interval_ms: parsed(&lookup, "RECONNECT_INTERVAL_MS", 3000)?,
            should_reconnect: parsed(&lookup, "SHOULD_RECONNECT", true)?,
            highlight_ms: parsed(&lookup, "HIGHLIGHT_MS", 600)?,
            notice_bus_capacity: positive(&lookup, "NOTICE_BUS_CAPACITY", 256)?,
            log_level: text("LOG_LEVEL", "info"),
        })
    }

    /// Build the socket address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn stream_config(&self) -> StreamConfig {
        StreamConfig::default()
            .with_max_reconnect_attempts(self.max_reconnect_attempts)
            .with_base_reconnect_interval(Duration::from_millis(self.reconnect_interval_ms))
            .with_should_reconnect(self.should_reconnect)
    }

    pub fn highlight(&self) -> Duration {
        Duration::from_millis(self.highlight_ms)
    }

    pub fn session(&self) -> Session {
        Session {
            id: EntityId::new(self.user_id.clone()),
            email: self.user_email.clone(),
            role: self.user_role,
        }
    }
}

fn parsed<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}

/// Like [`parsed`], but zero is rejected.
fn positive(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &'static str,
    default: usize,
) -> Result<usize, ConfigError> {
    match parsed(lookup, name, default)? {
        0 => Err(ConfigError::Invalid {
            name,
            value: "0".to_string(),
        }),
        n => Ok(n),
    }
}
