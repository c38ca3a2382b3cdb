//! Process-wide producer settings.
//!
//! Loads defaults from environment variables. These fill in optional
//! connection config fields the host left empty and tune the HTTP client.

use std::time::Duration;

/// Port applied to endpoints that do not name one.
pub const DEFAULT_PORT: u16 = 8086;

/// Dial timeout used when neither the config nor the environment set one.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Producer settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerSettings {
    /// Port applied when the endpoint has none and the config omits `port`.
    pub default_port: u16,
    /// Dial timeout applied when the config omits `connect_timeout`.
    pub connect_timeout: Duration,
    /// User agent sent by the HTTP connector.
    pub user_agent: String,
}

impl Default for ProducerSettings {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_PORT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            user_agent: format!("credlink/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ProducerSettings {
    /// Load settings from environment variables.
    ///
    /// Environment variables:
    /// - `CREDLINK_DEFAULT_PORT`: port for endpoints without one (default: `8086`)
    /// - `CREDLINK_CONNECT_TIMEOUT`: dial timeout in seconds (default: `10`)
    /// - `CREDLINK_USER_AGENT`: HTTP user agent (default: `credlink/<version>`)
    ///
    /// Unparseable or zero values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let default_port = lookup("CREDLINK_DEFAULT_PORT")
            .and_then(|v| v.trim().parse::<u16>().ok())
            .filter(|port| *port != 0)
            .unwrap_or(defaults.default_port);

        let connect_timeout = lookup("CREDLINK_CONNECT_TIMEOUT")
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs != 0)
            .map_or(defaults.connect_timeout, Duration::from_secs);

        let user_agent = lookup("CREDLINK_USER_AGENT")
            .filter(|v| !v.trim().is_empty())
            .unwrap_or(defaults.user_agent);

        Self {
            default_port,
            connect_timeout,
            user_agent,
        }
    }
}
