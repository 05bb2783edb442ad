//! Core configuration types and loading.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Candidate endpoints (`host:port`), tried in order with failover.
    pub servers: Vec<String>,
    /// Who the bot is on the network.
    pub identity: IdentityConfig,
    /// Connect, failover and reconnect timing.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Outbound flood control.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Plugin loading and storage.
    #[serde(default)]
    pub modules: ModulesConfig,
    /// Metrics/control HTTP port (0 or absent disables the endpoint).
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }
}

/// Identity sent during registration.
#[derive(Debug, Clone, Deserialize)]
pub struct IdentityConfig {
    /// Preferred nickname.
    pub nick: String,
    /// Username (ident). Defaults to the nickname.
    pub user: Option<String>,
    /// Real name shown in WHOIS.
    #[serde(default = "default_realname")]
    pub realname: String,
    /// Server password, sent as PASS before NICK/USER.
    pub password: Option<String>,
}

impl IdentityConfig {
    /// Username to register with.
    pub fn username(&self) -> &str {
        self.user.as_deref().unwrap_or(&self.nick)
    }
}

fn default_realname() -> String {
    "relaybot".to_string()
}

/// Connection lifecycle timing.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    /// Pause between failed connect attempts (default: 5).
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    /// Pause after a dropped session before reconnecting (default: 10).
    #[serde(default = "default_reconnect_backoff")]
    pub reconnect_backoff_secs: u64,
    /// Upper bound on a single connect attempt (default: 30).
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    /// Maximum accepted line length in bytes (default: 8192).
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

impl ConnectionConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn reconnect_backoff(&self) -> Duration {
        Duration::from_secs(self.reconnect_backoff_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            retry_delay_secs: default_retry_delay(),
            reconnect_backoff_secs: default_reconnect_backoff(),
            connect_timeout_secs: default_connect_timeout(),
            max_line_len: default_max_line_len(),
        }
    }
}

fn default_retry_delay() -> u64 {
    5
}

fn default_reconnect_backoff() -> u64 {
    10
}

fn default_connect_timeout() -> u64 {
    30
}

fn default_max_line_len() -> usize {
    relaybot_proto::line::DEFAULT_MAX_LINE_LEN
}

/// Burst bucket settings for the output queue.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Pace outbound traffic at all (default: true).
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Messages that may be sent back-to-back (default: 5).
    #[serde(default = "default_capacity")]
    pub capacity: u32,
    /// Seconds per refilled token (default: 1.0).
    #[serde(default = "default_period")]
    pub period_secs: f64,
}

impl RateLimitConfig {
    /// Refill period; falls back to one second when the value is unusable.
    pub fn period(&self) -> Duration {
        Duration::try_from_secs_f64(self.period_secs)
            .ok()
            .filter(|d| !d.is_zero())
            .unwrap_or(Duration::from_secs(1))
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            capacity: default_capacity(),
            period_secs: default_period(),
        }
    }
}

fn default_capacity() -> u32 {
    5
}

fn default_period() -> f64 {
    1.0
}

/// Plugin loading and storage.
#[derive(Debug, Clone, Deserialize)]
pub struct ModulesConfig {
    /// Modules loaded at startup, in order. Teardown runs in reverse.
    #[serde(default)]
    pub autoload: Vec<String>,
    /// Root for per-module config files and data directories.
    #[serde(default = "default_data_root")]
    pub data_root: PathBuf,
    /// Prefix that marks a channel message as a bot command (default: ".").
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            autoload: Vec::new(),
            data_root: default_data_root(),
            command_prefix: default_command_prefix(),
        }
    }
}

fn default_data_root() -> PathBuf {
    PathBuf::from("data")
}

fn default_command_prefix() -> String {
    ".".to_string()
}

pub(super) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            servers = ["irc.example.net:6667"]

            [identity]
            nick = "relay"
            "#,
        )
        .unwrap();

        assert_eq!(config.servers, vec!["irc.example.net:6667"]);
        assert_eq!(config.identity.username(), "relay");
        assert_eq!(config.identity.realname, "relaybot");
        assert_eq!(config.connection.retry_delay(), Duration::from_secs(5));
        assert_eq!(config.connection.reconnect_backoff(), Duration::from_secs(10));
        assert!(config.rate_limit.enabled);
        assert_eq!(config.rate_limit.capacity, 5);
        assert_eq!(config.modules.command_prefix, ".");
        assert!(config.modules.autoload.is_empty());
        assert_eq!(config.metrics_port, None);
    }

    #[test]
    fn test_full_config() {
        let config: Config = toml::from_str(
            r#"
            servers = ["a.example:6667", "b.example:6697"]
            metrics_port = 9100

            [identity]
            nick = "relay"
            user = "ident"
            realname = "Relay Bot"
            password = "secret"

            [connection]
            retry_delay_secs = 1
            reconnect_backoff_secs = 2

            [rate_limit]
            enabled = false
            capacity = 3
            period_secs = 2.5

            [modules]
            autoload = ["autojoin", "uptime"]
            data_root = "/var/lib/relaybot"
            command_prefix = "!"
            "#,
        )
        .unwrap();

        assert_eq!(config.identity.username(), "ident");
        assert_eq!(config.identity.password.as_deref(), Some("secret"));
        assert_eq!(config.connection.retry_delay_secs, 1);
        assert_eq!(config.connection.connect_timeout_secs, 30);
        assert!(!config.rate_limit.enabled);
        assert_eq!(config.rate_limit.period_secs, 2.5);
        assert_eq!(config.modules.autoload, vec!["autojoin", "uptime"]);
        assert_eq!(config.modules.data_root, PathBuf::from("/var/lib/relaybot"));
        assert_eq!(config.metrics_port, Some(9100));
    }

    #[test]
    fn test_rate_limit_period_fallback() {
        let mut rate = RateLimitConfig::default();
        assert_eq!(rate.period(), Duration::from_secs(1));
        rate.period_secs = 0.25;
        assert_eq!(rate.period(), Duration::from_millis(250));
        rate.period_secs = -1.0;
        assert_eq!(rate.period(), Duration::from_secs(1));
        rate.period_secs = f64::NAN;
        assert_eq!(rate.period(), Duration::from_secs(1));
    }

    #[test]
    fn test_load_missing_file() {
        let err = Config::load("/nonexistent/relaybot.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
