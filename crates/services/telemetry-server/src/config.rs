//! Configuration for the telemetry server
//!
//! Configuration can be loaded from a TOML file and/or environment variables.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Main configuration for the telemetry server
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Record store connection
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Live push delivery
    #[serde(default)]
    pub broadcast: BroadcastConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP port
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Record store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Store address: a path, `sqlite://<path>`, or `:memory:`
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://telemetry.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Push delivery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastConfig {
    /// Upper bound on one send to one subscriber, in milliseconds
    #[serde(default = "default_send_timeout")]
    pub send_timeout_ms: u64,

    /// Payloads queued per subscriber before sends start to wait
    #[serde(default = "default_subscriber_buffer")]
    pub subscriber_buffer: usize,
}

fn default_send_timeout() -> u64 {
    1000
}

fn default_subscriber_buffer() -> usize {
    64
}

impl Default for BroadcastConfig {
    fn default() -> Self {
        Self {
            send_timeout_ms: default_send_timeout(),
            subscriber_buffer: default_subscriber_buffer(),
        }
    }
}

impl BroadcastConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(e.to_string()))?;
        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        Ok(config)
    }

    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    fn with_env_overrides(mut self, var: impl Fn(&str) -> Option<String>) -> Self {
        // Server
        if let Some(host) = var("TELEMETRY_HOST") {
            self.server.host = host;
        }
        if let Some(p) = var("TELEMETRY_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = p;
        }

        // Database
        if let Some(url) = var("DATABASE_URL") {
            self.database.url = url;
        }

        // Broadcast
        if let Some(t) = var("TELEMETRY_SEND_TIMEOUT_MS").and_then(|v| v.parse().ok()) {
            self.broadcast.send_timeout_ms = t;
        }
        if let Some(b) = var("TELEMETRY_SUBSCRIBER_BUFFER").and_then(|v| v.parse().ok()) {
            self.broadcast.subscriber_buffer = b;
        }

        self
    }

    /// Load configuration from file if it exists, otherwise from environment
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        if let Some(p) = path {
            if p.as_ref().exists() {
                return Self::from_file(p);
            }
        }
        Ok(Self::from_env())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.server.bind_addr(), "127.0.0.1:8000");
        assert_eq!(config.database.url, "sqlite://telemetry.db");
        assert_eq!(config.broadcast.send_timeout(), Duration::from_secs(1));
        assert_eq!(config.broadcast.subscriber_buffer, 64);
    }

    #[test]
    fn test_config_from_toml() {
        let toml = r#"
[server]
port = 9090

[database]
url = "sqlite:///var/lib/telemetry/data.db"

[broadcast]
send_timeout_ms = 250
"#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
        assert_eq!(config.database.url, "sqlite:///var/lib/telemetry/data.db");
        assert_eq!(config.broadcast.send_timeout_ms, 250);
        assert_eq!(config.broadcast.subscriber_buffer, 64);
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [
            ("DATABASE_URL", ":memory:"),
            ("TELEMETRY_PORT", "8123"),
            ("TELEMETRY_SUBSCRIBER_BUFFER", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let config =
            Config::default().with_env_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.database.url, ":memory:");
        assert_eq!(config.server.port, 8123);
        // Unparsable values keep the default
        assert_eq!(config.broadcast.subscriber_buffer, 64);
    }

    #[test]
    fn test_load_missing_file_falls_back() {
        let config = Config::load(Some("/nonexistent/telemetry.toml")).unwrap();
        assert!(!config.server.host.is_empty());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, b"[server]\nhost = \"0.0.0.0\"\n").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8000);
    }
}
