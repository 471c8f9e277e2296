use serde::{Deserialize, Serialize};
use anyhow::Result;
use std::fmt;
use std::path::Path;
use std::time::Duration;
use tokio::fs;

const MAX_INTERVAL_MS: u64 = 24 * 60 * 60 * 1000;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct WaitConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_interval_ms")]
    pub interval_ms: u64,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5432
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_interval_ms() -> u64 {
    1000
}

fn default_log_level() -> String {
    // stderr is shared with the "timeout" line scripts look for
    "warn".to_string()
}

impl Default for WaitConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout_secs(),
            interval_ms: default_interval_ms(),
            log_level: default_log_level(),
        }
    }
}

impl WaitConfig {
    /// Get the log level as a tracing::Level
    pub fn get_tracing_level(&self) -> Result<tracing::Level> {
        match self.log_level.to_lowercase().as_str() {
            "trace" => Ok(tracing::Level::TRACE),
            "debug" => Ok(tracing::Level::DEBUG),
            "info" => Ok(tracing::Level::INFO),
            "warn" | "warning" => Ok(tracing::Level::WARN),
            "error" => Ok(tracing::Level::ERROR),
            _ => Err(anyhow::anyhow!("Invalid log level: {}. Valid levels are: trace, debug, info, warn, error", self.log_level))
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(anyhow::anyhow!("Invalid port: 0. Port must be between 1 and 65535"));
        }
        if self.interval_ms == 0 || self.interval_ms > MAX_INTERVAL_MS {
            return Err(anyhow::anyhow!("Invalid polling interval: {}ms. Must be between 1 and {}", self.interval_ms, MAX_INTERVAL_MS));
        }
        self.get_tracing_level().map(|_| ())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Load a JSON config file. Fields it leaves out keep their defaults.
    pub async fn load_file(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", file_path.display()));
        }

        let content = fs::read_to_string(file_path).await?;
        let config: WaitConfig = serde_json::from_str(&content)
            .map_err(|e| anyhow::anyhow!("Malformed config file {}: {}", file_path.display(), e))?;
        Ok(config)
    }
}

/// Everything needed to open one connection. TLS is always disabled.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParams {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
}

impl fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("database", &self.database)
            .finish()
    }
}

/// The settled configuration for one run: polling behaviour plus the
/// connection descriptor.
#[derive(Debug, Clone)]
pub struct Settings {
    pub wait: WaitConfig,
    pub connection: ConnectionParams,
}
