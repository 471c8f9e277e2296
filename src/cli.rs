//! Command-line surface.
//!
//! Credentials only come from the positionals; polling settings layer as
//! built-in defaults, then the `--config` file, then explicit flags.

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;

use crate::config::{ConnectionParams, Settings, WaitConfig};

/// Exit code for any argument or configuration problem.
pub const USAGE_EXIT_CODE: u8 = 1;

/// Wait until a PostgreSQL server accepts connections.
///
/// Exits 0 once connected, 1 on bad arguments, 2 if the connection cannot be
/// set up, and 3 if the timeout elapses first.
#[derive(Parser, Debug)]
#[command(name = "pg-wait")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Database user
    #[arg(allow_hyphen_values = true)]
    pub username: String,

    /// Password for the user
    #[arg(allow_hyphen_values = true)]
    pub password: String,

    /// Database to connect to
    #[arg(allow_hyphen_values = true)]
    pub dbname: String,

    /// Server host [default: localhost]
    #[arg(long)]
    pub host: Option<String>,

    /// Server port [default: 5432]
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..))]
    pub port: Option<u16>,

    /// Seconds to keep trying before giving up [default: 60]
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Milliseconds between attempts [default: 1000]
    #[arg(long)]
    pub interval_ms: Option<u64>,

    /// Log level (trace, debug, info, warn, error) [default: warn]
    #[arg(long)]
    pub log_level: Option<String>,

    /// JSON file with host, port, timeout_secs, interval_ms and log_level
    #[arg(long)]
    pub config: Option<PathBuf>,
}

impl Cli {
    pub async fn into_settings(self) -> Result<Settings> {
        let mut wait = match &self.config {
            Some(path) => WaitConfig::load_file(path).await?,
            None => WaitConfig::default(),
        };

        if let Some(host) = self.host {
            wait.host = host;
        }
        if let Some(port) = self.port {
            wait.port = port;
        }
        if let Some(timeout) = self.timeout {
            wait.timeout_secs = timeout;
        }
        if let Some(interval_ms) = self.interval_ms {
            wait.interval_ms = interval_ms;
        }
        if let Some(log_level) = self.log_level {
            wait.log_level = log_level;
        }
        wait.validate()?;

        let connection = ConnectionParams {
            host: wait.host.clone(),
            port: wait.port,
            username: self.username,
            password: self.password,
            database: self.dbname,
        };

        Ok(Settings { wait, connection })
    }
}
