use anyhow::Result;
use sqlx::Connection;
use sqlx::postgres::{PgConnectOptions, PgConnection, PgSslMode};

use super::Probe;
use crate::config::ConnectionParams;

/// Opens a fresh connection per attempt, pings it and closes it.
#[derive(Debug, Clone)]
pub struct PgProbe {
    options: PgConnectOptions,
}

impl PgProbe {
    pub fn new(params: &ConnectionParams) -> Result<Self> {
        validate(params)?;

        let options = PgConnectOptions::new_without_pgpass()
            .host(&params.host)
            .port(params.port)
            .username(&params.username)
            .password(&params.password)
            .database(&params.database)
            .ssl_mode(PgSslMode::Disable);

        Ok(Self { options })
    }
}

fn validate(params: &ConnectionParams) -> Result<()> {
    if params.host.trim().is_empty() {
        return Err(anyhow::anyhow!("host must not be empty"));
    }
    if params.username.is_empty() {
        return Err(anyhow::anyhow!("username must not be empty"));
    }
    // the startup message is NUL-delimited
    let fields = [
        ("host", &params.host),
        ("username", &params.username),
        ("password", &params.password),
        ("dbname", &params.database),
    ];
    for (name, value) in fields {
        if value.contains('\0') {
            return Err(anyhow::anyhow!("{} contains a NUL byte", name));
        }
    }
    Ok(())
}

impl Probe for PgProbe {
    async fn attempt(&self) -> Result<()> {
        let mut conn = PgConnection::connect_with(&self.options).await?;
        conn.ping().await?;
        conn.close().await?;
        Ok(())
    }
}
