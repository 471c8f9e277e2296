mod cli;
mod config;
mod deadline;
mod prober;
mod resolver;
mod scheduler;

use clap::Parser;
use cli::{Cli, USAGE_EXIT_CODE};
use config::WaitConfig;
use prober::postgres::PgProbe;
use resolver::ExitOutcome;

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use tracing::{debug, info};

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let code = run(std::env::args_os(), &mut std::io::stderr()).await;
    ExitCode::from(code)
}

/// Parse `args`, wait for the database and return the process exit code.
/// Our own diagnostics go to `stderr`; clap prints usage and help itself.
async fn run<I, T>(args: I, stderr: &mut impl Write) -> u8
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() { USAGE_EXIT_CODE } else { 0 };
        }
    };

    let settings = match cli.into_settings().await {
        Ok(settings) => settings,
        Err(e) => {
            let _ = writeln!(stderr, "invalid configuration: {:#}", e);
            return USAGE_EXIT_CODE;
        }
    };

    if let Err(e) = init_tracing(&settings.wait) {
        let _ = writeln!(stderr, "failed to initialize logging: {:#}", e);
        return USAGE_EXIT_CODE;
    }
    debug!(connection = ?settings.connection, "starting pg-wait");

    let probe = match PgProbe::new(&settings.connection) {
        Ok(probe) => probe,
        Err(e) => {
            let _ = writeln!(stderr, "failed to open db: {:#}", e);
            return ExitOutcome::Aborted.code();
        }
    };

    info!(
        host = %settings.connection.host,
        port = settings.connection.port,
        timeout_secs = settings.wait.timeout_secs,
        "waiting for database"
    );
    let outcome = resolver::resolve(probe, settings.wait.timeout(), settings.wait.interval()).await;

    if outcome == ExitOutcome::TimedOut {
        let _ = writeln!(stderr, "timeout");
    }
    outcome.code()
}

fn init_tracing(config: &WaitConfig) -> anyhow::Result<()> {
    let log_level = config.get_tracing_level()?;
    let installed = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env()
                         .add_directive(format!("pg_wait={}", log_level.as_str().to_lowercase()).parse()?))
        .try_init();
    if installed.is_err() {
        debug!("tracing subscriber already installed");
    }
    Ok(())
}
