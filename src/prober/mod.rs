use anyhow::Result;
use std::future::Future;

pub mod postgres;

/// One-shot connectivity check against a single endpoint.
///
/// `attempt` is not cancelled by the caller once started, so an
/// implementation that hangs delays the poller by that long.
pub trait Probe: Send + Sync + 'static {
    fn attempt(&self) -> impl Future<Output = Result<()>> + Send;
}
