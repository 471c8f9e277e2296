use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

/// Why a deadline stopped being live. Recorded once, never overwritten.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalReason {
    ExpiredByTimeout,
    CanceledExplicitly,
}

/// Handle to a cancellable deadline. Clones share the same state.
///
/// The state is a `watch` slot that starts empty and is filled by the first
/// of the internal timer or [`Deadline::cancel`]; every later write is a no-op,
/// so waiters are notified exactly once.
#[derive(Debug, Clone)]
pub struct Deadline {
    state: Arc<watch::Sender<Option<TerminalReason>>>,
    expires_at: Option<Instant>,
}

impl Deadline {
    /// Start the deadline `timeout` from now. Must be called inside a tokio runtime.
    pub fn start(timeout: Duration) -> Self {
        let (tx, _) = watch::channel(None);
        let state = Arc::new(tx);
        let expires_at = Instant::now().checked_add(timeout);
        let deadline = Self { state, expires_at };

        if timeout.is_zero() {
            deadline.settle(TerminalReason::ExpiredByTimeout);
            return deadline;
        }

        let timer = deadline.clone();
        tokio::spawn(async move {
            let mut settled = timer.state.subscribe();
            match timer.expires_at {
                Some(at) => {
                    tokio::select! {
                        _ = sleep_until(at) => {
                            timer.settle(TerminalReason::ExpiredByTimeout);
                        }
                        _ = settled.wait_for(Option::is_some) => {}
                    }
                }
                // too far out to represent; only an explicit cancel ends it
                None => {
                    let _ = settled.wait_for(Option::is_some).await;
                }
            }
        });

        deadline
    }

    /// Cancel the deadline early. Safe to call any number of times, from any
    /// task, including after expiry; only the first terminal reason sticks.
    pub fn cancel(&self) {
        self.settle(TerminalReason::CanceledExplicitly);
    }

    fn settle(&self, reason: TerminalReason) -> bool {
        let won = self.state.send_if_modified(|slot| {
            if slot.is_some() {
                return false;
            }
            *slot = Some(reason);
            true
        });
        if won {
            debug!(?reason, "deadline settled");
        }
        won
    }

    /// Resolves once the deadline has expired or been canceled.
    pub async fn notified(&self) -> TerminalReason {
        let mut rx = self.state.subscribe();
        let settled = rx.wait_for(Option::is_some).await.ok().and_then(|reason| *reason);
        // `self` keeps the sender alive, so the channel cannot close under us
        settled.unwrap_or(TerminalReason::ExpiredByTimeout)
    }

    /// Terminal reason, if the deadline has already fired.
    pub fn reason(&self) -> Option<TerminalReason> {
        *self.state.borrow()
    }

    pub fn expires_at(&self) -> Option<Instant> {
        self.expires_at
    }

    /// Time left before expiry; `None` if the deadline never expires on its own.
    pub fn remaining(&self) -> Option<Duration> {
        if self.reason().is_some() {
            return Some(Duration::ZERO);
        }
        self.expires_at().map(|at| at.saturating_duration_since(Instant::now()))
    }
}
