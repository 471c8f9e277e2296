use std::time::Duration;
use tracing::{debug, error};

use crate::deadline::{Deadline, TerminalReason};
use crate::prober::Probe;
use crate::scheduler::{PollOutcome, Scheduler};

/// How a run ended, as seen by the calling script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Ready,
    TimedOut,
    /// The connectivity layer could not be used at all.
    Aborted,
}

impl ExitOutcome {
    pub fn code(self) -> u8 {
        match self {
            ExitOutcome::Ready => 0,
            ExitOutcome::Aborted => 2,
            ExitOutcome::TimedOut => 3,
        }
    }
}

/// Poll `probe` every `interval` until it connects or `timeout` elapses.
pub async fn resolve<P: Probe>(probe: P, timeout: Duration, interval: Duration) -> ExitOutcome {
    let deadline = Deadline::start(timeout);
    let completion = Scheduler::new(probe, interval).spawn(deadline.clone());

    let Some(report) = completion.wait().await else {
        error!("polling task ended without reporting");
        return ExitOutcome::Aborted;
    };

    // on success the loop has already canceled; on abandon the timer has fired
    let reason = deadline.notified().await;

    match reason {
        TerminalReason::CanceledExplicitly => ExitOutcome::Ready,
        TerminalReason::ExpiredByTimeout => {
            if report.outcome == PollOutcome::Connected {
                debug!(attempts = report.attempts, "connected only after the deadline had passed");
            }
            ExitOutcome::TimedOut
        }
    }
}
