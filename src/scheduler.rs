use std::time::Duration;
use tokio::sync::oneshot;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info};

use crate::deadline::Deadline;
use crate::prober::Probe;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    Connected,
    /// The deadline fired before any attempt succeeded.
    Abandoned,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub attempts: u32,
}

/// Single-use signal that the polling loop has finished.
#[derive(Debug)]
pub struct Completion {
    rx: oneshot::Receiver<PollReport>,
}

impl Completion {
    /// Wait for the loop to finish. `None` means the polling task went away
    /// without reporting, which only happens if it panicked.
    pub async fn wait(self) -> Option<PollReport> {
        self.rx.await.ok()
    }
}

pub struct Scheduler<P> {
    probe: P,
    interval: Duration,
}

impl<P: Probe> Scheduler<P> {
    /// `interval` must be non-zero.
    pub fn new(probe: P, interval: Duration) -> Self {
        Self { probe, interval }
    }

    /// Run the polling loop on its own task.
    pub fn spawn(self, deadline: Deadline) -> Completion {
        let (tx, rx) = oneshot::channel();
        tokio::spawn(async move {
            let report = self.run(&deadline).await;
            let _ = tx.send(report);
        });
        Completion { rx }
    }

    /// Probe until one attempt succeeds or the deadline fires. The deadline
    /// is only checked between attempts.
    pub async fn run(&self, deadline: &Deadline) -> PollReport {
        let mut ticker = interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut attempts = 0u32;

        loop {
            attempts = attempts.saturating_add(1);
            match self.probe.attempt().await {
                Ok(()) => {
                    // cancel before reporting so the resolver never sees a live deadline
                    deadline.cancel();
                    info!(attempts, "database is accepting connections");
                    return PollReport { outcome: PollOutcome::Connected, attempts };
                }
                Err(e) => {
                    debug!(
                        attempt = attempts,
                        remaining = ?deadline.remaining(),
                        error = %e,
                        "probe attempt failed"
                    );
                }
            }

            tokio::select! {
                biased;
                reason = deadline.notified() => {
                    debug!(?reason, attempts, "deadline reached, giving up");
                    return PollReport { outcome: PollOutcome::Abandoned, attempts };
                }
                _ = ticker.tick() => {}
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::deadline::TerminalReason;
    use anyhow::Result;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    /// Fails `failures` times, then succeeds. Each attempt takes `latency`.
    #[derive(Clone)]
    pub(crate) struct ScriptedProbe {
        pub failures: u32,
        pub latency: Duration,
        pub calls: Arc<AtomicU32>,
    }

    impl ScriptedProbe {
        pub fn failing_then_ok(failures: u32) -> Self {
            Self { failures, latency: Duration::ZERO, calls: Arc::new(AtomicU32::new(0)) }
        }

        pub fn always_failing() -> Self {
            Self::failing_then_ok(u32::MAX)
        }

        pub fn with_latency(mut self, latency: Duration) -> Self {
            self.latency = latency;
            self
        }

        pub fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Probe for ScriptedProbe {
        async fn attempt(&self) -> Result<()> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.latency.is_zero() {
                tokio::time::sleep(self.latency).await;
            }
            if n < self.failures {
                Err(anyhow::anyhow!("connection refused"))
            } else {
                Ok(())
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_attempt_success_cancels_deadline() {
        let probe = ScriptedProbe::failing_then_ok(0);
        let deadline = Deadline::start(Duration::from_secs(60));
        let report = Scheduler::new(probe.clone(), Duration::from_secs(1)).run(&deadline).await;

        assert_eq!(report, PollReport { outcome: PollOutcome::Connected, attempts: 1 });
        assert_eq!(deadline.reason(), Some(TerminalReason::CanceledExplicitly));
        assert_eq!(probe.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retries_at_fixed_interval() {
        let start = Instant::now();
        let probe = ScriptedProbe::failing_then_ok(3);
        let deadline = Deadline::start(Duration::from_secs(60));
        let report = Scheduler::new(probe.clone(), Duration::from_secs(1)).run(&deadline).await;

        assert_eq!(report.outcome, PollOutcome::Connected);
        assert_eq!(report.attempts, 4);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_abandons_when_deadline_fires() {
        let start = Instant::now();
        let probe = ScriptedProbe::always_failing();
        let deadline = Deadline::start(Duration::from_secs(3));
        let report = Scheduler::new(probe.clone(), Duration::from_secs(1)).run(&deadline).await;

        assert_eq!(report.outcome, PollOutcome::Abandoned);
        assert!(report.attempts >= 3);
        assert_eq!(start.elapsed(), Duration::from_secs(3));
        assert_eq!(deadline.reason(), Some(TerminalReason::ExpiredByTimeout));
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_attempt_is_not_preempted() {
        let start = Instant::now();
        let probe = ScriptedProbe::always_failing().with_latency(Duration::from_secs(3));
        let deadline = Deadline::start(Duration::from_secs(2));
        let report = Scheduler::new(probe.clone(), Duration::from_secs(1)).run(&deadline).await;

        assert_eq!(report, PollReport { outcome: PollOutcome::Abandoned, attempts: 1 });
        // overshoots the deadline by the rest of the slow attempt
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_attempts_skip_missed_ticks() {
        let start = Instant::now();
        let probe = ScriptedProbe::failing_then_ok(2).with_latency(Duration::from_millis(1500));
        let deadline = Deadline::start(Duration::from_secs(60));
        let report = Scheduler::new(probe.clone(), Duration::from_secs(1)).run(&deadline).await;

        assert_eq!(report.attempts, 3);
        // attempts start at 0s, 1.5s (missed tick fires at once) and 3s
        assert_eq!(start.elapsed(), Duration::from_millis(4500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawned_loop_signals_completion() {
        let probe = ScriptedProbe::failing_then_ok(1);
        let deadline = Deadline::start(Duration::from_secs(10));
        let completion = Scheduler::new(probe, Duration::from_secs(1)).spawn(deadline.clone());

        let report = completion.wait().await;
        assert_eq!(report, Some(PollReport { outcome: PollOutcome::Connected, attempts: 2 }));
    }
}
