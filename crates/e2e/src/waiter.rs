//! Waiting for a scan job to reach a state
//!
//! Each cycle sleeps for the poll interval, takes the interval off the
//! remaining budget, polls the job once and then decides:
//!
//! ```text
//!   polling ──status == target────────────────────▶ reached
//!      │
//!      ├────status == failed (target != failed)───▶ failed
//!      │
//!      └────budget spent──────────────────────────▶ timed out
//! ```
//!
//! The budget is counted down by the interval rather than checked against
//! the wall clock, so a slow status source stretches the real wait. Total
//! sleep never exceeds `ceil(timeout / interval) * interval`.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::diagnostic::{Diagnostic, ResultsSnapshot};
use crate::error::{HarnessError, HarnessResult};
use crate::source::StatusSource;
use crate::status::{JobRecord, JobRef, ScanStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Sleeps between polls
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// What to wait for
#[derive(Debug, Clone, PartialEq)]
pub struct WaitRequest {
    pub job: JobRef,
    pub target: ScanStatus,
    pub timeout: Duration,
}

impl WaitRequest {
    pub fn new(job: impl Into<JobRef>, target: ScanStatus, timeout: Duration) -> Self {
        Self {
            job: job.into(),
            target,
            timeout,
        }
    }
}

/// How a wait ended
#[derive(Debug, Clone, PartialEq)]
pub enum WaitOutcome {
    Reached(ScanStatus),
    Failed(Diagnostic),
    TimedOut(Diagnostic),
}

impl WaitOutcome {
    pub fn is_reached(&self) -> bool {
        matches!(self, WaitOutcome::Reached(_))
    }

    /// `Ok(())` when reached, otherwise the matching error with its
    /// rendered diagnostic
    pub fn into_result(self) -> HarnessResult<()> {
        match self {
            WaitOutcome::Reached(_) => Ok(()),
            WaitOutcome::Failed(diag) => Err(HarnessError::ScanFailed {
                message: diag.failed_message(),
            }),
            WaitOutcome::TimedOut(diag) => Err(HarnessError::WaitTimeout {
                message: diag.timed_out_message(),
            }),
        }
    }
}

/// Polls a status source until a scan job reaches a state, fails, or the
/// budget runs out. Holds no per-wait state, so one waiter can serve
/// concurrent waits on different jobs.
#[derive(Debug, Clone)]
pub struct Waiter<Z = TokioSleeper> {
    interval: Duration,
    sleeper: Z,
}

impl Default for Waiter<TokioSleeper> {
    fn default() -> Self {
        Self::new()
    }
}

impl Waiter<TokioSleeper> {
    pub fn new() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            sleeper: TokioSleeper,
        }
    }
}

impl<Z: Sleeper> Waiter<Z> {
    /// Swap the sleeper, e.g. for a fake clock in tests
    pub fn with_sleeper<Y: Sleeper>(self, sleeper: Y) -> Waiter<Y> {
        Waiter {
            interval: self.interval,
            sleeper,
        }
    }

    /// Change the poll interval. A zero interval would never drain the
    /// budget, so it is raised to one millisecond.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval.max(Duration::from_millis(1));
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Wait for `request.target` and report how it ended. Only transport
    /// errors from `source` come back as `Err`.
    pub async fn wait<S>(&self, request: &WaitRequest, source: &S) -> HarnessResult<WaitOutcome>
    where
        S: StatusSource + ?Sized,
    {
        let WaitRequest { job, target, timeout } = request;

        if timeout.is_zero() {
            warn!(job = %job, target = %target, "Wait budget is zero, not polling");
            return Ok(WaitOutcome::TimedOut(Diagnostic::no_polls(job.clone(), target.clone())));
        }

        let mut remaining = *timeout;
        let mut polls: u32 = 0;

        loop {
            self.sleeper.sleep(self.interval).await;
            remaining = remaining.saturating_sub(self.interval);

            let record = source.fetch_status(job).await?;
            polls += 1;
            debug!(
                job = %job,
                status = record.status.as_ref().map(ScanStatus::as_str).unwrap_or("<none>"),
                remaining_secs = remaining.as_secs(),
                "Polled scan job"
            );

            if record.is(target) {
                info!(job = %job, target = %target, polls, "Scan job reached target state");
                return Ok(WaitOutcome::Reached(target.clone()));
            }

            if !target.is_failed() && record.status.as_ref().is_some_and(ScanStatus::is_failed) {
                warn!(job = %job, target = %target, polls, "Scan job failed");
                let diag = self.diagnose(request, record, polls, source).await;
                return Ok(WaitOutcome::Failed(diag));
            }

            if remaining.is_zero() {
                warn!(job = %job, target = %target, polls, "Timed out waiting for scan job");
                let diag = self.diagnose(request, record, polls, source).await;
                return Ok(WaitOutcome::TimedOut(diag));
            }
        }
    }

    async fn diagnose<S>(&self, request: &WaitRequest, record: JobRecord, polls: u32, source: &S) -> Diagnostic
    where
        S: StatusSource + ?Sized,
    {
        let results = match source.fetch_results(&request.job).await {
            Ok(Some(results)) => ResultsSnapshot::Available(results),
            Ok(None) => ResultsSnapshot::None,
            Err(e) => {
                warn!(job = %request.job, "Could not fetch scan results: {}", e);
                ResultsSnapshot::Unavailable(e.to_string())
            }
        };
        Diagnostic::from_record(request.job.clone(), request.target.clone(), record, results, polls)
    }
}

/// Wait with the default interval until `job` reaches `target`.
///
/// Returns `Err(HarnessError::ScanFailed)` if the job fails while waiting
/// for any other state, `Err(HarnessError::WaitTimeout)` once `timeout` is
/// spent, and any error from `source` untouched.
pub async fn wait_for_state<S>(
    job: impl Into<JobRef>,
    target: ScanStatus,
    timeout: Duration,
    source: &S,
) -> HarnessResult<()>
where
    S: StatusSource + ?Sized,
{
    let request = WaitRequest::new(job, target, timeout);
    Waiter::new().wait(&request, source).await?.into_result()
}
