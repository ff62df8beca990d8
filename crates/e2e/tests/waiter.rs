use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use test_case::test_case;

use qpc_e2e::diagnostic::ResultsSnapshot;
use qpc_e2e::waiter::Sleeper;
use qpc_e2e::{
    wait_for_state, HarnessError, HarnessResult, JobRecord, JobRef, ScanStatus, StatusSource, WaitOutcome,
    WaitRequest, Waiter,
};

/// Replays a fixed sequence of statuses, repeating the last one forever
struct ScriptedSource {
    statuses: Mutex<VecDeque<&'static str>>,
    last: Mutex<&'static str>,
    polls: AtomicUsize,
    results: Option<Value>,
    results_error: Option<&'static str>,
}

impl ScriptedSource {
    fn new(statuses: &[&'static str]) -> Self {
        Self {
            statuses: Mutex::new(statuses.iter().copied().collect()),
            last: Mutex::new("created"),
            polls: AtomicUsize::new(0),
            results: None,
            results_error: None,
        }
    }

    fn with_results(mut self, results: Value) -> Self {
        self.results = Some(results);
        self
    }

    fn with_results_error(mut self, message: &'static str) -> Self {
        self.results_error = Some(message);
        self
    }

    fn polls(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusSource for ScriptedSource {
    async fn fetch_status(&self, job: &JobRef) -> HarnessResult<JobRecord> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.statuses.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(JobRecord::from_value(json!({
            "id": job.as_str(),
            "status": *last,
            "scan_type": "inspect",
        })))
    }

    async fn fetch_results(&self, _job: &JobRef) -> HarnessResult<Option<Value>> {
        if let Some(message) = self.results_error {
            return Err(HarnessError::UnexpectedOutput(message.to_string()));
        }
        Ok(self.results.clone())
    }
}

/// Fails every poll with a transport error
struct BrokenSource {
    polls: AtomicUsize,
}

#[async_trait]
impl StatusSource for BrokenSource {
    async fn fetch_status(&self, _job: &JobRef) -> HarnessResult<JobRecord> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        Err(HarnessError::Io(std::io::Error::new(
            std::io::ErrorKind::ConnectionRefused,
            "connection refused",
        )))
    }
}

/// Records sleeps instead of sleeping
#[derive(Clone, Default)]
struct RecordingSleeper {
    slept: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    fn count(&self) -> usize {
        self.slept.lock().unwrap().len()
    }

    fn total(&self) -> Duration {
        self.slept.lock().unwrap().iter().sum()
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

fn secs(n: u64) -> Duration {
    Duration::from_secs(n)
}

fn waiter(sleeper: &RecordingSleeper) -> Waiter<RecordingSleeper> {
    Waiter::new().with_interval(secs(5)).with_sleeper(sleeper.clone())
}

#[tokio::test]
async fn test_reaches_target_after_four_polls() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["pending", "pending", "running", "completed"]);
    let request = WaitRequest::new(7u64, ScanStatus::Completed, secs(120));

    let outcome = waiter(&sleeper).wait(&request, &source).await.unwrap();

    assert_eq!(outcome, WaitOutcome::Reached(ScanStatus::Completed));
    assert_eq!(source.polls(), 4);
    assert_eq!(sleeper.count(), 4);
    assert_eq!(sleeper.total(), secs(20));
}

#[tokio::test]
async fn test_times_out_with_last_observed_status() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["running", "running", "running"]);
    let request = WaitRequest::new(8u64, ScanStatus::Completed, secs(10));

    let outcome = waiter(&sleeper).wait(&request, &source).await.unwrap();

    let diag = match outcome {
        WaitOutcome::TimedOut(diag) => diag,
        other => panic!("expected timeout, got {other:?}"),
    };
    assert_eq!(source.polls(), 2);
    assert_eq!(sleeper.total(), secs(10));
    assert_eq!(diag.observed, Some(ScanStatus::Running));
    assert_eq!(diag.polls, 2);

    let message = diag.timed_out_message();
    assert!(message.contains("ID=8"));
    assert!(message.contains("state=\"completed\""));
    assert!(message.contains("last observed state=\"running\""));
    assert!(message.contains("\"scan_type\": \"inspect\""));
}

#[tokio::test]
async fn test_failed_job_short_circuits() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["running", "failed"]).with_results(json!({"hosts": 0}));
    let request = WaitRequest::new(9u64, ScanStatus::Completed, secs(900));

    let outcome = waiter(&sleeper).wait(&request, &source).await.unwrap();

    let diag = match outcome {
        WaitOutcome::Failed(diag) => diag,
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(source.polls(), 2);
    assert_eq!(diag.observed, Some(ScanStatus::Failed));
    assert_eq!(diag.results, ResultsSnapshot::Available(json!({"hosts": 0})));
    assert!(diag.failed_message().contains("last observed state=\"failed\""));
}

#[tokio::test]
async fn test_results_error_keeps_failed_outcome() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["running", "failed"]).with_results_error("boom");
    let request = WaitRequest::new(20u64, ScanStatus::Completed, secs(60));

    let outcome = waiter(&sleeper).wait(&request, &source).await.unwrap();

    let diag = match outcome {
        WaitOutcome::Failed(diag) => diag,
        other => panic!("expected failure, got {other:?}"),
    };
    assert_eq!(diag.observed, Some(ScanStatus::Failed));
    assert_eq!(
        diag.results,
        ResultsSnapshot::Unavailable("Unexpected output: boom".to_string())
    );
    assert!(diag
        .failed_message()
        .ends_with("results available from the scan job:\nunavailable (Unexpected output: boom)"));
}

#[tokio::test]
async fn test_results_error_keeps_timeout_outcome() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["running"]).with_results_error("connection reset");
    let request = WaitRequest::new(21u64, ScanStatus::Completed, secs(5));

    let err = waiter(&sleeper)
        .wait(&request, &source)
        .await
        .unwrap()
        .into_result()
        .unwrap_err();

    assert!(err.is_timeout());
    assert!(err.to_string().contains("unavailable (Unexpected output: connection reset)"));
}

#[tokio::test]
async fn test_waiting_for_failed_is_success() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["running", "failed"]);
    let request = WaitRequest::new(10u64, ScanStatus::Failed, secs(60));

    let outcome = waiter(&sleeper).wait(&request, &source).await.unwrap();

    assert!(outcome.is_reached());
    assert_eq!(source.polls(), 2);
}

#[tokio::test]
async fn test_zero_budget_never_polls() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["completed"]);
    let request = WaitRequest::new(11u64, ScanStatus::Completed, Duration::ZERO);

    let outcome = waiter(&sleeper).wait(&request, &source).await.unwrap();

    let diag = match outcome {
        WaitOutcome::TimedOut(diag) => diag,
        other => panic!("expected timeout, got {other:?}"),
    };
    assert_eq!(source.polls(), 0);
    assert_eq!(sleeper.count(), 0);
    assert_eq!(diag.polls, 0);
    assert!(diag.timed_out_message().contains("no polls attempted"));
}

#[tokio::test]
async fn test_zero_budget_through_wait_for_state() {
    let source = ScriptedSource::new(&["completed"]);

    let err = wait_for_state(12u64, ScanStatus::Completed, Duration::ZERO, &source)
        .await
        .unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(source.polls(), 0);
}

#[test_case(&["completed"], 1 ; "first poll")]
#[test_case(&["created", "completed"], 2 ; "second poll")]
#[test_case(&["created", "pending", "running", "paused", "running", "completed"], 6 ; "sixth poll")]
#[tokio::test]
async fn test_polls_and_sleeps_match(statuses: &'static [&'static str], expected: usize) {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(statuses);
    let request = WaitRequest::new(13u64, ScanStatus::Completed, secs(120));

    let outcome = waiter(&sleeper).wait(&request, &source).await.unwrap();

    assert!(outcome.is_reached());
    assert_eq!(source.polls(), expected);
    assert_eq!(sleeper.count(), expected);
}

#[tokio::test]
async fn test_second_wait_on_settled_job_returns_on_first_poll() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["running", "completed"]);
    let request = WaitRequest::new(14u64, ScanStatus::Completed, secs(120));
    let waiter = waiter(&sleeper);

    assert!(waiter.wait(&request, &source).await.unwrap().is_reached());
    assert_eq!(source.polls(), 2);

    assert!(waiter.wait(&request, &source).await.unwrap().is_reached());
    assert_eq!(source.polls(), 3);
}

#[tokio::test]
async fn test_failed_before_target_even_with_budget_left() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["created", "failed", "running", "paused"]);
    let request = WaitRequest::new(15u64, ScanStatus::Paused, secs(3600));

    let err = waiter(&sleeper)
        .wait(&request, &source)
        .await
        .unwrap()
        .into_result()
        .unwrap_err();

    assert!(err.is_scan_failure());
    assert!(!err.is_timeout());
    assert_eq!(source.polls(), 2);
}

#[tokio::test]
async fn test_unknown_status_is_not_reached() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["queued-for-rescan"]);
    let request = WaitRequest::new(16u64, ScanStatus::Completed, secs(15));

    let outcome = waiter(&sleeper).wait(&request, &source).await.unwrap();

    match outcome {
        WaitOutcome::TimedOut(diag) => {
            assert_eq!(diag.observed, Some(ScanStatus::Other("queued-for-rescan".to_string())));
        }
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(source.polls(), 3);
}

#[tokio::test]
async fn test_budget_not_a_multiple_of_interval() {
    let sleeper = RecordingSleeper::default();
    let source = ScriptedSource::new(&["running"]);
    let request = WaitRequest::new(17u64, ScanStatus::Completed, secs(12));

    let outcome = waiter(&sleeper).wait(&request, &source).await.unwrap();

    assert!(matches!(outcome, WaitOutcome::TimedOut(_)));
    // ceil(12 / 5) * 5
    assert_eq!(sleeper.total(), secs(15));
    assert_eq!(source.polls(), 3);
}

#[tokio::test]
async fn test_transport_error_propagates_unchanged() {
    let sleeper = RecordingSleeper::default();
    let source = BrokenSource {
        polls: AtomicUsize::new(0),
    };
    let request = WaitRequest::new(18u64, ScanStatus::Completed, secs(120));

    let err = waiter(&sleeper).wait(&request, &source).await.unwrap_err();

    match err {
        HarnessError::Io(e) => assert_eq!(e.kind(), std::io::ErrorKind::ConnectionRefused),
        other => panic!("expected the source's io error, got {other}"),
    }
    assert_eq!(source.polls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_real_sleeper_with_short_interval() {
    let source = ScriptedSource::new(&["running", "completed"]);
    let request = WaitRequest::new(19u64, ScanStatus::Completed, Duration::from_millis(100));

    let outcome = Waiter::new()
        .with_interval(Duration::from_millis(10))
        .wait(&request, &source)
        .await
        .unwrap();

    assert!(outcome.is_reached());
}
