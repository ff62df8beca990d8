//! Failure messages for scan waits
//!
//! A wait that fails has to explain itself without anyone re-querying the
//! server, so the message carries the whole job record and, when the
//! binding can fetch them, the results gathered so far.

use std::fmt::Write as _;

use serde_json::Value;

use crate::status::{pretty, JobRecord, JobRef, ScanStatus};

/// Results record attached to a diagnostic
#[derive(Debug, Clone, PartialEq)]
pub enum ResultsSnapshot {
    /// Not fetched: no poll happened, or the binding has no results query
    None,
    Available(Value),
    /// The results query itself failed
    Unavailable(String),
}

/// Snapshot of a scan job at the moment a wait gave up
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub job: JobRef,
    pub target: ScanStatus,
    /// Status from the last successful poll
    pub observed: Option<ScanStatus>,
    /// Full record from the last successful poll
    pub record: Option<Value>,
    pub results: ResultsSnapshot,
    pub polls: u32,
}

impl Diagnostic {
    /// Diagnostic for a wait whose budget was spent before the first poll
    pub fn no_polls(job: JobRef, target: ScanStatus) -> Self {
        Self {
            job,
            target,
            observed: None,
            record: None,
            results: ResultsSnapshot::None,
            polls: 0,
        }
    }

    pub fn from_record(job: JobRef, target: ScanStatus, record: JobRecord, results: ResultsSnapshot, polls: u32) -> Self {
        Self {
            job,
            target,
            observed: record.status,
            record: Some(record.details),
            results,
            polls,
        }
    }

    pub fn timed_out_message(&self) -> String {
        let headline = format!(
            "scan job ID={} timed out waiting for state=\"{}\" after {} poll(s)",
            self.job, self.target, self.polls
        );
        self.render(&headline)
    }

    pub fn failed_message(&self) -> String {
        let headline = format!(
            "scan job ID={} failed instead of reaching state=\"{}\"",
            self.job, self.target
        );
        self.render(&headline)
    }

    fn render(&self, headline: &str) -> String {
        let observed = self.observed.as_ref().map(ScanStatus::as_str).unwrap_or("<none>");
        let record = self
            .record
            .as_ref()
            .map(pretty)
            .unwrap_or_else(|| "no polls attempted".to_string());
        let results = match &self.results {
            ResultsSnapshot::None => "none".to_string(),
            ResultsSnapshot::Available(v) => pretty(v),
            ResultsSnapshot::Unavailable(e) => format!("unavailable ({})", e),
        };

        let mut out = String::new();
        let _ = writeln!(out, "{}", headline);
        let _ = writeln!(out, "last observed state=\"{}\"", observed);
        let _ = writeln!(out, "full details of the scan job:\n{}", record);
        let _ = write!(out, "results available from the scan job:\n{}", results);
        out
    }
}
