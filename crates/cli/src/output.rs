//! Output formatting for qpc-wait

use clap::ValueEnum;
use serde::Serialize;
use serde_json::json;

use qpc_e2e::{JobRecord, JobRef, WaitOutcome};

/// Output format
#[derive(Debug, Clone, Copy, ValueEnum, Default)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Plain,
    /// JSON format
    Json,
}

/// Print how a wait ended
pub fn print_outcome(job: &JobRef, outcome: &WaitOutcome, format: OutputFormat) {
    match format {
        OutputFormat::Plain => match outcome {
            WaitOutcome::Reached(status) => {
                print_success(&format!("Scan job {} reached state \"{}\"", job, status));
            }
            WaitOutcome::Failed(diag) => print_error(&diag.failed_message()),
            WaitOutcome::TimedOut(diag) => print_error(&diag.timed_out_message()),
        },
        OutputFormat::Json => {
            let value = match outcome {
                WaitOutcome::Reached(status) => json!({
                    "job": job,
                    "outcome": "reached",
                    "status": status,
                }),
                WaitOutcome::Failed(diag) => json!({
                    "job": job,
                    "outcome": "failed",
                    "status": diag.observed,
                    "details": diag.record,
                    "message": diag.failed_message(),
                }),
                WaitOutcome::TimedOut(diag) => json!({
                    "job": job,
                    "outcome": "timed_out",
                    "status": diag.observed,
                    "details": diag.record,
                    "message": diag.timed_out_message(),
                }),
            };
            print_json(&value);
        }
    }
}

/// Print a single job record
pub fn print_record(job: &JobRef, record: &JobRecord, format: OutputFormat) {
    match format {
        OutputFormat::Plain => {
            let status = record.status.as_ref().map(|s| s.as_str()).unwrap_or("<none>");
            println!("Scan job {}: {}", job, status);
            println!("{}", record.pretty());
        }
        OutputFormat::Json => print_json(&record.details),
    }
}

fn print_json<T: Serialize>(value: &T) {
    println!("{}", serde_json::to_string_pretty(value).unwrap_or_default());
}

/// Print success message
pub fn print_success(message: &str) {
    println!("✅ {}", message);
}

/// Print error message
pub fn print_error(message: &str) {
    eprintln!("❌ {}", message);
}
