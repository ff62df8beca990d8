//! End-to-end harness for the quipucords scan server
//!
//! This crate drives the server through its HTTP API and through the `qpc`
//! command-line client, and observes asynchronous scan jobs until they
//! settle:
//! - Polls a scan job until it reaches a target state, fails, or times out
//! - Reads job state over the API or by running `qpc scan job`
//! - Builds failure messages that embed the full job record
//! - Creates credentials, sources and scans over the API for tests
//! - Loads credentials, sources and server location from a YAML config
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │  Waiter                                                     │
//! │    └── wait(WaitRequest, &dyn StatusSource) -> WaitOutcome  │
//! │          Reached(status) | Failed(diag) | TimedOut(diag)    │
//! ├─────────────────────────────────────────────────────────────┤
//! │  StatusSource                                               │
//! │    ├── ApiStatusSource  ── ApiClient  ── GET scans/<id>/    │
//! │    └── CliStatusSource  ── QpcCli     ── qpc scan job       │
//! ├─────────────────────────────────────────────────────────────┤
//! │  HarnessConfig (YAML)                                       │
//! │    ├── qcs { hostname, port, token, sources: [Source] }     │
//! │    ├── credentials: [Credential]                            │
//! │    └── waiter { timeout_secs, interval_secs }               │
//! └─────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod diagnostic;
pub mod error;
pub mod prep;
pub mod qpc;
pub mod source;
pub mod status;
pub mod waiter;

pub use config::HarnessConfig;
pub use error::{HarnessError, HarnessResult};
pub use source::{ApiStatusSource, CliStatusSource, StatusSource};
pub use status::{JobRecord, JobRef, ScanStatus};
pub use waiter::{wait_for_state, WaitOutcome, WaitRequest, Waiter};
