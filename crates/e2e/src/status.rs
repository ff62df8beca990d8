//! Scan job identifiers, status vocabulary and observed job records

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reference to a scan job on the remote server.
///
/// The server hands out integers over the API and the CLI prints them as
/// strings, so the reference is kept as its textual form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobRef(String);

impl JobRef {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for JobRef {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for JobRef {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<u64> for JobRef {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Status of a scan job as reported by the server.
///
/// The vocabulary belongs to the server. Values this harness does not know
/// are kept verbatim in [`ScanStatus::Other`] and compare by their wire
/// string, so a new server state never breaks parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ScanStatus {
    Created,
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Canceled,
    Other(String),
}

impl ScanStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ScanStatus::Created => "created",
            ScanStatus::Pending => "pending",
            ScanStatus::Running => "running",
            ScanStatus::Paused => "paused",
            ScanStatus::Completed => "completed",
            ScanStatus::Failed => "failed",
            ScanStatus::Canceled => "canceled",
            ScanStatus::Other(s) => s,
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, ScanStatus::Failed)
    }
}

impl From<&str> for ScanStatus {
    fn from(s: &str) -> Self {
        match s {
            "created" => ScanStatus::Created,
            "pending" => ScanStatus::Pending,
            "running" => ScanStatus::Running,
            "paused" => ScanStatus::Paused,
            "completed" => ScanStatus::Completed,
            "failed" => ScanStatus::Failed,
            "canceled" => ScanStatus::Canceled,
            other => ScanStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for ScanStatus {
    fn from(s: String) -> Self {
        ScanStatus::from(s.as_str())
    }
}

impl From<ScanStatus> for String {
    fn from(status: ScanStatus) -> Self {
        status.as_str().to_string()
    }
}

impl FromStr for ScanStatus {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(ScanStatus::from(s))
    }
}

impl fmt::Display for ScanStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One observation of a scan job: its status plus the full payload the
/// server returned, kept for failure diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct JobRecord {
    /// `None` while the server has not assigned a status yet.
    pub status: Option<ScanStatus>,
    pub details: Value,
}

impl JobRecord {
    pub fn from_value(details: Value) -> Self {
        let status = details
            .get("status")
            .and_then(Value::as_str)
            .map(ScanStatus::from);
        Self { status, details }
    }

    /// Whether the observed status equals `target`. A job with no status yet
    /// never matches.
    pub fn is(&self, target: &ScanStatus) -> bool {
        self.status.as_ref() == Some(target)
    }

    /// Report produced by a completed job, as text whether the server sent
    /// a number or a string
    pub fn report_id(&self) -> Option<String> {
        match self.details.get("report_id")? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    pub fn pretty(&self) -> String {
        pretty(&self.details)
    }
}

pub(crate) fn pretty(value: &Value) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
}
