//! Error types for the scan harness

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HarnessError {
    /// The wait budget ran out before the scan job reached the target state.
    #[error("{message}")]
    WaitTimeout { message: String },

    /// The scan job reported `failed` while a different state was awaited.
    #[error("{message}")]
    ScanFailed { message: String },

    #[error("Config file not found: {0}")]
    ConfigNotFound(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Base URL not found: {0}")]
    BaseUrlNotFound(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("`{command}` exited with {code:?}:\n{output}")]
    CliFailed {
        command: String,
        code: Option<i32>,
        output: String,
    },

    #[error("Unexpected output: {0}")]
    UnexpectedOutput(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl HarnessError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, HarnessError::WaitTimeout { .. })
    }

    pub fn is_scan_failure(&self) -> bool {
        matches!(self, HarnessError::ScanFailed { .. })
    }
}

pub type HarnessResult<T> = Result<T, HarnessError>;
