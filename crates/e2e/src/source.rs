//! Status sources: where the waiter reads scan job state from

use async_trait::async_trait;
use serde_json::Value;

use crate::api::ApiClient;
use crate::error::HarnessResult;
use crate::qpc::QpcCli;
use crate::status::{JobRecord, JobRef};

/// Read-only view of scan jobs on the server.
///
/// Errors returned here are transport problems (connection refused, bad
/// JSON, a CLI that exited badly). The waiter passes them through as-is.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Current state of `job`
    async fn fetch_status(&self, job: &JobRef) -> HarnessResult<JobRecord>;

    /// Results gathered so far by `job`, used only in failure messages.
    /// `None` when the binding has no way to fetch them.
    async fn fetch_results(&self, _job: &JobRef) -> HarnessResult<Option<Value>> {
        Ok(None)
    }
}

/// Scan endpoint, relative to the API root
pub const SCAN_PATH: &str = "scans/";

/// Reads scan jobs over the HTTP API
#[derive(Debug, Clone)]
pub struct ApiStatusSource {
    client: ApiClient,
}

impl ApiStatusSource {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }
}

#[async_trait]
impl StatusSource for ApiStatusSource {
    async fn fetch_status(&self, job: &JobRef) -> HarnessResult<JobRecord> {
        let details: Value = self.client.get_json(&format!("{}{}/", SCAN_PATH, job)).await?;
        Ok(JobRecord::from_value(details))
    }

    async fn fetch_results(&self, job: &JobRef) -> HarnessResult<Option<Value>> {
        let results = self
            .client
            .get_json(&format!("{}{}/results/", SCAN_PATH, job))
            .await?;
        Ok(Some(results))
    }
}

/// Reads scan jobs by running `qpc scan job --id <id>`
#[derive(Debug, Clone, Default)]
pub struct CliStatusSource {
    cli: QpcCli,
}

impl CliStatusSource {
    pub fn new(cli: QpcCli) -> Self {
        Self { cli }
    }
}

#[async_trait]
impl StatusSource for CliStatusSource {
    async fn fetch_status(&self, job: &JobRef) -> HarnessResult<JobRecord> {
        self.cli.scan_job(job).await
    }
}
