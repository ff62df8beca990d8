//! Preparing scans over the HTTP API
//!
//! Credentials and sources are created on the server, then a scan over
//! them is described as a [`NewScan`]. Posting that scan queues its first
//! job under the same id, which is what the waiter polls. Every object
//! created is recorded in a [`Cleanup`] so a test can remove it afterwards.

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::config::{CredentialConfig, HarnessConfig, SourceConfig};
use crate::error::{HarnessError, HarnessResult};
use crate::source::SCAN_PATH;
use crate::status::JobRef;

pub const CREDENTIAL_PATH: &str = "credentials/";
pub const SOURCE_PATH: &str = "sources/";

pub const DEFAULT_SCAN_TYPE: &str = "inspect";

/// Address nothing answers on; scans of it never complete
pub const UNREACHABLE_HOST: &str = "1.0.0.0";

/// Server objects to delete once a test is done
#[derive(Debug, Default)]
pub struct Cleanup {
    endpoints: Vec<String>,
}

impl Cleanup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, endpoint: impl Into<String>) {
        self.endpoints.push(endpoint.into());
    }

    /// Endpoints recorded so far, oldest first
    pub fn endpoints(&self) -> &[String] {
        &self.endpoints
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Delete everything recorded, newest first, so scans go before the
    /// sources they use and sources before their credentials. Every delete
    /// is attempted and the first failure is returned.
    pub async fn run(&mut self, client: &ApiClient) -> HarnessResult<()> {
        let mut first_error = None;
        while let Some(endpoint) = self.endpoints.pop() {
            debug!("Deleting {}", endpoint);
            if let Err(e) = client.delete(&endpoint).await {
                warn!("Could not delete {}: {}", endpoint, e);
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewCredential {
    pub name: String,
    pub cred_type: String,
    pub username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ssh_keyfile: Option<String>,
}

impl NewCredential {
    /// A credential built from the config under a fresh name. A key file
    /// takes precedence over a password.
    pub fn from_config(cred: &CredentialConfig) -> HarnessResult<Self> {
        let username = cred
            .username
            .clone()
            .ok_or_else(|| HarnessError::InvalidConfig(format!("credential '{}' has no username", cred.name)))?;

        let (password, ssh_keyfile) = match &cred.sshkeyfile {
            Some(path) => (None, Some(path.display().to_string())),
            None => (cred.password.clone(), None),
        };

        Ok(Self {
            name: unique_name(),
            cred_type: cred.cred_type.clone(),
            username,
            password,
            ssh_keyfile,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewSource {
    pub name: String,
    pub source_type: String,
    pub hosts: Vec<String>,
    /// Server ids of the credentials to scan with
    pub credentials: Vec<u64>,
}

/// A scan ready to be posted
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewScan {
    pub name: String,
    /// Server ids of the sources to scan
    pub sources: Vec<u64>,
    pub scan_type: String,
}

impl NewScan {
    /// Post the scan and return the job the server queued for it
    pub async fn create(&self, client: &ApiClient, cleanup: &mut Cleanup) -> HarnessResult<JobRef> {
        let id = create(client, SCAN_PATH, self, cleanup).await?;
        Ok(JobRef::from(id))
    }
}

/// Create the credentials and source for a configured network source and
/// describe a scan over it.
///
/// Only credentials the source names and that are themselves of type
/// `network` are created.
pub async fn prep_network_scan(
    client: &ApiClient,
    config: &HarnessConfig,
    source: &SourceConfig,
    cleanup: &mut Cleanup,
    scan_type: &str,
) -> HarnessResult<NewScan> {
    if source.source_type != "network" {
        return Err(HarnessError::InvalidConfig(format!(
            "source '{}' has type '{}', expected 'network'",
            source.name, source.source_type
        )));
    }

    let mut credential_ids = Vec::new();
    for cred in config.credentials_for(source) {
        let payload = NewCredential::from_config(cred)?;
        credential_ids.push(create(client, CREDENTIAL_PATH, &payload, cleanup).await?);
    }

    let payload = NewSource {
        name: unique_name(),
        source_type: source.source_type.clone(),
        hosts: source.hosts.clone(),
        credentials: credential_ids,
    };
    let source_id = create(client, SOURCE_PATH, &payload, cleanup).await?;

    Ok(NewScan {
        name: unique_name(),
        sources: vec![source_id],
        scan_type: scan_type.to_string(),
    })
}

/// Create a source of `source_type` pointing at [`UNREACHABLE_HOST`] with a
/// dummy credential and describe a scan over it. The scan can be created
/// but will fail.
pub async fn prep_broken_scan(
    client: &ApiClient,
    source_type: &str,
    cleanup: &mut Cleanup,
    scan_type: &str,
) -> HarnessResult<NewScan> {
    let cred = NewCredential {
        name: unique_name(),
        cred_type: source_type.to_string(),
        username: "broken".to_string(),
        password: Some("broken".to_string()),
        ssh_keyfile: None,
    };
    let cred_id = create(client, CREDENTIAL_PATH, &cred, cleanup).await?;

    let source = NewSource {
        name: unique_name(),
        source_type: source_type.to_string(),
        hosts: vec![UNREACHABLE_HOST.to_string()],
        credentials: vec![cred_id],
    };
    let source_id = create(client, SOURCE_PATH, &source, cleanup).await?;

    Ok(NewScan {
        name: unique_name(),
        sources: vec![source_id],
        scan_type: scan_type.to_string(),
    })
}

/// POST `payload` to the collection at `path` and record the new object
async fn create<T: Serialize>(client: &ApiClient, path: &str, payload: &T, cleanup: &mut Cleanup) -> HarnessResult<u64> {
    let created: Value = client.post_json(path, payload).await?;
    let id = created
        .get("id")
        .and_then(Value::as_u64)
        .ok_or_else(|| HarnessError::UnexpectedOutput(format!("no id in response from {}: {}", path, created)))?;

    debug!("Created {}{}/", path, id);
    cleanup.push(format!("{}{}/", path, id));
    Ok(id)
}

fn unique_name() -> String {
    uuid::Uuid::new_v4().to_string()
}
