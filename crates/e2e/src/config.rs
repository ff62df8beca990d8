//! Harness configuration
//!
//! Loaded once from YAML and passed explicitly to whatever needs it: the API
//! client reads the server hostname, lifecycle tests read credentials and
//! sources, the waiter reads its default budget.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{HarnessError, HarnessResult};

/// Environment variable pointing straight at a config file
pub const CONFIG_ENV: &str = "CAMAYOC_CONFIG";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Scan server section. Absent means the base URL must be given explicitly.
    #[serde(default)]
    pub qcs: Option<QcsConfig>,

    #[serde(default)]
    pub credentials: Vec<CredentialConfig>,

    #[serde(default)]
    pub waiter: WaiterConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QcsConfig {
    /// Base URL including scheme, e.g. `https://qpc.example.com:9443`
    #[serde(default)]
    pub hostname: Option<String>,

    /// Port handed to `qpc server config`
    #[serde(default)]
    pub port: Option<u16>,

    /// Verify the server certificate
    #[serde(default = "default_true")]
    pub ssl_verify: bool,

    /// API token sent as `Authorization: Token <token>`
    #[serde(default)]
    pub token: Option<String>,

    /// Per-request timeout for the HTTP client
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    #[serde(default)]
    pub sources: Vec<SourceConfig>,
}

impl Default for QcsConfig {
    fn default() -> Self {
        Self {
            hostname: None,
            port: None,
            ssl_verify: true,
            token: None,
            request_timeout_secs: default_request_timeout(),
            sources: Vec::new(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_request_timeout() -> u64 {
    30
}

/// A source to scan, referencing credentials by name
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub source_type: String,

    #[serde(default)]
    pub hosts: Vec<String>,

    /// Names of entries in the top-level `credentials` list
    #[serde(default)]
    pub credentials: Vec<String>,

    /// Extra `qpc source add` options, passed through untouched
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialConfig {
    pub name: String,

    #[serde(rename = "type")]
    pub cred_type: String,

    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub password: Option<String>,

    #[serde(default)]
    pub sshkeyfile: Option<PathBuf>,

    #[serde(default, rename = "become-password")]
    pub become_password: Option<String>,
}

/// Default budget and cadence for scan waits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaiterConfig {
    #[serde(default = "default_wait_timeout")]
    pub timeout_secs: u64,

    #[serde(default = "default_poll_interval")]
    pub interval_secs: u64,
}

impl Default for WaiterConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_wait_timeout(),
            interval_secs: default_poll_interval(),
        }
    }
}

fn default_wait_timeout() -> u64 {
    120
}

fn default_poll_interval() -> u64 {
    5
}

impl WaiterConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

impl HarnessConfig {
    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> HarnessResult<Self> {
        serde_yaml::from_str(yaml).map_err(HarnessError::from)
    }

    /// Load configuration from a file; a missing file is an error
    pub fn load(path: &Path) -> HarnessResult<Self> {
        if !path.exists() {
            return Err(HarnessError::ConfigNotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Load from [`default_config_path`]
    pub fn load_default() -> HarnessResult<Self> {
        Self::load(&default_config_path())
    }

    /// All sources of type `network`; empty when none are configured
    pub fn network_sources(&self) -> Vec<&SourceConfig> {
        self.sources()
            .iter()
            .filter(|s| s.source_type == "network")
            .collect()
    }

    /// The first configured network source, or a `localhost` source
    /// scanned with the `root` credential when none is configured.
    pub fn first_network_source(&self) -> SourceConfig {
        self.network_sources()
            .into_iter()
            .next()
            .cloned()
            .unwrap_or_else(|| SourceConfig {
                name: "localhost".to_string(),
                source_type: "network".to_string(),
                hosts: vec!["localhost".to_string()],
                credentials: vec!["root".to_string()],
                options: BTreeMap::new(),
            })
    }

    pub fn sources(&self) -> &[SourceConfig] {
        self.qcs.as_ref().map(|q| q.sources.as_slice()).unwrap_or(&[])
    }

    /// Credentials referenced by `source` that match its type
    pub fn credentials_for<'a>(&'a self, source: &SourceConfig) -> Vec<&'a CredentialConfig> {
        self.credentials
            .iter()
            .filter(|c| source.credentials.contains(&c.name) && c.cred_type == source.source_type)
            .collect()
    }
}

/// `$CAMAYOC_CONFIG`, else `$XDG_CONFIG_HOME/camayoc/config.yaml`, else
/// `$HOME/.config/camayoc/config.yaml`
pub fn default_config_path() -> PathBuf {
    if let Some(path) = std::env::var_os(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    dirs::config_dir().join("camayoc").join("config.yaml")
}

mod dirs {
    use std::path::PathBuf;

    pub fn config_dir() -> PathBuf {
        std::env::var_os("XDG_CONFIG_HOME")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                std::env::var_os("HOME")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".config")
            })
    }
}
