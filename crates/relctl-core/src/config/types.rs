//! Configuration file types (`relctl.yaml`)

use crate::environment::SigningEnvironment;
use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

/// Default wait for the signing authority; its queue depth is unpredictable
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60 * 60;

/// Default message priority for signing requests
pub const DEFAULT_PRIORITY: u8 = 4;

/// Top-level `relctl.yaml` document
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelctlConfigFile {
    /// Directory containing `builds.json`
    pub builds_dir: Utf8PathBuf,
    pub registry: RegistryConfig,
    pub storage: StorageConfig,
    pub signing: SigningConfig,
    pub bus: BusConfig,
    pub commit_store: CommitStoreConfig,
}

impl Default for RelctlConfigFile {
    fn default() -> Self {
        Self {
            builds_dir: Utf8PathBuf::from("builds"),
            registry: RegistryConfig::default(),
            storage: StorageConfig::default(),
            signing: SigningConfig::default(),
            bus: BusConfig::default(),
            commit_store: CommitStoreConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Container auth file passed to skopeo/podman
    pub authfile: Option<Utf8PathBuf>,
    /// Push Docker v2s2 manifests instead of OCI
    pub legacy_format: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub bucket: Option<String>,
    /// Key prefix inside the bucket, e.g. `prod/streams/stable/builds`
    pub prefix: String,
    pub region: String,
    /// Custom S3-compatible endpoint
    pub endpoint: Option<String>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            prefix: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
        }
    }
}

impl StorageConfig {
    /// Object key for a build artifact
    pub fn artifact_key(&self, build_id: &str, arch: &str, relative: &str) -> String {
        let prefix = self.prefix.trim_matches('/');
        if prefix.is_empty() {
            format!("{}/{}/{}", build_id, arch, relative)
        } else {
            format!("{}/{}/{}/{}", prefix, build_id, arch, relative)
        }
    }

    /// Location of an object as sent to the signing authority
    pub fn object_location(&self, key: &str) -> String {
        match &self.bucket {
            Some(bucket) => format!("s3://{}/{}", bucket, key),
            None => key.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub environment: SigningEnvironment,
    pub request_timeout_secs: u64,
    pub priority: u8,
    /// Armored public key used to verify signatures
    pub gpg_key_path: Option<Utf8PathBuf>,
    /// Extra key/value pairs added to every request body
    pub extra: BTreeMap<String, String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            environment: SigningEnvironment::Production,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            priority: DEFAULT_PRIORITY,
            gpg_key_path: None,
            extra: BTreeMap::new(),
        }
    }
}

impl SigningConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// Which message bus adapter to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BusKind {
    /// Spool directory shared with an external relay
    #[default]
    Spool,
    /// In-process bus (embedding and tests)
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BusConfig {
    pub kind: BusKind,
    pub spool_dir: Utf8PathBuf,
    pub poll_interval_ms: u64,
    pub topic_prefix: String,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            kind: BusKind::Spool,
            spool_dir: Utf8PathBuf::from("tmp/bus"),
            poll_interval_ms: 2000,
            topic_prefix: "org.relctl".to_string(),
        }
    }
}

impl BusConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommitStoreConfig {
    /// Local commit repository
    pub repo: Utf8PathBuf,
}

impl Default for CommitStoreConfig {
    fn default() -> Self {
        Self {
            repo: Utf8PathBuf::from("tmp/repo"),
        }
    }
}
