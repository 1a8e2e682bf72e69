//! Manifest list types as returned by `skopeo inspect --raw`

use relctl_core::arch;
use relctl_core::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Architecture value registries use for non-image entries (attestations)
const UNKNOWN_ARCH: &str = "unknown";

/// Multi-architecture manifest list (OCI index or Docker v2s2 list)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestList {
    #[serde(default)]
    pub schema_version: Option<i32>,
    #[serde(default)]
    pub media_type: Option<String>,
    #[serde(default)]
    pub manifests: Vec<ManifestDescriptor>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestDescriptor {
    #[serde(default)]
    pub media_type: Option<String>,
    pub digest: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub platform: Option<Platform>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Platform {
    pub architecture: String,
    #[serde(default)]
    pub os: Option<String>,
    #[serde(default)]
    pub variant: Option<String>,
}

impl ManifestList {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Per-architecture digests keyed by canonical architecture name
    pub fn digest_map(&self) -> RegistryDigestMap {
        let mut digests = BTreeMap::new();

        for descriptor in &self.manifests {
            let Some(platform) = &descriptor.platform else {
                continue;
            };
            if platform.architecture == UNKNOWN_ARCH {
                continue;
            }

            let canonical = arch::normalize(&platform.architecture).to_string();
            if let Some(previous) = digests.insert(canonical.clone(), descriptor.digest.clone()) {
                // Two entries collapsed onto one canonical name. Left as-is
                // (later entry wins); surfaced so an operator can look.
                warn!(
                    "Manifest list has more than one entry for {} ({} replaced by {} from '{}')",
                    canonical, previous, descriptor.digest, platform.architecture
                );
            }
        }

        RegistryDigestMap(digests)
    }
}

/// Canonical architecture → digest, derived from a remote manifest list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryDigestMap(BTreeMap<String, String>);

impl RegistryDigestMap {
    pub fn get(&self, arch: &str) -> Option<&str> {
        self.0.get(arch).map(String::as_str)
    }

    pub fn arches(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
