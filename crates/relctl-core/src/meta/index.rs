//! `builds.json` index of known builds

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const BUILDS_FILE: &str = "builds.json";

/// A build and the architectures it produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildEntry {
    pub id: String,
    #[serde(default)]
    pub arches: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildIndex {
    #[serde(rename = "schema-version", default)]
    pub schema_version: Option<String>,
    #[serde(default)]
    pub builds: Vec<BuildEntry>,
}

impl BuildIndex {
    /// Load `builds.json` from the builds directory
    pub fn load(builds_dir: &Path) -> Result<Self> {
        let path = builds_dir.join(BUILDS_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::configuration(format!("no build index at {}", path.display()))
            } else {
                Error::Io(e)
            }
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Newest build (first entry)
    pub fn latest(&self) -> Option<&BuildEntry> {
        self.builds.first()
    }

    pub fn get(&self, id: &str) -> Option<&BuildEntry> {
        self.builds.iter().find(|b| b.id == id)
    }

    /// Resolve a build id, where `None` or `"latest"` means the newest build
    pub fn resolve(&self, id: Option<&str>) -> Result<&BuildEntry> {
        match id {
            None | Some("latest") => self
                .latest()
                .ok_or_else(|| Error::configuration("build index is empty")),
            Some(id) => self
                .get(id)
                .ok_or_else(|| Error::configuration(format!("unknown build: {}", id))),
        }
    }

    /// Architectures produced by `id`
    pub fn arches_for(&self, id: &str) -> Result<&[String]> {
        Ok(&self.resolve(Some(id))?.arches)
    }
}
