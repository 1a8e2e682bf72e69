//! Build metadata store
//!
//! Layout on disk:
//!
//! ```text
//! builds/
//!   builds.json
//!   <build id>/<arch>/meta.json
//! ```

mod index;
mod record;

pub use index::{BuildEntry, BuildIndex, BUILDS_FILE};
pub use record::{
    ArtifactEntry, BuildRecord, PublicationRecord, PublicationRecords, StagedWrite, COMMIT_KEY,
    IMAGES_KEY, META_FILE,
};

use crate::error::Result;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Loads build records from a builds directory
#[derive(Debug, Clone)]
pub struct BuildMetadataStore {
    builds_dir: PathBuf,
}

impl BuildMetadataStore {
    pub fn new(builds_dir: impl Into<PathBuf>) -> Self {
        Self {
            builds_dir: builds_dir.into(),
        }
    }

    pub fn builds_dir(&self) -> &Path {
        &self.builds_dir
    }

    pub fn index(&self) -> Result<BuildIndex> {
        BuildIndex::load(&self.builds_dir)
    }

    /// Directory of one (build, arch) record
    pub fn record_dir(&self, build_id: &str, arch: &str) -> PathBuf {
        self.builds_dir.join(build_id).join(arch)
    }

    pub fn load(&self, build_id: &str, arch: &str) -> Result<BuildRecord> {
        BuildRecord::load(build_id, arch, self.record_dir(build_id, arch))
    }

    /// Load one record per architecture, keyed by architecture
    pub fn load_all<S: AsRef<str>>(
        &self,
        build_id: &str,
        arches: &[S],
    ) -> Result<BTreeMap<String, BuildRecord>> {
        arches
            .iter()
            .map(|arch| {
                let arch = arch.as_ref();
                Ok((arch.to_string(), self.load(build_id, arch)?))
            })
            .collect()
    }
}
