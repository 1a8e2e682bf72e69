//! Per-(build, architecture) metadata record

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Metadata key holding the artifact-name → entry map
pub const IMAGES_KEY: &str = "images";

/// Metadata key holding the build's commit checksum
pub const COMMIT_KEY: &str = "ostree-commit";

/// File name of a build record inside `builds/<id>/<arch>/`
pub const META_FILE: &str = "meta.json";

/// One built artifact, relative to the record's directory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub path: String,
    pub size: u64,
    pub sha256: String,
    /// Fields this crate does not interpret, kept for round-tripping
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ArtifactEntry {
    pub fn new(path: impl Into<String>, size: u64, sha256: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            size,
            sha256: sha256.into(),
            extra: Map::new(),
        }
    }
}

/// Where an artifact was published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicationRecord {
    /// Registry repository, e.g. `quay.io/org/image`
    pub image: String,
    pub digest: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Publication records stored under a namespace key.
///
/// Existing metadata stores the first publication as a bare object and
/// only promotes it to a list once a second one is appended. Both shapes
/// must keep reading and writing the same way.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PublicationRecords {
    Single(PublicationRecord),
    Multiple(Vec<PublicationRecord>),
}

impl PublicationRecords {
    pub fn as_slice(&self) -> &[PublicationRecord] {
        match self {
            PublicationRecords::Single(record) => std::slice::from_ref(record),
            PublicationRecords::Multiple(records) => records,
        }
    }

    /// Most recent record for `repository`
    pub fn latest_for(&self, repository: &str) -> Option<&PublicationRecord> {
        self.as_slice()
            .iter()
            .rev()
            .find(|record| record.image == repository)
    }

    /// Append a record, promoting a bare record to a list
    pub fn push(self, record: PublicationRecord) -> Self {
        match self {
            PublicationRecords::Single(first) => PublicationRecords::Multiple(vec![first, record]),
            PublicationRecords::Multiple(mut records) => {
                records.push(record);
                PublicationRecords::Multiple(records)
            }
        }
    }
}

/// Build metadata for one (build id, architecture) pair.
///
/// The JSON document is kept whole so keys this crate does not know
/// survive a write-back.
#[derive(Debug, Clone)]
pub struct BuildRecord {
    build_id: String,
    arch: String,
    dir: PathBuf,
    doc: Map<String, Value>,
}

impl BuildRecord {
    /// Load `meta.json` from a record directory
    pub fn load(build_id: &str, arch: &str, dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        let path = dir.join(META_FILE);
        let content = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::configuration(format!(
                    "no metadata for build {} on {} (expected {})",
                    build_id,
                    arch,
                    path.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        let doc: Map<String, Value> = serde_json::from_str(&content)?;
        debug!("Loaded metadata {}", path.display());

        Ok(Self {
            build_id: build_id.to_string(),
            arch: arch.to_string(),
            dir,
            doc,
        })
    }

    /// Create a record from an in-memory document (not yet persisted)
    pub fn from_document(
        build_id: impl Into<String>,
        arch: impl Into<String>,
        dir: impl Into<PathBuf>,
        doc: Map<String, Value>,
    ) -> Self {
        Self {
            build_id: build_id.into(),
            arch: arch.into(),
            dir: dir.into(),
            doc,
        }
    }

    pub fn build_id(&self) -> &str {
        &self.build_id
    }

    pub fn arch(&self) -> &str {
        &self.arch
    }

    /// Directory holding `meta.json` and the build's artifacts
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn meta_path(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }

    /// Raw access to a top-level key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.doc.get(key)
    }

    /// Artifact entries keyed by artifact name; empty when none were built
    pub fn images(&self) -> Result<BTreeMap<String, ArtifactEntry>> {
        match self.doc.get(IMAGES_KEY) {
            Some(value) => Ok(serde_json::from_value(value.clone())?),
            None => Ok(BTreeMap::new()),
        }
    }

    pub fn image(&self, name: &str) -> Result<Option<ArtifactEntry>> {
        Ok(self.images()?.remove(name))
    }

    pub fn set_image(&mut self, name: &str, entry: ArtifactEntry) -> Result<()> {
        let images = self
            .doc
            .entry(IMAGES_KEY)
            .or_insert_with(|| Value::Object(Map::new()));
        let images = images.as_object_mut().ok_or_else(|| {
            Error::configuration(format!("'{}' in {} is not an object", IMAGES_KEY, self.build_id))
        })?;
        images.insert(name.to_string(), serde_json::to_value(entry)?);
        Ok(())
    }

    /// Absolute path of an artifact entry
    pub fn artifact_path(&self, entry: &ArtifactEntry) -> PathBuf {
        self.dir.join(&entry.path)
    }

    /// Commit checksum this build produced, if any
    pub fn ostree_commit(&self) -> Option<&str> {
        self.doc.get(COMMIT_KEY).and_then(Value::as_str)
    }

    pub fn publications(&self, namespace: &str) -> Result<Option<PublicationRecords>> {
        match self.doc.get(namespace) {
            Some(value) => Ok(Some(serde_json::from_value(value.clone())?)),
            None => Ok(None),
        }
    }

    /// Store a publication: bare on first write, appended afterwards
    pub fn record_publication(&mut self, namespace: &str, record: PublicationRecord) -> Result<()> {
        let updated = match self.publications(namespace)? {
            Some(existing) => existing.push(record),
            None => PublicationRecords::Single(record),
        };
        self.doc
            .insert(namespace.to_string(), serde_json::to_value(updated)?);
        Ok(())
    }

    /// Persist the top-level key `artifact_name`.
    ///
    /// The on-disk document is re-read and only that key is replaced, then
    /// the file is swapped in atomically.
    pub fn write_back(&self, artifact_name: &str) -> Result<()> {
        self.stage_write_back(artifact_name)?.commit()
    }

    /// Prepare [`write_back`](Self::write_back) without touching `meta.json`.
    ///
    /// The merged document is written to a temp file beside it; nothing is
    /// visible until [`StagedWrite::commit`]. Dropping the stage discards it.
    pub fn stage_write_back(&self, artifact_name: &str) -> Result<StagedWrite> {
        let path = self.meta_path();
        let mut on_disk: Map<String, Value> = match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => return Err(Error::Io(e)),
        };

        match self.doc.get(artifact_name) {
            Some(value) => {
                on_disk.insert(artifact_name.to_string(), value.clone());
            }
            None => {
                on_disk.remove(artifact_name);
            }
        }

        fs::create_dir_all(&self.dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, &on_disk)?;
        tmp.write_all(b"\n")?;
        tmp.as_file().sync_all()?;

        Ok(StagedWrite {
            tmp,
            path,
            label: format!("'{}' of build {} ({})", artifact_name, self.build_id, self.arch),
        })
    }
}

/// A `meta.json` update written aside, waiting to be swapped in
#[derive(Debug)]
pub struct StagedWrite {
    tmp: tempfile::NamedTempFile,
    path: PathBuf,
    label: String,
}

impl StagedWrite {
    pub fn commit(self) -> Result<()> {
        self.tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        debug!("Wrote {} to {}", self.label, self.path.display());
        Ok(())
    }
}
