//! Build tree fixtures for signing tests

#![allow(dead_code)]

use relctl_core::checksum;
use relctl_core::config::StorageConfig;
use relctl_core::meta::META_FILE;
use relctl_core::{BuildRecord, SigningEnvironment};
use relctl_sign::{SigningContext, SigningProtocol};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const BUILD_ID: &str = "42.20260101.0";
pub const ARCH: &str = "x86_64";
pub const COMMIT: &str = "3f6e8a0f9d1c2b4a";
pub const PREFIX: &str = "prod/builds";
pub const OSTREE: &str = "ostree";
pub const NAMESPACE: &str = "base-oscontainer";

/// One build record with an ostree archive and a disk image
pub struct SignFixture {
    _tmp: TempDir,
    pub record_dir: PathBuf,
    pub objects_dir: PathBuf,
    pub public_key: PathBuf,
}

impl SignFixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let record_dir = tmp.path().join("builds").join(BUILD_ID).join(ARCH);
        let objects_dir = tmp.path().join("repo-objects");
        fs::create_dir_all(&record_dir).unwrap();
        fs::create_dir_all(&objects_dir).unwrap();

        fs::write(objects_dir.join(format!("{}.commit", COMMIT)), "commit object").unwrap();

        let public_key = tmp.path().join("release-key.asc");
        fs::write(&public_key, "-----BEGIN PGP PUBLIC KEY BLOCK-----").unwrap();

        let ostree = write_artifact(&record_dir, "os.ociarchive", "oci archive");
        let qemu = write_artifact(&record_dir, "os.qcow2", "disk image");
        let meta = json!({
            "buildid": BUILD_ID,
            "ostree-commit": COMMIT,
            "images": { "ostree": ostree, "qemu": qemu },
            "base-oscontainer": {
                "image": "quay.io/example/os",
                "digest": "sha256:published",
                "tags": ["stable"],
            },
        });
        fs::write(
            record_dir.join(META_FILE),
            serde_json::to_string_pretty(&meta).unwrap(),
        )
        .unwrap();

        Self {
            _tmp: tmp,
            record_dir,
            objects_dir,
            public_key,
        }
    }

    pub fn record(&self) -> BuildRecord {
        BuildRecord::load(BUILD_ID, ARCH, &self.record_dir).unwrap()
    }

    pub fn meta(&self) -> Value {
        let content = fs::read_to_string(self.record_dir.join(META_FILE)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    pub fn artifact(&self, file: &str) -> PathBuf {
        self.record_dir.join(file)
    }

    /// Object key of a file in the record directory
    pub fn key(&self, file: &str) -> String {
        format!("{}/{}/{}/{}", PREFIX, BUILD_ID, ARCH, file)
    }
}

fn write_artifact(dir: &Path, file: &str, content: &str) -> Value {
    let path = dir.join(file);
    fs::write(&path, content).unwrap();
    json!({
        "path": file,
        "size": content.len(),
        "sha256": checksum::sha256_file(&path).unwrap(),
    })
}

pub fn storage() -> StorageConfig {
    StorageConfig {
        prefix: PREFIX.to_string(),
        ..StorageConfig::default()
    }
}

pub fn context<'a>(
    protocol: &'a SigningProtocol<'a>,
    store: &'a dyn relctl_sign::ObjectStore,
    storage: &'a StorageConfig,
    environment: SigningEnvironment,
    public_key: &Path,
) -> SigningContext<'a> {
    SigningContext {
        protocol,
        store,
        storage,
        environment,
        public_key: public_key.to_path_buf(),
        extra: BTreeMap::new(),
        priority: 4,
    }
}
