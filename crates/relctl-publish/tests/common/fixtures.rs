//! On-disk build tree fixtures

use relctl_core::checksum;
use relctl_core::meta::{BuildRecord, META_FILE};
use relctl_core::BuildMetadataStore;
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

pub const BUILD_ID: &str = "42.20260101.0";
pub const OSTREE: &str = "ostree";
pub const NAMESPACE: &str = "base-oscontainer";
pub const REPO: &str = "quay.io/example/os";

/// A `builds/` directory in a temp dir
pub struct BuildTree {
    _tmp: TempDir,
    root: PathBuf,
}

impl BuildTree {
    /// Create `builds.json` listing one build with `arches`
    pub fn new(arches: &[&str]) -> Self {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("builds");
        fs::create_dir_all(&root).unwrap();

        let index = json!({
            "schema-version": "1.0.0",
            "builds": [{ "id": BUILD_ID, "arches": arches }],
        });
        fs::write(root.join("builds.json"), index.to_string()).unwrap();

        for arch in arches {
            let dir = root.join(BUILD_ID).join(arch);
            fs::create_dir_all(&dir).unwrap();
            let meta = json!({ "buildid": BUILD_ID, "coreos-assembler.basearch": arch });
            write_meta(&dir, &meta);
        }

        Self { _tmp: tmp, root }
    }

    pub fn store(&self) -> BuildMetadataStore {
        BuildMetadataStore::new(&self.root)
    }

    pub fn arch_dir(&self, arch: &str) -> PathBuf {
        self.root.join(BUILD_ID).join(arch)
    }

    /// Write an artifact file and register it with its real checksum
    pub fn add_artifact(&self, arch: &str, name: &str, content: &str) -> PathBuf {
        let file = format!("os-{}-{}.ociarchive", BUILD_ID, arch);
        let path = self.arch_dir(arch).join(&file);
        fs::write(&path, content).unwrap();
        let sha256 = checksum::sha256_file(&path).unwrap();
        self.set_image(arch, name, &file, content.len() as u64, &sha256);
        path
    }

    /// Register an artifact entry without touching the artifact file
    pub fn set_image(&self, arch: &str, name: &str, file: &str, size: u64, sha256: &str) {
        let mut meta = self.meta(arch);
        let images = meta
            .as_object_mut()
            .unwrap()
            .entry("images")
            .or_insert_with(|| json!({}));
        images[name] = json!({ "path": file, "size": size, "sha256": sha256 });
        write_meta(&self.arch_dir(arch), &meta);
    }

    /// Raw `meta.json` for an architecture
    pub fn meta(&self, arch: &str) -> Value {
        let content = fs::read_to_string(self.arch_dir(arch).join(META_FILE)).unwrap();
        serde_json::from_str(&content).unwrap()
    }

    pub fn record(&self, arch: &str) -> BuildRecord {
        self.store().load(BUILD_ID, arch).unwrap()
    }
}

fn write_meta(dir: &Path, meta: &Value) {
    fs::write(
        dir.join(META_FILE),
        serde_json::to_string_pretty(meta).unwrap(),
    )
    .unwrap();
}

pub fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
