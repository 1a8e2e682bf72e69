//! In-memory container registry
//!
//! Pushed manifest lists are kept per `repo:tag`, so an inspect after a
//! push sees what was pushed, like a real registry.

use async_trait::async_trait;
use relctl_core::arch;
use relctl_core::{Error, Result};
use relctl_publish::{
    ContainerRegistry, ManifestDescriptor, ManifestList, Platform, PublishedManifest,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct State {
    lists: HashMap<String, ManifestList>,
    inspect_calls: usize,
    pushes: Vec<Vec<String>>,
    /// Digest suffix bumped on every push so re-pushes change digests
    generation: usize,
    /// Arch dropped from the next pushed list
    drop_on_push: Option<String>,
}

#[derive(Clone, Default)]
pub struct MockRegistry {
    state: Arc<Mutex<State>>,
}

impl MockRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `repo:tag` with a list of (registry arch, digest) entries
    pub fn seed(&self, repo: &str, tag: &str, entries: &[(&str, &str)]) {
        let list = manifest_list(
            entries
                .iter()
                .map(|(a, d)| (a.to_string(), d.to_string()))
                .collect(),
        );
        self.state
            .lock()
            .unwrap()
            .lists
            .insert(format!("{}:{}", repo, tag), list);
    }

    /// Make the next push silently lose an architecture
    pub fn drop_arch_on_push(&self, arch: &str) {
        self.state.lock().unwrap().drop_on_push = Some(arch.to_string());
    }

    pub fn inspect_calls(&self) -> usize {
        self.state.lock().unwrap().inspect_calls
    }

    pub fn push_count(&self) -> usize {
        self.state.lock().unwrap().pushes.len()
    }

    /// Image references of every push, in order
    pub fn pushes(&self) -> Vec<Vec<String>> {
        self.state.lock().unwrap().pushes.clone()
    }

    /// Current digest stored for `repo:tag` and a canonical arch
    pub fn digest(&self, repo: &str, tag: &str, canonical_arch: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .lists
            .get(&format!("{}:{}", repo, tag))
            .and_then(|l| l.digest_map().get(canonical_arch).map(str::to_string))
    }
}

pub fn manifest_list(entries: Vec<(String, String)>) -> ManifestList {
    ManifestList {
        schema_version: Some(2),
        media_type: Some("application/vnd.oci.image.index.v1+json".to_string()),
        manifests: entries
            .into_iter()
            .map(|(architecture, digest)| ManifestDescriptor {
                media_type: Some("application/vnd.oci.image.manifest.v1+json".to_string()),
                digest,
                size: Some(1024),
                platform: Some(Platform {
                    architecture,
                    os: Some("linux".to_string()),
                    variant: None,
                }),
            })
            .collect(),
    }
}

/// Architecture directory an `oci-archive:` reference points into
fn arch_of(image: &str) -> String {
    let path = Path::new(image.trim_start_matches("oci-archive:"));
    path.parent()
        .and_then(Path::file_name)
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

#[async_trait]
impl ContainerRegistry for MockRegistry {
    async fn inspect_manifest_list(&self, repo: &str, tag: &str) -> Result<ManifestList> {
        let mut state = self.state.lock().unwrap();
        state.inspect_calls += 1;
        state
            .lists
            .get(&format!("{}:{}", repo, tag))
            .cloned()
            .ok_or_else(|| Error::tool("skopeo", "manifest unknown"))
    }

    async fn push_manifest_list(
        &self,
        repo: &str,
        tags: &[String],
        images: &[String],
        _legacy_format: bool,
    ) -> Result<PublishedManifest> {
        let mut state = self.state.lock().unwrap();
        state.generation += 1;
        let generation = state.generation;
        let dropped = state.drop_on_push.take();

        let entries = images
            .iter()
            .map(|image| arch_of(image))
            .filter(|a| Some(a) != dropped.as_ref())
            .map(|a| {
                let digest = format!("sha256:{}-{}", a, generation);
                (arch::to_registry(&a).to_string(), digest)
            })
            .collect();
        let list = manifest_list(entries);

        for tag in tags {
            state.lists.insert(format!("{}:{}", repo, tag), list.clone());
        }
        state.pushes.push(images.to_vec());

        Ok(PublishedManifest {
            list,
            digest: Some(format!("sha256:list-{}", generation)),
        })
    }
}
