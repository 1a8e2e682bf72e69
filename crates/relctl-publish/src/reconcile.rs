//! Digest reconciliation
//!
//! Decides from remote registry state and local build metadata whether a
//! multi-architecture publish is needed, and folds the digests of a fresh
//! push back into per-architecture metadata.
//!
//! The registry pushes a manifest list as a whole, so one stale
//! architecture forces the entire list to be re-pushed.

use crate::manifest::{ManifestList, RegistryDigestMap};
use crate::registry::ContainerRegistry;
use futures::future::try_join_all;
use relctl_core::checksum;
use relctl_core::{BuildRecord, Error, PublicationRecord, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;
use tracing::{debug, info};

/// Inputs of one reconciliation
#[derive(Debug, Clone)]
pub struct ReconcileRequest<'a> {
    /// Registry repository, e.g. `quay.io/org/os`
    pub repo: &'a str,
    /// Tags to publish; the first one is inspected
    pub tags: &'a [String],
    /// Architectures the caller asked for; empty means all of them
    pub requested_arches: &'a [String],
    /// Architectures the build produced
    pub build_arches: &'a [String],
    /// Key in `images` naming the artifact to publish
    pub artifact: &'a str,
    /// Metadata key holding publication records
    pub namespace: &'a str,
    /// Publish even when the registry already matches
    pub force: bool,
}

/// Architecture selection after validating the request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchSelection {
    pub arches: Vec<String>,
    /// Defaulted selection: arches without the artifact are skipped
    pub tolerate_missing: bool,
}

/// Outcome of [`DigestReconciler::plan`]
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcilePlan {
    /// Architectures that will make up the manifest list
    pub arches: Vec<String>,
    /// Image references aligned with `arches`
    pub images: Vec<String>,
    /// Architectures whose recorded digest is missing or stale
    pub stale: Vec<String>,
    pub needs_upload: bool,
    pub forced: bool,
}

impl ReconcilePlan {
    pub fn should_push(&self) -> bool {
        self.needs_upload || self.forced
    }
}

/// Validate requested architectures against the build's.
///
/// An empty request selects every architecture the build produced.
pub fn select_arches(requested: &[String], build_arches: &[String]) -> Result<ArchSelection> {
    if requested.is_empty() {
        return Ok(ArchSelection {
            arches: build_arches.to_vec(),
            tolerate_missing: true,
        });
    }

    for arch in requested {
        if !build_arches.contains(arch) {
            return Err(Error::configuration(format!(
                "requested architecture {} is not part of the build (built: {})",
                arch,
                build_arches.join(", ")
            )));
        }
    }

    Ok(ArchSelection {
        arches: requested.to_vec(),
        tolerate_missing: false,
    })
}

pub struct DigestReconciler<'r> {
    registry: &'r dyn ContainerRegistry,
}

impl<'r> DigestReconciler<'r> {
    pub fn new(registry: &'r dyn ContainerRegistry) -> Self {
        Self { registry }
    }

    /// Decide which architectures to publish and whether a push is needed.
    ///
    /// Every local check (architecture set, artifact presence, checksums)
    /// completes before the registry is contacted.
    pub async fn plan(
        &self,
        request: &ReconcileRequest<'_>,
        records: &BTreeMap<String, BuildRecord>,
    ) -> Result<ReconcilePlan> {
        let first_tag = request
            .tags
            .first()
            .ok_or_else(|| Error::configuration("at least one tag is required"))?;
        let selection = select_arches(request.requested_arches, request.build_arches)?;

        let mut arches = Vec::new();
        let mut artifacts = Vec::new();
        for arch in &selection.arches {
            let record = records.get(arch).ok_or_else(|| {
                Error::configuration(format!("no metadata loaded for architecture {}", arch))
            })?;

            match record.image(request.artifact)? {
                Some(entry) => {
                    artifacts.push((record.artifact_path(&entry), entry.sha256));
                    arches.push(arch.clone());
                }
                None if selection.tolerate_missing => {
                    info!(
                        "Skipping {}: build {} has no '{}' artifact",
                        arch,
                        record.build_id(),
                        request.artifact
                    );
                }
                None => {
                    return Err(Error::configuration(format!(
                        "build {} has no '{}' artifact for {}",
                        record.build_id(),
                        request.artifact,
                        arch
                    )));
                }
            }
        }

        if arches.is_empty() {
            return Err(Error::configuration(format!(
                "no architecture has a '{}' artifact to publish",
                request.artifact
            )));
        }

        verify_artifacts(&artifacts).await?;

        let images = artifacts
            .iter()
            .map(|(path, _)| format!("oci-archive:{}", path.display()))
            .collect();

        let remote = match self
            .registry
            .inspect_manifest_list(request.repo, first_tag)
            .await
        {
            Ok(list) => Some(list.digest_map()),
            Err(e) => {
                info!(
                    "No manifest list at {}:{} ({}); all architectures need upload",
                    request.repo, first_tag, e
                );
                None
            }
        };

        let mut stale = Vec::new();
        for arch in &arches {
            if arch_is_stale(request, &records[arch], remote.as_ref())? {
                stale.push(arch.clone());
            }
        }

        let needs_upload = !stale.is_empty();
        if needs_upload {
            info!("Upload needed for: {}", stale.join(", "));
        } else {
            info!(
                "Registry digests at {}:{} match metadata for all architectures",
                request.repo, first_tag
            );
        }

        Ok(ReconcilePlan {
            arches,
            images,
            stale,
            needs_upload,
            forced: request.force,
        })
    }
}

fn arch_is_stale(
    request: &ReconcileRequest<'_>,
    record: &BuildRecord,
    remote: Option<&RegistryDigestMap>,
) -> Result<bool> {
    let arch = record.arch();
    let Some(remote) = remote else {
        return Ok(true);
    };

    let recorded = record
        .publications(request.namespace)?
        .and_then(|records| records.latest_for(request.repo).cloned());
    let Some(recorded) = recorded else {
        debug!("{}: never published to {}", arch, request.repo);
        return Ok(true);
    };

    match remote.get(arch) {
        Some(digest) if digest == recorded.digest => Ok(false),
        Some(digest) => {
            debug!(
                "{}: registry has {}, metadata records {}",
                arch, digest, recorded.digest
            );
            Ok(true)
        }
        None => {
            debug!("{}: missing from remote manifest list", arch);
            Ok(true)
        }
    }
}

/// Check every artifact's existence and checksum.
///
/// Checks are independent and read-only, so they run concurrently on the
/// blocking pool.
async fn verify_artifacts(artifacts: &[(PathBuf, String)]) -> Result<()> {
    let checks = artifacts.iter().cloned().map(|(path, sha256)| async move {
        tokio::task::spawn_blocking(move || checksum::verify_file(&path, &sha256))
            .await
            .map_err(|e| Error::integrity(format!("checksum task failed: {}", e)))?
    });
    try_join_all(checks).await?;
    Ok(())
}

/// Record the digests of a freshly pushed manifest list.
///
/// The pushed architectures must be exactly the ones that were published;
/// anything else means the registry and this tool disagree about what was
/// pushed, and nothing is written. Records are staged for every
/// architecture before the first one is replaced on disk.
pub fn apply_published(
    arches: &[String],
    pushed: &ManifestList,
    records: &mut BTreeMap<String, BuildRecord>,
    repo: &str,
    tags: &[String],
    namespace: &str,
) -> Result<Vec<(String, String)>> {
    let digests = pushed.digest_map();

    let pushed_set: BTreeSet<&str> = digests.arches().collect();
    let expected_set: BTreeSet<&str> = arches.iter().map(String::as_str).collect();
    if pushed_set != expected_set {
        return Err(Error::remote_protocol(format!(
            "pushed manifest list covers [{}] but [{}] were published",
            pushed_set.into_iter().collect::<Vec<_>>().join(", "),
            expected_set.into_iter().collect::<Vec<_>>().join(", ")
        )));
    }

    let mut written = Vec::with_capacity(arches.len());
    let mut staged = Vec::with_capacity(arches.len());
    for arch in arches {
        let record = records.get_mut(arch).ok_or_else(|| {
            Error::configuration(format!("no metadata loaded for architecture {}", arch))
        })?;
        // Present: the set comparison above covers every arch
        let digest = digests.get(arch).unwrap_or_default().to_string();

        record.record_publication(
            namespace,
            PublicationRecord {
                image: repo.to_string(),
                digest: digest.clone(),
                tags: tags.to_vec(),
            },
        )?;
        staged.push(record.stage_write_back(namespace)?);
        written.push((arch.clone(), digest));
    }

    // Every record is merged and written aside before any meta.json changes;
    // only a failing rename below can leave some arches updated.
    for write in staged {
        write.commit()?;
    }
    for (arch, digest) in &written {
        info!("Recorded {}@{} for {}", repo, digest, arch);
    }

    Ok(written)
}
