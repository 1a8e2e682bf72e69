use crate::reconcile::{apply_published, select_arches, DigestReconciler, ReconcileRequest};
use crate::registry::{ContainerRegistry, PublishedManifest};
use relctl_core::{BuildMetadataStore, Error, Result};
use std::fs;
use std::path::PathBuf;
use tracing::{info, warn};

/// Pushes multi-architecture manifest lists
pub struct ManifestPublisher<'r> {
    registry: &'r dyn ContainerRegistry,
}

impl<'r> ManifestPublisher<'r> {
    pub fn new(registry: &'r dyn ContainerRegistry) -> Self {
        Self { registry }
    }

    /// Push `images` as one manifest list under every tag.
    ///
    /// Legacy (v2s2) pushes rewrite the per-architecture manifests, so the
    /// final digests come from a follow-up inspect rather than the push.
    pub async fn push(
        &self,
        repo: &str,
        tags: &[String],
        images: &[String],
        legacy_format: bool,
    ) -> Result<PublishedManifest> {
        let first_tag = tags
            .first()
            .ok_or_else(|| Error::configuration("at least one tag is required"))?;

        let pushed = self
            .registry
            .push_manifest_list(repo, tags, images, legacy_format)
            .await?;

        if !legacy_format {
            return Ok(pushed);
        }

        let list = self.registry.inspect_manifest_list(repo, first_tag).await?;
        Ok(PublishedManifest {
            list,
            digest: pushed.digest,
        })
    }
}

/// Everything the `push-container-manifest` operation needs
#[derive(Debug, Clone)]
pub struct PublishRequest {
    pub repo: String,
    pub tags: Vec<String>,
    /// Build id; `None` selects the latest build
    pub build_id: Option<String>,
    pub requested_arches: Vec<String>,
    /// Key in `images`, e.g. `ostree`
    pub artifact: String,
    /// Metadata key holding publication records, e.g. `base-oscontainer`
    pub namespace: String,
    pub force: bool,
    pub legacy_format: bool,
    /// Where to write the manifest list digest after a push
    pub digest_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Registry already matched metadata; nothing was pushed
    UpToDate { arches: Vec<String> },
    Published {
        digest: Option<String>,
        /// (architecture, digest) pairs recorded in metadata
        arches: Vec<(String, String)>,
    },
}

/// Reconcile, push if needed, and record the result
pub async fn publish_container_manifest(
    registry: &dyn ContainerRegistry,
    store: &BuildMetadataStore,
    request: &PublishRequest,
) -> Result<PublishOutcome> {
    let index = store.index()?;
    let build = index.resolve(request.build_id.as_deref())?;
    let build_arches = index.arches_for(&build.id)?;
    let selection = select_arches(&request.requested_arches, build_arches)?;
    let mut records = store.load_all(&build.id, &selection.arches)?;

    info!(
        "Reconciling {} for build {} ({})",
        request.repo,
        build.id,
        selection.arches.join(", ")
    );

    let plan = DigestReconciler::new(registry)
        .plan(
            &ReconcileRequest {
                repo: &request.repo,
                tags: &request.tags,
                requested_arches: &request.requested_arches,
                build_arches,
                artifact: &request.artifact,
                namespace: &request.namespace,
                force: request.force,
            },
            &records,
        )
        .await?;

    if !plan.should_push() {
        info!("Remote already matches; nothing to publish");
        return Ok(PublishOutcome::UpToDate { arches: plan.arches });
    }
    if !plan.needs_upload {
        info!("Registry is up to date but a re-publish was forced");
    }

    let pushed = ManifestPublisher::new(registry)
        .push(
            &request.repo,
            &request.tags,
            &plan.images,
            request.legacy_format,
        )
        .await?;

    if let Some(path) = &request.digest_file {
        match &pushed.digest {
            Some(digest) => fs::write(path, format!("{}\n", digest))?,
            None => warn!(
                "Registry reported no manifest list digest; not writing {}",
                path.display()
            ),
        }
    }

    // Only the published arches are reconciled; skipped ones keep their records
    records.retain(|arch, _| plan.arches.contains(arch));
    let arches = apply_published(
        &plan.arches,
        &pushed.list,
        &mut records,
        &request.repo,
        &request.tags,
        &request.namespace,
    )?;

    Ok(PublishOutcome::Published {
        digest: pushed.digest,
        arches,
    })
}
