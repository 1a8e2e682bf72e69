//! Container manifest publication for relctl
//!
//! This crate provides:
//! - A registry transport trait and a `skopeo`/`podman` implementation
//! - Manifest list parsing with architecture normalization
//! - Digest reconciliation: is a re-publish actually required?
//! - Manifest list publication and post-push metadata updates
//!
//! # Example
//!
//! ```no_run
//! use relctl_core::BuildMetadataStore;
//! use relctl_publish::{publish_container_manifest, CliRegistry, PublishRequest};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let registry = CliRegistry::new()?;
//!     let store = BuildMetadataStore::new("builds");
//!     let request = PublishRequest {
//!         repo: "quay.io/example/os".to_string(),
//!         tags: vec!["stable".to_string()],
//!         build_id: None,
//!         requested_arches: vec![],
//!         artifact: "ostree".to_string(),
//!         namespace: "base-oscontainer".to_string(),
//!         force: false,
//!         legacy_format: false,
//!         digest_file: None,
//!     };
//!
//!     let outcome = publish_container_manifest(&registry, &store, &request).await?;
//!     println!("{:?}", outcome);
//!     Ok(())
//! }
//! ```

pub mod manifest;
pub mod publisher;
pub mod reconcile;
pub mod registry;

pub use manifest::{ManifestDescriptor, ManifestList, Platform, RegistryDigestMap};
pub use publisher::{publish_container_manifest, ManifestPublisher, PublishOutcome, PublishRequest};
pub use reconcile::{
    apply_published, select_arches, ArchSelection, DigestReconciler, ReconcilePlan,
    ReconcileRequest,
};
pub use registry::{CliRegistry, ContainerRegistry, PublishedManifest};
