use crate::manifest::ManifestList;
use async_trait::async_trait;
use relctl_core::process;
use relctl_core::{Error, Result};
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// Manifest list returned by a push
#[derive(Debug, Clone, PartialEq)]
pub struct PublishedManifest {
    pub list: ManifestList,
    /// Digest of the manifest list itself, when the registry reported one
    pub digest: Option<String>,
}

/// Raw registry transport used by the reconciler and publisher
#[async_trait]
pub trait ContainerRegistry: Send + Sync {
    /// Fetch the manifest list for `repo:tag`.
    ///
    /// Any error is read by callers as "no manifest list exists".
    async fn inspect_manifest_list(&self, repo: &str, tag: &str) -> Result<ManifestList>;

    /// Create a manifest list from `images` and push it under every tag.
    ///
    /// With `legacy_format` the returned list is not authoritative; callers
    /// re-inspect to learn the final per-architecture digests.
    async fn push_manifest_list(
        &self,
        repo: &str,
        tags: &[String],
        images: &[String],
        legacy_format: bool,
    ) -> Result<PublishedManifest>;
}

/// Registry client driving `skopeo` and `podman`
#[derive(Debug, Clone)]
pub struct CliRegistry {
    skopeo: PathBuf,
    podman: PathBuf,
    authfile: Option<PathBuf>,
}

impl CliRegistry {
    /// Create a new registry client
    ///
    /// # Errors
    /// Returns an error if skopeo or podman is not found in PATH
    pub fn new() -> Result<Self> {
        Ok(Self {
            skopeo: process::find_tool("skopeo")?,
            podman: process::find_tool("podman")?,
            authfile: None,
        })
    }

    /// Use a container auth file for every registry call
    pub fn with_authfile(mut self, authfile: impl Into<PathBuf>) -> Self {
        self.authfile = Some(authfile.into());
        self
    }

    fn podman(&self) -> Command {
        Command::new(&self.podman)
    }

    fn push_args(
        &self,
        name: &str,
        target: &str,
        legacy_format: bool,
        digestfile: &Path,
    ) -> Vec<String> {
        let mut args = vec![
            "manifest".to_string(),
            "push".to_string(),
            "--all".to_string(),
        ];
        if legacy_format {
            args.extend(["--format".to_string(), "v2s2".to_string()]);
        }
        if let Some(authfile) = &self.authfile {
            args.push(format!("--authfile={}", authfile.display()));
        }
        args.push(format!("--digestfile={}", digestfile.display()));
        args.push(name.to_string());
        args.push(format!("docker://{}", target));
        args
    }

    async fn push_inner(
        &self,
        name: &str,
        repo: &str,
        tags: &[String],
        images: &[String],
        legacy_format: bool,
    ) -> Result<PublishedManifest> {
        process::run("podman", self.podman().args(["manifest", "create", name])).await?;

        for image in images {
            debug!("Adding {} to manifest list {}", image, name);
            let mut add = self.podman();
            add.args(["manifest", "add", name, image.as_str()]);
            process::run("podman", &mut add).await?;
        }

        let digestfile = tempfile::NamedTempFile::new()?;
        for tag in tags {
            let target = format!("{}:{}", repo, tag);
            info!("Pushing manifest list to {}", target);
            let args = self.push_args(name, &target, legacy_format, digestfile.path());
            process::run("podman", self.podman().args(&args)).await?;
        }

        let digest = std::fs::read_to_string(digestfile.path())?.trim().to_string();
        let raw =
            process::run("podman", self.podman().args(["manifest", "inspect", name])).await?;

        Ok(PublishedManifest {
            list: ManifestList::parse(&raw)?,
            digest: (!digest.is_empty()).then_some(digest),
        })
    }
}

#[async_trait]
impl ContainerRegistry for CliRegistry {
    async fn inspect_manifest_list(&self, repo: &str, tag: &str) -> Result<ManifestList> {
        let mut cmd = Command::new(&self.skopeo);
        cmd.args(["inspect", "--raw"]);
        if let Some(authfile) = &self.authfile {
            cmd.arg(format!("--authfile={}", authfile.display()));
        }
        cmd.arg(format!("docker://{}:{}", repo, tag));

        let raw = process::run("skopeo", &mut cmd).await?;
        ManifestList::parse(&raw)
    }

    async fn push_manifest_list(
        &self,
        repo: &str,
        tags: &[String],
        images: &[String],
        legacy_format: bool,
    ) -> Result<PublishedManifest> {
        if tags.is_empty() {
            return Err(Error::configuration("at least one tag is required"));
        }

        let name = format!("relctl-manifest-{}", uuid::Uuid::new_v4());
        let result = self.push_inner(&name, repo, tags, images, legacy_format).await;

        // The local list is scratch state; remove it whatever happened
        let mut rm = self.podman();
        rm.args(["manifest", "rm", name.as_str()]);
        if let Err(e) = process::run("podman", &mut rm).await {
            warn!("Failed to remove local manifest list {}: {}", name, e);
        }

        result
    }
}
