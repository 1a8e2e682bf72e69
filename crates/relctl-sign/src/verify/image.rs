use super::{accept, DetachedVerifier};
use crate::storage::ObjectStore;
use relctl_core::{Result, SigningEnvironment};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SIG_EXT: &str = "sig";

/// An artifact whose signature is expected at `<key>.sig`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedArtifact {
    /// Name in `images`
    pub name: String,
    pub path: PathBuf,
    pub key: String,
    pub sha256: String,
}

impl SignedArtifact {
    pub fn signature_key(&self) -> String {
        format!("{}.{}", self.key, SIG_EXT)
    }

    /// Where an accepted signature ends up
    pub fn signature_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".");
        name.push(SIG_EXT);
        PathBuf::from(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImageVerification {
    pub placed: Vec<PathBuf>,
    pub tolerated: Vec<String>,
}

/// Move a file, copying when a rename cannot cross filesystems
pub fn move_file(from: &Path, to: &Path) -> Result<()> {
    if std::fs::rename(from, to).is_ok() {
        return Ok(());
    }
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)?;
    Ok(())
}

pub struct ImageSignatureVerifier<'a> {
    store: &'a dyn ObjectStore,
    verifier: &'a dyn DetachedVerifier,
    environment: SigningEnvironment,
    public_key: PathBuf,
}

impl<'a> ImageSignatureVerifier<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        verifier: &'a dyn DetachedVerifier,
        environment: SigningEnvironment,
        public_key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            verifier,
            environment,
            public_key: public_key.into(),
        }
    }

    /// Verify each artifact's signature and place accepted ones beside it
    pub async fn verify(&self, artifacts: &[SignedArtifact]) -> Result<ImageVerification> {
        let scratch = tempfile::Builder::new().prefix("relctl-sigs-").tempdir()?;
        let mut report = ImageVerification::default();

        for artifact in artifacts {
            let sig_key = artifact.signature_key();
            let downloaded = scratch.path().join(format!("{}.{}", artifact.name, SIG_EXT));
            self.store.download(&sig_key, &downloaded).await?;

            let valid = self
                .verifier
                .verify_detached(&self.public_key, &downloaded, &artifact.path)
                .await?;
            let accepted = accept(valid, self.environment, &artifact.path.display().to_string())?;
            if !accepted.is_valid() {
                report.tolerated.push(artifact.name.clone());
                continue;
            }

            let dest = artifact.signature_path();
            move_file(&downloaded, &dest)?;
            debug!("Placed {}", dest.display());
            self.store.set_public_read(&sig_key).await?;
            info!("Verified signature for {}", artifact.name);
            report.placed.push(dest);
        }

        Ok(report)
    }
}
