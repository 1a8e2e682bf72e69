use super::{accept, Accepted, VerificationResult};
use crate::commit_store::CommitStore;
use crate::storage::ObjectStore;
use relctl_core::{Error, Result, SigningEnvironment};
use std::path::PathBuf;
use tracing::{info, warn};

pub const DETACHED_SUFFIX: &str = "-detached.commitmeta";
const ANCHOR_PREFIX: &str = "relctl-verify-";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedCommit {
    pub result: VerificationResult,
    pub accepted: Accepted,
}

/// Checks the signature the signing authority attached to a commit
pub struct CommitVerifier<'a> {
    store: &'a dyn ObjectStore,
    commits: &'a dyn CommitStore,
    environment: SigningEnvironment,
    public_key: PathBuf,
}

impl<'a> CommitVerifier<'a> {
    pub fn new(
        store: &'a dyn ObjectStore,
        commits: &'a dyn CommitStore,
        environment: SigningEnvironment,
        public_key: impl Into<PathBuf>,
    ) -> Self {
        Self {
            store,
            commits,
            environment,
            public_key: public_key.into(),
        }
    }

    /// Fetch the detached metadata stored beside `commit_key`, attach it to
    /// `checksum`, and verify it against the public key.
    pub async fn verify(&self, commit_key: &str, checksum: &str) -> Result<VerifiedCommit> {
        let scratch = tempfile::Builder::new().prefix("relctl-verify-").tempdir()?;

        let meta_key = format!("{}{}", commit_key, DETACHED_SUFFIX);
        let meta_path = scratch.path().join(format!("{}.commitmeta", checksum));
        self.store.download(&meta_key, &meta_path).await?;
        self.commits
            .write_detached_metadata(checksum, &meta_path)
            .await?;

        let key_dir = scratch.path().join("keys");
        tokio::fs::create_dir_all(&key_dir).await?;
        let key_name = self
            .public_key
            .file_name()
            .ok_or_else(|| {
                Error::configuration(format!(
                    "gpg key path {} names no file",
                    self.public_key.display()
                ))
            })?;
        let key_path = key_dir.join(key_name);
        tokio::fs::copy(&self.public_key, &key_path).await?;

        let anchor = format!("{}{}", ANCHOR_PREFIX, uuid::Uuid::new_v4());
        self.commits.add_trust_anchor(&anchor, &key_path).await?;
        let verified = self.commits.verify_commit(checksum, &anchor).await;
        if let Err(e) = self.commits.remove_trust_anchor(&anchor).await {
            warn!("Failed to remove trust anchor {}: {}", anchor, e);
        }
        let signatures = verified?;

        let [signature] = signatures.as_slice() else {
            return Err(Error::remote_protocol(format!(
                "expected exactly one signature on commit {}, found {}",
                checksum,
                signatures.len()
            )));
        };

        let result = VerificationResult {
            valid: signature.valid,
            fingerprint: signature.key_id.clone(),
            signer_name: signature.name.clone(),
            signer_email: signature.email.clone(),
        };
        let accepted = accept(result.valid, self.environment, &format!("commit {}", checksum))?;

        if accepted.is_valid() {
            info!(
                "Commit {} signed by {} ({})",
                checksum,
                result.signer_name.as_deref().unwrap_or("unknown signer"),
                result.fingerprint
            );
        }
        Ok(VerifiedCommit { result, accepted })
    }
}
