//! End-to-end signing of a build's commit or image set

use crate::commit_store::CommitStore;
use crate::protocol::{ArtifactChecksum, RequestPayload, SigningProtocol, SigningRequest};
use crate::reexport::ArtifactReexporter;
use crate::storage::ObjectStore;
use crate::verify::{
    CommitVerifier, DetachedVerifier, ImageSignatureVerifier, ImageVerification, SignedArtifact,
    VerifiedCommit,
};
use relctl_core::config::StorageConfig;
use relctl_core::{ArtifactEntry, BuildRecord, Error, Result, SigningEnvironment};
use std::collections::BTreeMap;
use std::path::PathBuf;
use tracing::{info, warn};

/// Object name of an uploaded commit under `<prefix>/<build>/<arch>/`
pub const COMMIT_OBJECT_NAME: &str = "ostree-commit";

/// What every signing workflow shares
pub struct SigningContext<'a> {
    pub protocol: &'a SigningProtocol<'a>,
    pub store: &'a dyn ObjectStore,
    pub storage: &'a StorageConfig,
    pub environment: SigningEnvironment,
    /// Armored public key signatures are checked against
    pub public_key: PathBuf,
    pub extra: BTreeMap<String, String>,
    pub priority: u8,
}

impl SigningContext<'_> {
    fn request(&self, record: &BuildRecord, payload: RequestPayload) -> SigningRequest {
        SigningRequest {
            build_id: record.build_id().to_string(),
            basearch: record.arch().to_string(),
            payload,
            extra: self.extra.clone(),
            priority: self.priority,
            environment: self.environment,
        }
    }

    fn key(&self, record: &BuildRecord, relative: &str) -> String {
        self.storage
            .artifact_key(record.build_id(), record.arch(), relative)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommitSignReport {
    pub checksum: String,
    pub verification: VerifiedCommit,
    /// New artifact entry, when the artifact was rewritten
    pub reexported: Option<ArtifactEntry>,
}

pub struct CommitSigner<'a> {
    ctx: &'a SigningContext<'a>,
    commits: &'a dyn CommitStore,
}

impl<'a> CommitSigner<'a> {
    pub fn new(ctx: &'a SigningContext<'a>, commits: &'a dyn CommitStore) -> Self {
        Self { ctx, commits }
    }

    /// Have the build's commit signed and fold the signature into `artifact`
    pub async fn sign(
        &self,
        record: &mut BuildRecord,
        artifact: &str,
        verify_only: bool,
    ) -> Result<CommitSignReport> {
        if verify_only {
            return Err(Error::configuration(
                "verify-only is not supported for commit signing",
            ));
        }
        let checksum = record
            .ostree_commit()
            .ok_or_else(|| {
                Error::configuration(format!(
                    "build {} ({}) records no ostree commit",
                    record.build_id(),
                    record.arch()
                ))
            })?
            .to_string();

        let commit_key = self.ctx.key(record, COMMIT_OBJECT_NAME);
        let local = self.commits.commit_object_path(&checksum);
        self.ctx.store.upload(&local, &commit_key).await?;

        let result = self
            .sign_uploaded(record, artifact, &checksum, &commit_key)
            .await;

        if let Err(e) = self.ctx.store.delete(&commit_key).await {
            warn!("Failed to delete uploaded commit {}: {}", commit_key, e);
        }
        result
    }

    async fn sign_uploaded(
        &self,
        record: &mut BuildRecord,
        artifact: &str,
        checksum: &str,
        commit_key: &str,
    ) -> Result<CommitSignReport> {
        let request = self.ctx.request(
            record,
            RequestPayload::Commit {
                commit_object: self.ctx.storage.object_location(commit_key),
                checksum: checksum.to_string(),
            },
        );
        self.ctx.protocol.round_trip(&request).await?;

        let verification = CommitVerifier::new(
            self.ctx.store,
            self.commits,
            self.ctx.environment,
            &self.ctx.public_key,
        )
        .verify(commit_key, checksum)
        .await?;

        let reexported = if verification.accepted.is_valid() {
            Some(
                ArtifactReexporter::new(self.commits)
                    .reexport(record, artifact, checksum)
                    .await?,
            )
        } else {
            warn!("Not re-exporting {}: signature was not valid", artifact);
            None
        };

        Ok(CommitSignReport {
            checksum: checksum.to_string(),
            verification,
            reexported,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageSignReport {
    /// Whether a signing request was sent (false with verify-only)
    pub requested: bool,
    pub verification: ImageVerification,
}

pub struct ImageSigner<'a> {
    ctx: &'a SigningContext<'a>,
    verifier: &'a dyn DetachedVerifier,
}

impl<'a> ImageSigner<'a> {
    pub fn new(ctx: &'a SigningContext<'a>, verifier: &'a dyn DetachedVerifier) -> Self {
        Self { ctx, verifier }
    }

    /// Artifacts of `record` and their object keys
    pub fn artifacts(&self, record: &BuildRecord) -> Result<Vec<SignedArtifact>> {
        Ok(record
            .images()?
            .into_iter()
            .map(|(name, entry)| SignedArtifact {
                key: self.ctx.key(record, &entry.path),
                path: record.artifact_path(&entry),
                sha256: entry.sha256,
                name,
            })
            .collect())
    }

    /// Have every image of `record` signed and place the signatures
    pub async fn sign(&self, record: &BuildRecord, verify_only: bool) -> Result<ImageSignReport> {
        let artifacts = self.artifacts(record)?;
        if artifacts.is_empty() {
            return Err(Error::configuration(format!(
                "build {} ({}) has no images to sign",
                record.build_id(),
                record.arch()
            )));
        }

        if verify_only {
            info!("Verify-only: not sending a signing request");
        } else {
            let files = artifacts
                .iter()
                .map(|a| ArtifactChecksum {
                    file: self.ctx.storage.object_location(&a.key),
                    checksum: format!("sha256:{}", a.sha256),
                })
                .collect();
            let request = self.ctx.request(record, RequestPayload::Artifacts(files));
            self.ctx.protocol.round_trip(&request).await?;
        }

        let verification = ImageSignatureVerifier::new(
            self.ctx.store,
            self.verifier,
            self.ctx.environment,
            &self.ctx.public_key,
        )
        .verify(&artifacts)
        .await?;

        Ok(ImageSignReport {
            requested: !verify_only,
            verification,
        })
    }
}
