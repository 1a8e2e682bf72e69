//! Signature and commit verification
//!
//! A signed artifact is only treated as authoritative once its signature
//! verifies against the configured public key. Production requires a valid
//! signature; staging tolerates an invalid one with a warning.

mod commit;
mod gpg;
mod image;

pub use commit::{CommitVerifier, VerifiedCommit};
pub use gpg::GpgVerifier;
pub use image::{move_file, ImageSignatureVerifier, ImageVerification, SignedArtifact};

use async_trait::async_trait;
use relctl_core::{Error, Result, SigningEnvironment};
use std::path::Path;
use tracing::warn;

/// Outcome of applying the acceptance rule
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Accepted {
    Valid,
    /// Invalid, but allowed through in staging
    Tolerated,
}

impl Accepted {
    pub fn is_valid(&self) -> bool {
        matches!(self, Accepted::Valid)
    }
}

/// Apply the acceptance rule to a verification verdict for `what`
pub fn accept(valid: bool, environment: SigningEnvironment, what: &str) -> Result<Accepted> {
    if valid {
        return Ok(Accepted::Valid);
    }
    if environment.is_staging() {
        warn!("Invalid signature on {} tolerated in staging", what);
        return Ok(Accepted::Tolerated);
    }
    Err(Error::verification_failure(format!(
        "invalid signature on {}",
        what
    )))
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationResult {
    pub valid: bool,
    pub fingerprint: String,
    pub signer_name: Option<String>,
    pub signer_email: Option<String>,
}

/// Verifies a detached signature over a file
#[async_trait]
pub trait DetachedVerifier: Send + Sync {
    /// `Ok(false)` means the signature does not verify against `public_key`
    async fn verify_detached(&self, public_key: &Path, signature: &Path, data: &Path)
        -> Result<bool>;
}
