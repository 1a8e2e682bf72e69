//! Commit-based content store
//!
//! [`OstreeCli`] drives the `ostree` tool against a local repository. The
//! store itself is external; this only shells out.

use async_trait::async_trait;
use regex::Regex;
use relctl_core::process;
use relctl_core::{Error, Result};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::process::Command;
use tracing::{debug, info};

/// URL given to scratch trust anchors; they are only used for verification
const ANCHOR_URL: &str = "file:///dev/null";

static FOUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)found (\d+) signatures?").expect("signature count regex is valid")
});
static KEY_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"using \S+ key ID ([0-9A-Fa-f]+)").expect("key id regex is valid")
});
static VERDICT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(Good|BAD) signature from "([^"<]*?)\s*(?:<([^>]*)>)?""#)
        .expect("signature verdict regex is valid")
});

/// One signature found on a commit
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSignature {
    pub valid: bool,
    pub key_id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

#[async_trait]
pub trait CommitStore: Send + Sync {
    /// Location of the commit object for `checksum`
    fn commit_object_path(&self, checksum: &str) -> PathBuf;

    /// Attach detached metadata (signatures) to a commit
    async fn write_detached_metadata(&self, checksum: &str, metadata: &Path) -> Result<()>;

    /// Register a verification-only remote trusting the keys at `gpg_key_path`
    async fn add_trust_anchor(&self, name: &str, gpg_key_path: &Path) -> Result<()>;

    async fn remove_trust_anchor(&self, name: &str) -> Result<()>;

    /// Verify the commit against the anchor's keys, one entry per signature
    async fn verify_commit(&self, checksum: &str, anchor: &str) -> Result<Vec<CommitSignature>>;

    async fn supports_replace_detached_metadata(&self) -> Result<bool>;

    /// Copy the image at `src` to `dest` with the commit's current detached
    /// metadata swapped in
    async fn replace_detached_metadata(&self, checksum: &str, src: &Path, dest: &Path)
        -> Result<()>;

    /// Encapsulate the commit as a fresh container archive at `dest`
    async fn export_commit(&self, checksum: &str, dest: &Path) -> Result<()>;
}

/// Parse `ostree show --gpg-verify-remote` output
pub fn parse_signatures(output: &str) -> Result<Vec<CommitSignature>> {
    let found: usize = FOUND_RE
        .captures(output)
        .and_then(|c| c[1].parse().ok())
        .ok_or_else(|| {
            Error::remote_protocol("ostree output carries no signature summary")
        })?;

    let mut signatures: Vec<CommitSignature> = Vec::new();
    for line in output.lines() {
        if let Some(caps) = KEY_ID_RE.captures(line) {
            signatures.push(CommitSignature {
                valid: false,
                key_id: caps[1].to_string(),
                name: None,
                email: None,
            });
        } else if let Some(caps) = VERDICT_RE.captures(line) {
            let Some(current) = signatures.last_mut() else {
                continue;
            };
            current.valid = &caps[1] == "Good";
            current.name = Some(caps[2].trim().to_string()).filter(|n| !n.is_empty());
            current.email = caps.get(3).map(|m| m.as_str().to_string());
        }
    }

    if signatures.len() != found {
        debug!(
            "ostree reported {} signature(s) but {} were parsed",
            found,
            signatures.len()
        );
    }
    Ok(signatures)
}

#[derive(Debug, Clone)]
pub struct OstreeCli {
    ostree: PathBuf,
    repo: PathBuf,
}

impl OstreeCli {
    /// # Errors
    /// Returns an error if ostree is not found in PATH
    pub fn new(repo: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            ostree: process::find_tool("ostree")?,
            repo: repo.into(),
        })
    }

    fn ostree(&self) -> Command {
        Command::new(&self.ostree)
    }

    fn repo_arg(&self) -> String {
        format!("--repo={}", self.repo.display())
    }

    fn object_path(&self, checksum: &str, ext: &str) -> Result<PathBuf> {
        if checksum.len() < 3 || !checksum.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::configuration(format!(
                "'{}' is not a commit checksum",
                checksum
            )));
        }
        let (prefix, rest) = checksum.split_at(2);
        Ok(self
            .repo
            .join("objects")
            .join(prefix)
            .join(format!("{}.{}", rest, ext)))
    }
}

#[async_trait]
impl CommitStore for OstreeCli {
    fn commit_object_path(&self, checksum: &str) -> PathBuf {
        let prefix = checksum.get(..2).unwrap_or(checksum);
        let rest = checksum.get(2..).unwrap_or_default();
        self.repo
            .join("objects")
            .join(prefix)
            .join(format!("{}.commit", rest))
    }

    async fn write_detached_metadata(&self, checksum: &str, metadata: &Path) -> Result<()> {
        let dest = self.object_path(checksum, "commitmeta")?;
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(metadata, &dest).await?;
        debug!("Wrote detached metadata {}", dest.display());
        Ok(())
    }

    async fn add_trust_anchor(&self, name: &str, gpg_key_path: &Path) -> Result<()> {
        let mut cmd = self.ostree();
        cmd.args(["remote", "add", self.repo_arg().as_str()])
            .arg("--set=gpg-verify=true")
            .arg(format!("--set=gpgkeypath={}", gpg_key_path.display()))
            .args([name, ANCHOR_URL]);
        process::run("ostree", &mut cmd).await?;
        debug!("Added trust anchor {}", name);
        Ok(())
    }

    async fn remove_trust_anchor(&self, name: &str) -> Result<()> {
        let mut cmd = self.ostree();
        cmd.args(["remote", "delete", self.repo_arg().as_str(), name]);
        process::run("ostree", &mut cmd).await?;
        debug!("Removed trust anchor {}", name);
        Ok(())
    }

    async fn verify_commit(&self, checksum: &str, anchor: &str) -> Result<Vec<CommitSignature>> {
        let mut cmd = self.ostree();
        cmd.args(["show", self.repo_arg().as_str()])
            .arg(format!("--gpg-verify-remote={}", anchor))
            .arg(checksum);

        // A bad signature exits non-zero but still prints the report
        let out = process::output("ostree", &mut cmd).await?;
        let stdout = String::from_utf8_lossy(&out.stdout);
        let stderr = String::from_utf8_lossy(&out.stderr);

        match parse_signatures(&stdout) {
            Ok(signatures) => Ok(signatures),
            Err(_) if !out.status.success() => Err(Error::tool(
                "ostree",
                format!("exited with {}: {}", out.status, stderr.trim()),
            )),
            Err(e) => Err(e),
        }
    }

    async fn supports_replace_detached_metadata(&self) -> Result<bool> {
        let mut cmd = self.ostree();
        cmd.args(["container", "image", "replace-detached-metadata", "--help"]);
        let out = process::output("ostree", &mut cmd).await?;
        debug!(
            "replace-detached-metadata supported: {}",
            out.status.success()
        );
        Ok(out.status.success())
    }

    async fn replace_detached_metadata(
        &self,
        checksum: &str,
        src: &Path,
        dest: &Path,
    ) -> Result<()> {
        let metadata = self.object_path(checksum, "commitmeta")?;
        let mut cmd = self.ostree();
        cmd.args(["container", "image", "replace-detached-metadata"])
            .arg(format!("--src=oci-archive:{}", src.display()))
            .arg(format!("--dest=oci-archive:{}", dest.display()))
            .arg(&metadata);
        process::run("ostree", &mut cmd).await?;
        info!("Replaced detached metadata into {}", dest.display());
        Ok(())
    }

    async fn export_commit(&self, checksum: &str, dest: &Path) -> Result<()> {
        let mut cmd = self.ostree();
        cmd.args(["container", "encapsulate", self.repo_arg().as_str(), checksum])
            .arg(format!("oci-archive:{}", dest.display()));
        process::run("ostree", &mut cmd).await?;
        info!("Exported commit {} to {}", checksum, dest.display());
        Ok(())
    }
}
