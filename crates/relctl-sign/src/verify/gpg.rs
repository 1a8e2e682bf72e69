use super::DetachedVerifier;
use async_trait::async_trait;
use relctl_core::process;
use relctl_core::Result;
use std::path::{Path, PathBuf};
use tokio::process::Command;
use tracing::debug;

/// Detached signature verification with `gpg` and a scratch keyring
#[derive(Debug, Clone)]
pub struct GpgVerifier {
    gpg: PathBuf,
}

impl GpgVerifier {
    /// # Errors
    /// Returns an error if gpg is not found in PATH
    pub fn new() -> Result<Self> {
        Ok(Self {
            gpg: process::find_tool("gpg")?,
        })
    }

    fn gpg(&self, homedir: &Path) -> Command {
        let mut cmd = Command::new(&self.gpg);
        cmd.arg("--homedir").arg(homedir).arg("--batch");
        cmd
    }
}

#[async_trait]
impl DetachedVerifier for GpgVerifier {
    async fn verify_detached(
        &self,
        public_key: &Path,
        signature: &Path,
        data: &Path,
    ) -> Result<bool> {
        // Keyring holds only the configured key
        let homedir = tempfile::Builder::new().prefix("relctl-gpg-").tempdir()?;

        let mut import = self.gpg(homedir.path());
        import.arg("--import").arg(public_key);
        process::run("gpg", &mut import).await?;

        let mut verify = self.gpg(homedir.path());
        verify.arg("--verify").arg(signature).arg(data);
        let out = process::output("gpg", &mut verify).await?;
        if !out.status.success() {
            debug!(
                "gpg rejected {}: {}",
                signature.display(),
                String::from_utf8_lossy(&out.stderr).trim()
            );
        }
        Ok(out.status.success())
    }
}
