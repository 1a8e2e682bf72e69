//! Helpers for driving external tools (skopeo, podman, ostree, gpg)

use crate::error::{Error, Result};
use std::path::PathBuf;
use std::process::Output;
use tokio::process::Command;
use tracing::{debug, trace};

/// Locate a tool in PATH
pub fn find_tool(name: &str) -> Result<PathBuf> {
    let path = which::which(name)
        .map_err(|_| Error::tool(name, format!("{} not found in PATH", name)))?;
    debug!("Found {} at: {}", name, path.display());
    Ok(path)
}

/// Run a command to completion and capture its output
pub async fn output(tool: &str, cmd: &mut Command) -> Result<Output> {
    trace!("Running: {:?}", cmd);
    cmd.output()
        .await
        .map_err(|e| Error::tool(tool, format!("failed to execute: {}", e)))
}

/// Run a command and return stdout, failing on a non-zero exit
pub async fn run(tool: &str, cmd: &mut Command) -> Result<String> {
    let out = output(tool, cmd).await?;
    if !out.status.success() {
        let stderr = String::from_utf8_lossy(&out.stderr);
        return Err(Error::tool(
            tool,
            format!("exited with {}: {}", out.status, stderr.trim()),
        ));
    }
    Ok(String::from_utf8_lossy(&out.stdout).into_owned())
}
