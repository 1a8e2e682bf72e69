//! Rewrites a container artifact so it carries a commit's new signature

use crate::commit_store::CommitStore;
use relctl_core::checksum;
use relctl_core::meta::IMAGES_KEY;
use relctl_core::{ArtifactEntry, BuildRecord, Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub struct ArtifactReexporter<'a> {
    commits: &'a dyn CommitStore,
}

/// Scratch output beside the artifact so the final rename stays on one filesystem
fn scratch_path(artifact: &Path) -> Result<PathBuf> {
    let dir = artifact.parent().ok_or_else(|| {
        Error::configuration(format!("{} has no parent directory", artifact.display()))
    })?;
    let file = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    Ok(dir.join(format!(".{}.relctl-{}.tmp", file, uuid::Uuid::new_v4())))
}

fn set_read_only(path: &Path) -> Result<()> {
    let mut perms = fs::metadata(path)?.permissions();
    perms.set_readonly(true);
    fs::set_permissions(path, perms)?;
    Ok(())
}

impl<'a> ArtifactReexporter<'a> {
    pub fn new(commits: &'a dyn CommitStore) -> Self {
        Self { commits }
    }

    /// Re-export `artifact` of `record` with the signed commit `checksum`
    /// and persist its new size and checksum.
    pub async fn reexport(
        &self,
        record: &mut BuildRecord,
        artifact: &str,
        checksum: &str,
    ) -> Result<ArtifactEntry> {
        let entry = record.image(artifact)?.ok_or_else(|| {
            Error::configuration(format!(
                "build {} ({}) has no '{}' artifact to re-export",
                record.build_id(),
                record.arch(),
                artifact
            ))
        })?;
        let path = record.artifact_path(&entry);
        let tmp = scratch_path(&path)?;

        let in_place = self.commits.supports_replace_detached_metadata().await?;
        let written = if in_place {
            debug!("Replacing detached metadata in {}", path.display());
            self.commits
                .replace_detached_metadata(checksum, &path, &tmp)
                .await
        } else {
            debug!("Re-exporting commit {} in full", checksum);
            self.commits.export_commit(checksum, &tmp).await
        };

        if let Err(e) = written {
            if tmp.exists() {
                if let Err(rm) = fs::remove_file(&tmp) {
                    warn!("Failed to remove {}: {}", tmp.display(), rm);
                }
            }
            return Err(e);
        }

        fs::rename(&tmp, &path)?;
        set_read_only(&path)?;

        let size = fs::metadata(&path)?.len();
        let hash_path = path.clone();
        let sha256 = tokio::task::spawn_blocking(move || checksum::sha256_file(&hash_path))
            .await
            .map_err(|e| Error::integrity(format!("checksum task failed: {}", e)))??;

        let updated = ArtifactEntry {
            size,
            sha256,
            ..entry
        };
        record.set_image(artifact, updated.clone())?;
        record.write_back(IMAGES_KEY)?;

        info!(
            "Re-exported {} ({} bytes, sha256 {})",
            path.display(),
            updated.size,
            updated.sha256
        );
        Ok(updated)
    }
}
