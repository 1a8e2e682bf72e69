//! SHA-256 helpers for artifact integrity checks

use crate::error::{Error, Result};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

const CHUNK_SIZE: usize = 64 * 1024;

/// Calculate the hex SHA-256 checksum of a file
pub fn sha256_file(path: &Path) -> Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Ensure `path` exists and hashes to `expected`.
///
/// Never re-derives the recorded checksum: a mismatch is always an
/// [`Error::Integrity`].
pub fn verify_file(path: &Path, expected: &str) -> Result<()> {
    if !path.is_file() {
        return Err(Error::integrity(format!(
            "artifact {} does not exist",
            path.display()
        )));
    }

    let actual = sha256_file(path)?;
    if !actual.eq_ignore_ascii_case(expected) {
        return Err(Error::integrity(format!(
            "checksum mismatch for {}: recorded {}, found {}",
            path.display(),
            expected,
            actual
        )));
    }

    debug!("Checksum verified for {}", path.display());
    Ok(())
}
