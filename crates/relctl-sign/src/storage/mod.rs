//! Object storage used to exchange artifacts with the signing authority

mod s3;

pub use s3::S3ObjectStore;

use async_trait::async_trait;
use relctl_core::Result;
use std::path::Path;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn upload(&self, local: &Path, key: &str) -> Result<()>;

    /// Fetch `key` into `local`, replacing any existing file
    async fn download(&self, key: &str, local: &Path) -> Result<()>;

    async fn delete(&self, key: &str) -> Result<()>;

    /// Make `key` world-readable
    async fn set_public_read(&self, key: &str) -> Result<()>;
}
