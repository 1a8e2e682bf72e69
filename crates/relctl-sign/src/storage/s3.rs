//! S3 object storage
//!
//! Works with AWS S3 and S3-compatible storage given a custom endpoint.

use super::ObjectStore;
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::Region;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use relctl_core::config::StorageConfig;
use relctl_core::{Error, Result};
use std::path::Path;
use tracing::{debug, info};

pub struct S3ObjectStore {
    client: Client,
    bucket: String,
}

impl S3ObjectStore {
    /// Create a store from the `storage` config section
    ///
    /// # Errors
    /// Returns a configuration error when no bucket is configured
    pub async fn new(config: &StorageConfig) -> Result<Self> {
        let bucket = config
            .bucket
            .clone()
            .ok_or_else(|| Error::configuration("storage.bucket is not set"))?;
        let client = Self::create_client(&config.region, config.endpoint.as_deref()).await;
        Ok(Self { client, bucket })
    }

    async fn create_client(region: &str, endpoint: Option<&str>) -> Client {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;

        let mut builder = aws_sdk_s3::config::Builder::from(&sdk_config);
        if let Some(endpoint_url) = endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint_url);
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        Client::from_conf(builder.build())
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    fn failed(&self, action: &str, key: &str, e: impl std::fmt::Display) -> Error {
        Error::storage(format!(
            "failed to {} s3://{}/{}: {}",
            action, self.bucket, key, e
        ))
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    async fn upload(&self, local: &Path, key: &str) -> Result<()> {
        debug!("Uploading {} to s3://{}/{}", local.display(), self.bucket, key);

        let body = ByteStream::from_path(local)
            .await
            .map_err(|e| self.failed("read upload source for", key, e))?;
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .send()
            .await
            .map_err(|e| self.failed("upload", key, e.into_service_error()))?;

        info!("Uploaded s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn download(&self, key: &str, local: &Path) -> Result<()> {
        debug!("Downloading s3://{}/{}", self.bucket, key);

        let resp = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.failed("download", key, e.into_service_error()))?;
        let data = resp
            .body
            .collect()
            .await
            .map_err(|e| self.failed("read body of", key, e))?
            .into_bytes();

        tokio::fs::write(local, &data).await?;
        debug!("Downloaded {} bytes to {}", data.len(), local.display());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<()> {
        debug!("Deleting s3://{}/{}", self.bucket, key);
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| self.failed("delete", key, e.into_service_error()))?;
        Ok(())
    }

    async fn set_public_read(&self, key: &str) -> Result<()> {
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| self.failed("set public-read on", key, e.into_service_error()))?;
        info!("Marked s3://{}/{} public-read", self.bucket, key);
        Ok(())
    }
}
