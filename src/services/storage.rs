use anyhow::Result;
use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use std::time::Duration;

/// SigV4 rejects presigned URLs valid for more than a week. Longer configured
/// expiries are clamped to this instead of failing every signing call.
pub const MAX_PRESIGN_EXPIRY_SECS: u64 = 7 * 24 * 3600;

pub fn clamp_presign_expiry(expires_in_secs: u64) -> u64 {
    expires_in_secs.min(MAX_PRESIGN_EXPIRY_SECS)
}

/// Object-store operations the app needs. Kept behind a trait so tests run
/// against an in-memory mock.
#[async_trait]
pub trait StorageService: Send + Sync {
    async fn upload_file(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()>;
    async fn delete_file(&self, key: &str) -> Result<()>;
    /// Presigned GET URL, capped at the SigV4 maximum of one week.
    async fn presigned_url(&self, key: &str, expires_in_secs: u64) -> Result<String>;
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(&self, key: &str, data: Vec<u8>, content_type: &str) -> Result<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(data))
            .send()
            .await?;
        Ok(())
    }

    async fn delete_file(&self, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await?;
        Ok(())
    }

    async fn presigned_url(&self, key: &str, expires_in_secs: u64) -> Result<String> {
        let expiry = clamp_presign_expiry(expires_in_secs);
        let presigning = PresigningConfig::expires_in(Duration::from_secs(expiry))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(presigning)
            .await?;
        Ok(presigned.uri().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;

    #[test]
    fn presign_expiry_is_capped_at_one_week() {
        // The configured default (12 months) exceeds what SigV4 accepts
        let config = AppConfig::default();
        assert!(config.presign_expiry_secs > MAX_PRESIGN_EXPIRY_SECS);
        assert_eq!(
            clamp_presign_expiry(config.presign_expiry_secs),
            MAX_PRESIGN_EXPIRY_SECS
        );
    }

    #[test]
    fn short_expiries_pass_through() {
        assert_eq!(clamp_presign_expiry(3600), 3600);
        assert_eq!(clamp_presign_expiry(MAX_PRESIGN_EXPIRY_SECS), MAX_PRESIGN_EXPIRY_SECS);
    }
}
