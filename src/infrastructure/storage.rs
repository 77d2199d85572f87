use crate::services::storage::S3StorageService;
use aws_sdk_s3::config::Region;
use std::env;
use std::sync::Arc;
use tracing::info;

/// Connects to the S3-compatible object store (Wasabi in production, MinIO in
/// local development) and makes sure the bucket exists.
pub async fn setup_storage() -> Arc<S3StorageService> {
    let endpoint_url = env::var("STORAGE_ENDPOINT").expect("STORAGE_ENDPOINT must be set");
    let access_key = env::var("STORAGE_ACCESS_KEY").expect("STORAGE_ACCESS_KEY must be set");
    let secret_key = env::var("STORAGE_SECRET_KEY").expect("STORAGE_SECRET_KEY must be set");
    let bucket = env::var("STORAGE_BUCKET").expect("STORAGE_BUCKET must be set");
    let region = env::var("STORAGE_REGION").unwrap_or_else(|_| "us-east-1".to_string());

    info!("☁️  S3 Storage: {} (Bucket: {})", endpoint_url, bucket);

    let aws_config = aws_config::from_env()
        .endpoint_url(&endpoint_url)
        .region(Region::new(region))
        .credentials_provider(aws_sdk_s3::config::Credentials::new(
            access_key, secret_key, None, None, "static",
        ))
        .load()
        .await;

    let s3_config = aws_sdk_s3::config::Builder::from(&aws_config)
        .force_path_style(true)
        .build();

    let s3_client = aws_sdk_s3::Client::from_conf(s3_config);

    match s3_client.head_bucket().bucket(&bucket).send().await {
        Ok(_) => info!("✅ Bucket '{}' is ready", bucket),
        Err(_) => {
            info!("🪣 Bucket '{}' not found, creating...", bucket);
            if let Err(e) = s3_client.create_bucket().bucket(&bucket).send().await {
                tracing::error!("❌ Failed to create bucket '{}': {}", bucket, e);
            } else {
                info!("✅ Bucket '{}' created successfully", bucket);
            }
        }
    }

    Arc::new(S3StorageService::new(s3_client, bucket))
}
