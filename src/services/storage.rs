use async_trait::async_trait;
use s3::creds::Credentials;
use s3::{Bucket, Region};

const THUMBNAIL_PREFIX: &str = "thumbs";
const THUMBNAIL_CONTENT_TYPE: &str = "image/png";

/// Contract for blob storage of generated media.
#[async_trait]
pub trait BlobStorage: Send + Sync {
    /// Save bytes at a primary path.
    async fn save_primary(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError>;

    /// Save thumbnail bytes tied to a primary path.
    async fn save_thumbnail(&self, path: &str, data: &[u8]) -> Result<(), StorageError>;
}

/// Cloudflare R2 object storage (S3-compatible).
pub struct R2Storage {
    bucket: Box<Bucket>,
}

impl R2Storage {
    pub fn new(
        bucket_name: &str,
        endpoint: &str,
        access_key: &str,
        secret_key: &str,
    ) -> Result<Self, StorageError> {
        let region = Region::Custom {
            region: "auto".to_string(),
            endpoint: endpoint.to_string(),
        };

        let credentials = Credentials::new(Some(access_key), Some(secret_key), None, None, None)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        let bucket = Bucket::new(bucket_name, region, credentials)
            .map_err(|e| StorageError::Config(e.to_string()))?;

        Ok(Self { bucket })
    }
}

#[async_trait]
impl BlobStorage for R2Storage {
    async fn save_primary(
        &self,
        path: &str,
        data: &[u8],
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.bucket
            .put_object_with_content_type(path, data, content_type)
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }

    async fn save_thumbnail(&self, path: &str, data: &[u8]) -> Result<(), StorageError> {
        let key = format!("{THUMBNAIL_PREFIX}/{path}");
        self.bucket
            .put_object_with_content_type(&key, data, THUMBNAIL_CONTENT_TYPE)
            .await
            .map_err(StorageError::S3)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("S3 operation failed: {0}")]
    S3(#[from] s3::error::S3Error),

    #[error("Storage configuration error: {0}")]
    Config(String),
}
