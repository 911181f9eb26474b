use actions_core::storage::{ObjectStore, StorageError};
use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::time::Duration;
use tracing::debug;

/// [`ObjectStore`] over one S3 bucket.
pub struct S3Store {
    client: Client,
    bucket: String,
}

impl S3Store {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<(), StorageError> {
        debug!(bucket = %self.bucket, key, bytes = body.len(), "put_object");
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .content_type(content_type)
            .body(ByteStream::from(body))
            .send()
            .await
            .map_err(|e| StorageError::Write {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let output = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
        {
            Ok(output) => output,
            Err(e) if e.as_service_error().map(|s| s.is_no_such_key()) == Some(true) => {
                return Err(StorageError::NotFound {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                })
            }
            Err(e) => {
                return Err(StorageError::Read {
                    bucket: self.bucket.clone(),
                    key: key.to_string(),
                    message: DisplayErrorContext(&e).to_string(),
                })
            }
        };

        let bytes = output.body.collect().await.map_err(|e| StorageError::Read {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            message: e.to_string(),
        })?;
        Ok(bytes.into_bytes().to_vec())
    }

    async fn list_keys(&self, prefix: &str, max_keys: usize) -> Result<Vec<String>, StorageError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(prefix)
            .max_keys(i32::try_from(max_keys).unwrap_or(i32::MAX))
            .send()
            .await
            .map_err(|e| StorageError::List {
                bucket: self.bucket.clone(),
                prefix: prefix.to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;
        Ok(output
            .contents()
            .iter()
            .filter_map(|o| o.key())
            .map(String::from)
            .collect())
    }

    async fn presign_get(&self, key: &str, expires_in: Duration) -> Result<String, StorageError> {
        let presign_err = |message: String| StorageError::Presign {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            message,
        };
        let config = PresigningConfig::expires_in(expires_in).map_err(|e| presign_err(e.to_string()))?;
        let request = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(|e| presign_err(DisplayErrorContext(&e).to_string()))?;
        Ok(request.uri().to_string())
    }
}
