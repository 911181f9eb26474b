//! Object storage seam.
//!
//! Handlers look documents up by key prefix, read them, and the response
//! sizer writes oversized results and hands back a presigned URL. Anything
//! that can do those four things implements [`ObjectStore`].

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to write s3://{bucket}/{key}: {message}")]
    Write {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to read s3://{bucket}/{key}: {message}")]
    Read {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("failed to list s3://{bucket}/{prefix}: {message}")]
    List {
        bucket: String,
        prefix: String,
        message: String,
    },

    #[error("failed to presign s3://{bucket}/{key}: {message}")]
    Presign {
        bucket: String,
        key: String,
        message: String,
    },

    #[error("object not found: s3://{bucket}/{key}")]
    NotFound { bucket: String, key: String },
}

// ---------------------------------------------------------------------------
// S3Uri
// ---------------------------------------------------------------------------

/// A `s3://bucket/key` address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Uri {
    pub bucket: String,
    pub key: String,
}

impl S3Uri {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for S3Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s3://{}/{}", self.bucket, self.key)
    }
}

impl std::str::FromStr for S3Uri {
    type Err = crate::error::ActionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix("s3://").ok_or_else(|| {
            crate::error::ActionError::invalid("s3_uri", format!("'{s}' is not an s3:// URI"))
        })?;
        match rest.split_once('/') {
            Some((bucket, key)) if !bucket.is_empty() && !key.is_empty() => {
                Ok(S3Uri::new(bucket, key))
            }
            _ => Err(crate::error::ActionError::invalid(
                "s3_uri",
                format!("'{s}' must name both a bucket and a key"),
            )),
        }
    }
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Bucket every key of this store lives in.
    fn bucket(&self) -> &str;

    async fn put(&self, key: &str, body: Vec<u8>, content_type: &str)
        -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Up to `max_keys` keys starting with `prefix`, in lexicographic order.
    async fn list_keys(&self, prefix: &str, max_keys: usize)
        -> Result<Vec<String>, StorageError>;

    /// A credential-less GET URL for `key`, valid for `expires_in`.
    async fn presign_get(&self, key: &str, expires_in: Duration)
        -> Result<String, StorageError>;

    fn uri(&self, key: &str) -> S3Uri {
        S3Uri::new(self.bucket(), key)
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub body: Vec<u8>,
    pub content_type: String,
}

/// In-process [`ObjectStore`] for tests and embedding.
///
/// Presigned URLs use a `memory://` scheme; they are only meaningful to
/// [`MemoryStore::resolve_url`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    bucket: String,
    objects: Mutex<BTreeMap<String, StoredObject>>,
    writes: AtomicUsize,
    calls: AtomicUsize,
}

impl MemoryStore {
    pub fn new(bucket: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            ..Default::default()
        }
    }

    /// Seed an object without counting it as a write.
    pub fn with_object(self, key: &str, body: impl Into<Vec<u8>>) -> Self {
        self.lock().insert(
            key.to_string(),
            StoredObject {
                body: body.into(),
                content_type: "application/octet-stream".to_string(),
            },
        );
        self
    }

    /// Number of `put` calls served.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of trait calls of any kind served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn keys(&self) -> Vec<String> {
        self.lock().keys().cloned().collect()
    }

    pub fn object(&self, key: &str) -> Option<StoredObject> {
        self.lock().get(key).cloned()
    }

    /// Dereference a URL produced by [`ObjectStore::presign_get`].
    pub fn resolve_url(&self, url: &str) -> Option<Vec<u8>> {
        let rest = url.strip_prefix("memory://")?;
        let (bucket, key_and_query) = rest.split_once('/')?;
        if bucket != self.bucket {
            return None;
        }
        let key = key_and_query.split('?').next()?;
        self.object(key).map(|o| o.body)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl ObjectStore for MemoryStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(
        &self,
        key: &str,
        body: Vec<u8>,
        content_type: &str,
    ) -> Result<(), StorageError> {
        self.record_call();
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.lock().insert(
            key.to_string(),
            StoredObject {
                body,
                content_type: content_type.to_string(),
            },
        );
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.record_call();
        self.object(key)
            .map(|o| o.body)
            .ok_or_else(|| StorageError::NotFound {
                bucket: self.bucket.clone(),
                key: key.to_string(),
            })
    }

    async fn list_keys(
        &self,
        prefix: &str,
        max_keys: usize,
    ) -> Result<Vec<String>, StorageError> {
        self.record_call();
        Ok(self
            .lock()
            .range(prefix.to_string()..)
            .map(|(k, _)| k)
            .take_while(|k| k.starts_with(prefix))
            .take(max_keys)
            .cloned()
            .collect())
    }

    async fn presign_get(
        &self,
        key: &str,
        expires_in: Duration,
    ) -> Result<String, StorageError> {
        self.record_call();
        Ok(format!(
            "memory://{}/{}?expires_in={}",
            self.bucket,
            key,
            expires_in.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn s3_uri_round_trips_through_display() {
        let uri: S3Uri = "s3://pathology/WSI/TCGA-3L.svs".parse().unwrap();
        assert_eq!(uri.bucket, "pathology");
        assert_eq!(uri.key, "WSI/TCGA-3L.svs");
        assert_eq!(uri.to_string(), "s3://pathology/WSI/TCGA-3L.svs");
    }

    #[test]
    fn s3_uri_rejects_missing_key() {
        assert!("s3://bucket-only".parse::<S3Uri>().is_err());
        assert!("https://example.com/x".parse::<S3Uri>().is_err());
    }

    #[tokio::test]
    async fn list_keys_returns_prefix_matches_in_order() {
        let store = MemoryStore::new("b")
            .with_object("REPORTS/P2.pdf", "two")
            .with_object("REPORTS/P1-b.txt", "b")
            .with_object("REPORTS/P1-a.txt", "a")
            .with_object("WSI/P1.svs", "slide");

        let keys = store.list_keys("REPORTS/P1", 10).await.unwrap();
        assert_eq!(keys, vec!["REPORTS/P1-a.txt", "REPORTS/P1-b.txt"]);
        assert_eq!(store.list_keys("REPORTS/P", 1).await.unwrap(), vec!["REPORTS/P1-a.txt"]);
        assert!(store.list_keys("FEATURES/P1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_keys_does_not_match_keys_after_the_prefix_range() {
        let store = MemoryStore::new("b").with_object("REPORTS/Q1.txt", "q");
        assert!(store.list_keys("REPORTS/P", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn presigned_memory_url_resolves_to_body() {
        let store = MemoryStore::new("spill");
        store
            .put("out/1.json", b"{\"a\":1}".to_vec(), "application/json")
            .await
            .unwrap();
        let url = store
            .presign_get("out/1.json", Duration::from_secs(3600))
            .await
            .unwrap();
        assert_eq!(url, "memory://spill/out/1.json?expires_in=3600");
        assert_eq!(store.resolve_url(&url).unwrap(), b"{\"a\":1}".to_vec());
        assert_eq!(store.writes(), 1);
        assert_eq!(store.calls(), 2);
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let store = MemoryStore::new("b");
        let err = store.get("nope").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound { .. }));
    }
}
