//! Directory-backed [`ObjectStore`] for the `local` provider.
//!
//! Objects live at `<root>/<bucket>/<key>`. Presigned URLs are `file://` URLs
//! of that path, so a spilled result stays readable after the process exits.

use crate::storage::{ObjectStore, StorageError};
use async_trait::async_trait;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::debug;

pub struct FsStore {
    bucket: String,
    dir: PathBuf,
}

impl FsStore {
    /// Open (creating if needed) the bucket directory under `root`.
    pub fn open(root: impl AsRef<Path>, bucket: impl Into<String>) -> Result<Self, StorageError> {
        let bucket = bucket.into();
        let open_err = |e: std::io::Error| StorageError::Write {
            bucket: bucket.clone(),
            key: String::new(),
            message: format!("cannot open {}: {e}", root.as_ref().display()),
        };
        let dir = root.as_ref().join(&bucket);
        std::fs::create_dir_all(&dir).map_err(open_err)?;
        let dir = dir.canonicalize().map_err(open_err)?;
        Ok(Self { bucket, dir })
    }

    /// Absolute directory holding this bucket's objects.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// `None` for keys that are empty or would escape the bucket directory.
    fn path_for(&self, key: &str) -> Option<PathBuf> {
        let valid = !key.is_empty()
            && key
                .split('/')
                .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
        valid.then(|| self.dir.join(key))
    }
}

fn atomic_write(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

fn collect_keys(dir: &Path, root: &Path, out: &mut Vec<String>) -> std::io::Result<()> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e),
    };
    for entry in entries {
        let entry = entry?;
        let path = entry.path();
        if entry.file_type()?.is_dir() {
            collect_keys(&path, root, out)?;
        } else if let Ok(relative) = path.strip_prefix(root) {
            let key: Vec<String> = relative
                .components()
                .filter_map(|c| match c {
                    Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
                    _ => None,
                })
                .collect();
            out.push(key.join("/"));
        }
    }
    Ok(())
}

#[async_trait]
impl ObjectStore for FsStore {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    async fn put(&self, key: &str, body: Vec<u8>, _content_type: &str) -> Result<(), StorageError> {
        let write_err = |message: String| StorageError::Write {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            message,
        };
        let path = self
            .path_for(key)
            .ok_or_else(|| write_err("invalid object key".into()))?;
        debug!(path = %path.display(), bytes = body.len(), "writing object");
        tokio::task::spawn_blocking(move || atomic_write(&path, &body))
            .await
            .map_err(|e| write_err(e.to_string()))?
            .map_err(|e| write_err(e.to_string()))
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let not_found = || StorageError::NotFound {
            bucket: self.bucket.clone(),
            key: key.to_string(),
        };
        let path = self.path_for(key).ok_or_else(not_found)?;
        match tokio::fs::read(&path).await {
            Ok(body) => Ok(body),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(not_found()),
            Err(e) => Err(StorageError::Read {
                bucket: self.bucket.clone(),
                key: key.to_string(),
                message: e.to_string(),
            }),
        }
    }

    async fn list_keys(&self, prefix: &str, max_keys: usize) -> Result<Vec<String>, StorageError> {
        // Only the directory named by the prefix's last `/` needs walking.
        let start = prefix
            .rsplit_once('/')
            .and_then(|(parent, _)| self.path_for(parent))
            .unwrap_or_else(|| self.dir.clone());
        let root = self.dir.clone();
        let keys = tokio::task::spawn_blocking(move || {
            let mut keys = Vec::new();
            collect_keys(&start, &root, &mut keys).map(|_| keys)
        })
        .await
        .map_err(|e| e.to_string())
        .and_then(|r| r.map_err(|e| e.to_string()))
        .map_err(|message| StorageError::List {
            bucket: self.bucket.clone(),
            prefix: prefix.to_string(),
            message,
        })?;

        let mut keys: Vec<String> = keys.into_iter().filter(|k| k.starts_with(prefix)).collect();
        keys.sort();
        keys.truncate(max_keys);
        Ok(keys)
    }

    async fn presign_get(&self, key: &str, _expires_in: Duration) -> Result<String, StorageError> {
        let path = self.path_for(key).ok_or_else(|| StorageError::Presign {
            bucket: self.bucket.clone(),
            key: key.to_string(),
            message: "invalid object key".into(),
        })?;
        Ok(format!("file://{}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn presigned_url_points_at_the_written_file() {
        let root = TempDir::new().unwrap();
        let store = FsStore::open(root.path(), "results").unwrap();
        store
            .put("spill/abc.json", b"{\"rows\":[]}".to_vec(), "application/json")
            .await
            .unwrap();

        let url = store
            .presign_get("spill/abc.json", Duration::from_secs(3600))
            .await
            .unwrap();
        let path = url.strip_prefix("file://").unwrap();
        assert_eq!(std::fs::read(path).unwrap(), b"{\"rows\":[]}".to_vec());
        assert!(Path::new(path).starts_with(root.path().canonicalize().unwrap()));
    }

    #[tokio::test]
    async fn objects_survive_reopening() {
        let root = TempDir::new().unwrap();
        FsStore::open(root.path(), "b")
            .unwrap()
            .put("REPORTS/P-1.txt", b"report".to_vec(), "text/plain")
            .await
            .unwrap();

        let reopened = FsStore::open(root.path(), "b").unwrap();
        assert_eq!(reopened.get("REPORTS/P-1.txt").await.unwrap(), b"report".to_vec());
    }

    #[tokio::test]
    async fn list_keys_walks_nested_directories_in_order() {
        let root = TempDir::new().unwrap();
        let store = FsStore::open(root.path(), "b").unwrap();
        for key in ["FEATURES/P-2.h5", "FEATURES/P-1/b.h5", "FEATURES/P-1/a.h5", "WSI/P-1.svs"] {
            store.put(key, b"x".to_vec(), "application/octet-stream").await.unwrap();
        }

        assert_eq!(
            store.list_keys("FEATURES/P-1", 10).await.unwrap(),
            vec!["FEATURES/P-1/a.h5", "FEATURES/P-1/b.h5"]
        );
        assert_eq!(store.list_keys("FEATURES/", 1).await.unwrap(), vec!["FEATURES/P-1/a.h5"]);
        assert!(store.list_keys("REPORTS/P-1", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn keys_cannot_escape_the_bucket() {
        let root = TempDir::new().unwrap();
        let store = FsStore::open(root.path(), "b").unwrap();
        let err = store
            .put("../outside.txt", b"x".to_vec(), "text/plain")
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Write { .. }));
        assert!(!root.path().join("outside.txt").exists());
        assert!(matches!(
            store.get("a//b").await.unwrap_err(),
            StorageError::NotFound { .. }
        ));
    }
}
