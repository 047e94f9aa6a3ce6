//! Raster store boundary: opaque string paths to image bytes, no
//! transactional guarantees.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;

/// Byte storage addressed by opaque string paths.
#[async_trait]
pub trait RasterStore: Send + Sync {
    async fn get(&self, path: &str) -> io::Result<Vec<u8>>;
    async fn save_bytes(&self, data: &[u8], path: &str) -> io::Result<()>;
    async fn exists(&self, path: &str) -> bool;
}

/// Filesystem-backed store rooted at a directory.
#[derive(Clone)]
pub struct LocalStorage {
    root: String,
}

impl LocalStorage {
    pub fn new(root: impl Into<String>) -> Self {
        Self { root: root.into() }
    }

    fn resolve(&self, path: &str) -> std::path::PathBuf {
        Path::new(&self.root).join(path)
    }
}

#[async_trait]
impl RasterStore for LocalStorage {
    async fn get(&self, path: &str) -> io::Result<Vec<u8>> {
        fs::read(self.resolve(path)).await
    }

    async fn save_bytes(&self, data: &[u8], path: &str) -> io::Result<()> {
        let full = self.resolve(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(full, data).await
    }

    async fn exists(&self, path: &str) -> bool {
        fs::try_exists(self.resolve(path)).await.unwrap_or(false)
    }
}

/// In-memory store for tests.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    entries: Arc<RwLock<HashMap<String, Vec<u8>>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RasterStore for MemoryStorage {
    async fn get(&self, path: &str) -> io::Result<Vec<u8>> {
        self.entries
            .read()
            .await
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, format!("no entry at {path}")))
    }

    async fn save_bytes(&self, data: &[u8], path: &str) -> io::Result<()> {
        self.entries
            .write()
            .await
            .insert(path.to_string(), data.to_vec());
        Ok(())
    }

    async fn exists(&self, path: &str) -> bool {
        self.entries.read().await.contains_key(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn local_storage_round_trips_nested_paths() {
        let dir = TempDir::new().unwrap();
        let store = LocalStorage::new(dir.path().to_string_lossy().to_string());

        let path = "projects/p1/pages/1.png";
        assert!(!store.exists(path).await);

        store.save_bytes(b"page bytes", path).await.unwrap();
        assert!(store.exists(path).await);
        assert_eq!(store.get(path).await.unwrap(), b"page bytes");
    }

    #[tokio::test]
    async fn local_storage_get_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = LocalStorage::new(dir.path().to_string_lossy().to_string());

        let err = store.get("nope.png").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[tokio::test]
    async fn memory_storage_overwrites_in_place() {
        let store = MemoryStorage::new();
        store.save_bytes(b"v1", "a.png").await.unwrap();
        store.save_bytes(b"v2", "a.png").await.unwrap();
        assert_eq!(store.get("a.png").await.unwrap(), b"v2");
    }
}
