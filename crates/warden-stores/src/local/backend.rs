//! Byte storage underneath the local vault stores.

use std::collections::HashMap;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use async_trait::async_trait;
use tokio::sync::RwLock;
use warden_errors::Result;

/// Path-keyed byte storage with compare-and-set.
///
/// Every write bumps a per-entry version that `put_cas` compares against.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    async fn put(&self, path: &str, value: &[u8]) -> Result<()>;

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>>;

    /// `true` if something was removed.
    async fn delete(&self, path: &str) -> Result<bool>;

    /// Paths under `prefix`, relative to it, sorted.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Write only if the entry is absent (`expected = None`) or still at
    /// `expected`. Returns `false` when the condition failed.
    async fn put_cas(&self, path: &str, value: &[u8], expected: Option<u64>) -> Result<bool>;

    async fn get_with_version(&self, path: &str) -> Result<Option<(Vec<u8>, u64)>>;
}

#[derive(Debug, Default)]
pub struct InMemoryBackend {
    entries: RwLock<HashMap<String, (Vec<u8>, u64)>>,
    next_version: AtomicU64,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn bump(&self) -> u64 {
        self.next_version.fetch_add(1, Ordering::SeqCst)
    }
}

#[async_trait]
impl StorageBackend for InMemoryBackend {
    async fn put(&self, path: &str, value: &[u8]) -> Result<()> {
        let version = self.bump();
        self.entries.write().await.insert(path.to_string(), (value.to_vec(), version));
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().await.get(path).map(|(value, _)| value.clone()))
    }

    async fn delete(&self, path: &str) -> Result<bool> {
        Ok(self.entries.write().await.remove(path).is_some())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let entries = self.entries.read().await;
        let mut paths: Vec<String> = entries
            .keys()
            .filter_map(|path| path.strip_prefix(prefix))
            .filter(|relative| !relative.is_empty())
            .map(str::to_string)
            .collect();
        paths.sort();
        Ok(paths)
    }

    async fn put_cas(&self, path: &str, value: &[u8], expected: Option<u64>) -> Result<bool> {
        let mut entries = self.entries.write().await;
        let current = entries.get(path).map(|(_, version)| *version);
        if current != expected {
            return Ok(false);
        }
        let version = self.bump();
        entries.insert(path.to_string(), (value.to_vec(), version));
        Ok(true)
    }

    async fn get_with_version(&self, path: &str) -> Result<Option<(Vec<u8>, u64)>> {
        Ok(self.entries.read().await.get(path).cloned())
    }
}
