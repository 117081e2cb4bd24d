use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Durable string key-value storage, the local equivalent of browser local storage.
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

// --- File Implementation ---

/// Keeps every entry in a single JSON object file.
pub struct FileStorage {
    path: PathBuf,
    // serialises read-modify-write cycles
    lock: Mutex<()>,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        if !tokio::fs::try_exists(&self.path).await? {
            return Ok(BTreeMap::new());
        }
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        if content.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    async fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let content = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, content)
            .await
            .with_context(|| format!("Failed to write {}", self.path.display()))?;
        Ok(())
    }
}

#[async_trait]
impl Storage for FileStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}

// --- Memory Implementation ---

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_file_storage_persists_across_instances() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested").join("store.json");

        let storage = FileStorage::new(&path);
        assert_eq!(storage.get("k").await?, None);
        storage.set("k", "v").await?;
        storage.set("other", "x").await?;

        let reopened = FileStorage::new(&path);
        assert_eq!(reopened.get("k").await?.as_deref(), Some("v"));

        reopened.remove("k").await?;
        assert_eq!(storage.get("k").await?, None);
        assert_eq!(storage.get("other").await?.as_deref(), Some("x"));
        Ok(())
    }

    #[tokio::test]
    async fn test_file_storage_rejects_corrupt_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("store.json");
        std::fs::write(&path, "not json")?;

        let storage = FileStorage::new(&path);
        assert!(storage.get("k").await.is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_memory_storage() -> Result<()> {
        let storage = MemoryStorage::new();
        storage.set("a", "1").await?;
        assert_eq!(storage.get("a").await?.as_deref(), Some("1"));
        storage.remove("a").await?;
        assert_eq!(storage.get("a").await?, None);
        Ok(())
    }
}
