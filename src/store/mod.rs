//! Key-value persistence port
//!
//! The application keeps exactly two persisted entries: the serialized
//! identification history and the durable session credential. That
//! surface is an explicit port injected into the history and session
//! components, with a file-backed implementation and an in-memory fake
//! for tests.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

/// String key-value persistence.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Read a value. Absent keys are `None`, not an error.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, replacing any previous one (last-writer-wins).
    async fn put(&self, key: &str, value: &str) -> Result<()>;

    /// Delete a value. Deleting an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

/// File-backed store: one file per key under a root directory.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Create the store, creating the root directory if needed.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory: {root:?}"))?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.json"))
    }
}

#[async_trait]
impl StateStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("failed to read {path:?}")),
        }
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        tokio::fs::write(&path, value)
            .await
            .with_context(|| format!("failed to write {path:?}"))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {path:?}")),
        }
    }
}

/// In-memory store for tests.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .unwrap()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.lock().unwrap().remove(key);
        Ok(())
    }
}
