//! Blob store implementations
//!
//! `SledBlobStore` keeps bytes and content types in two sled trees so prefix
//! listing is a plain ordered scan. `MemoryBlobStore` is the test double.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::BlobStore;

/// Blob store on the sled embedded database
pub struct SledBlobStore {
    db: sled::Db,
    blobs: sled::Tree,
    content_types: sled::Tree,
}

impl SledBlobStore {
    /// Open or create the database at `path`
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let db = sled::open(path)
            .with_context(|| format!("Failed to open blob database at {:?}", path))?;
        let blobs = db.open_tree("blobs").context("Failed to open blobs tree")?;
        let content_types = db
            .open_tree("content_types")
            .context("Failed to open content type tree")?;
        Ok(Self {
            db,
            blobs,
            content_types,
        })
    }

    /// Flush pending writes to disk
    pub fn flush(&self) -> Result<()> {
        self.db.flush().context("Failed to flush blob database")?;
        Ok(())
    }

    /// Content type recorded for a key
    pub fn content_type(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .content_types
            .get(key.as_bytes())?
            .map(|v| String::from_utf8_lossy(&v).into_owned()))
    }
}

#[async_trait]
impl BlobStore for SledBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.blobs
            .insert(key.as_bytes(), bytes)
            .with_context(|| format!("Failed to write blob {}", key))?;
        self.content_types
            .insert(key.as_bytes(), content_type.as_bytes())
            .with_context(|| format!("Failed to write content type for {}", key))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self
            .blobs
            .get(key.as_bytes())
            .with_context(|| format!("Failed to read blob {}", key))?
            .map(|v| v.to_vec()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let existed = self.blobs.remove(key.as_bytes())?.is_some();
        self.content_types.remove(key.as_bytes())?;
        Ok(existed)
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let mut keys = Vec::new();
        for entry in self.blobs.scan_prefix(prefix.as_bytes()) {
            let (key, _) = entry.context("Failed to scan blob keys")?;
            keys.push(String::from_utf8_lossy(&key).into_owned());
        }
        Ok(keys)
    }
}

/// Blob store held in memory
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<BTreeMap<String, (Vec<u8>, String)>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<()> {
        self.blobs
            .write()
            .insert(key.to_string(), (bytes, content_type.to_string()));
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.blobs.read().get(key).map(|(b, _)| b.clone()))
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        Ok(self.blobs.write().remove(key).is_some())
    }

    async fn list_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .blobs
            .read()
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect())
    }
}
