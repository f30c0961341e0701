//! Storage locations

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the relational snapshot and blob database live
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Data directory for persistence
    pub data_dir: PathBuf,
    /// Relational store snapshot file, relative to `data_dir`
    pub snapshot_file: String,
    /// Blob database directory, relative to `data_dir`
    pub blob_db: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".blockmine"),
            snapshot_file: "store.json".to_string(),
            blob_db: "blobs.sled".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join(&self.snapshot_file)
    }

    pub fn blob_path(&self) -> PathBuf {
        self.data_dir.join(&self.blob_db)
    }
}
