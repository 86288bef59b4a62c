//! Durable key-value storage for completion records.
//!
//! The completion ledger treats its backing store as a flat string-to-string
//! key-value space, mirroring the web-local storage the records originally
//! lived in. Three backends are provided: an in-memory map for tests and
//! ephemeral runs, a single JSON file with atomic rewrites, and SQLite.

mod file;
mod memory;
mod sqlite;

pub use file::FileKvStore;
pub use memory::MemoryKvStore;
pub use sqlite::SqliteKvStore;

use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

/// Errors surfaced by the storage backends.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("storage task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Flat string key-value store.
///
/// Absent keys are not an error: `get` returns `Ok(None)`. Writes replace
/// any previous value wholesale; there is no delete because completion
/// records are only ever added to or updated.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Whether values survive a process restart.
    fn is_persistent(&self) -> bool;

    /// Read the value stored at `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` at `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// List every key currently present, in no particular order.
    async fn keys(&self) -> Result<Vec<String>, StorageError>;
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KvStoreType {
    /// In-memory only, lost on exit.
    Memory,
    /// Single JSON document rewritten atomically on every set.
    #[default]
    File,
    /// SQLite database.
    Sqlite,
}

impl KvStoreType {
    /// Parse from a config string. Unknown values fall back to the default.
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "memory" => KvStoreType::Memory,
            "file" | "json" => KvStoreType::File,
            "sqlite" | "db" => KvStoreType::Sqlite,
            _ => KvStoreType::default(),
        }
    }
}

/// Create a store of the requested type rooted at `data_dir`.
///
/// The directory is created if missing. The memory backend ignores it.
pub async fn create_kv_store(
    store_type: KvStoreType,
    data_dir: &Path,
) -> Result<Box<dyn KvStore>, StorageError> {
    match store_type {
        KvStoreType::Memory => {
            tracing::info!("Using in-memory storage (data will not persist)");
            Ok(Box::new(MemoryKvStore::new()))
        }
        KvStoreType::File => {
            tracing::info!("Using file storage at: {}", data_dir.display());
            Ok(Box::new(FileKvStore::new(data_dir.to_path_buf()).await?))
        }
        KvStoreType::Sqlite => {
            tracing::info!("Using SQLite storage at: {}", data_dir.display());
            Ok(Box::new(SqliteKvStore::new(data_dir.to_path_buf()).await?))
        }
    }
}
