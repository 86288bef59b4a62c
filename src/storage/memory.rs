//! In-memory key-value store.

use super::{KvStore, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Non-persistent store backed by a plain map. Useful for tests and for
/// throwaway sessions where nothing should be written to disk.
#[derive(Clone)]
pub struct MemoryKvStore {
    entries: Arc<RwLock<HashMap<String, String>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }
}

impl Default for MemoryKvStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    fn is_persistent(&self) -> bool {
        false
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
