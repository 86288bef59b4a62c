//! JSON file-backed key-value store.

use super::{KvStore, StorageError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::fs;
use tokio::sync::{Mutex, RwLock};

const STORE_FILENAME: &str = "store.json";

/// Persistent store keeping every entry in one JSON document.
///
/// The whole document is rewritten on each `set` via a temp file and an
/// atomic rename, so a crash mid-write never leaves a truncated store. An
/// unreadable or unparsable file is logged and treated as empty rather than
/// refusing to start.
#[derive(Clone)]
pub struct FileKvStore {
    path: PathBuf,
    entries: Arc<RwLock<HashMap<String, String>>>,
    persist_lock: Arc<Mutex<()>>,
}

impl FileKvStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self, StorageError> {
        fs::create_dir_all(&data_dir).await?;
        let path = data_dir.join(STORE_FILENAME);
        let entries = match fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice::<HashMap<String, String>>(&bytes) {
                Ok(entries) => entries,
                Err(e) => {
                    tracing::warn!("Failed to parse store file {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => HashMap::new(),
            Err(err) => {
                tracing::warn!("Failed to read store file {}: {}", path.display(), err);
                HashMap::new()
            }
        };

        Ok(Self {
            path,
            entries: Arc::new(RwLock::new(entries)),
            persist_lock: Arc::new(Mutex::new(())),
        })
    }

    async fn persist(&self) -> Result<(), StorageError> {
        let _guard = self.persist_lock.lock().await;
        let snapshot = self.entries.read().await.clone();
        let data = serde_json::to_vec_pretty(&snapshot)?;
        let tmp_path = self.path.with_extension("json.tmp");
        fs::write(&tmp_path, data).await?;
        fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KvStore for FileKvStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let previous = self
            .entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        if let Err(e) = self.persist().await {
            // Roll back so reads keep matching what is actually on disk.
            let mut entries = self.entries.write().await;
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.entries.read().await.keys().cloned().collect())
    }
}
