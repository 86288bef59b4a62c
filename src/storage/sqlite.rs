//! SQLite-backed key-value store.

use super::{KvStore, StorageError};
use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

const DB_FILENAME: &str = "store.db";

const SCHEMA: &str = r#"
PRAGMA journal_mode = WAL;

CREATE TABLE IF NOT EXISTS kv_entries (
    key TEXT PRIMARY KEY NOT NULL,
    value TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
"#;

/// Persistent store keeping entries in a single SQLite table. All database
/// work runs on the blocking pool.
pub struct SqliteKvStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteKvStore {
    pub async fn new(data_dir: PathBuf) -> Result<Self, StorageError> {
        tokio::fs::create_dir_all(&data_dir).await?;
        let db_path = data_dir.join(DB_FILENAME);

        let conn = tokio::task::spawn_blocking(move || -> Result<Connection, rusqlite::Error> {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SCHEMA)?;
            Ok(conn)
        })
        .await??;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

#[async_trait]
impl KvStore for SqliteKvStore {
    fn is_persistent(&self) -> bool {
        true
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let value = tokio::task::spawn_blocking(move || -> Result<Option<String>, rusqlite::Error> {
            let conn = conn.blocking_lock();
            conn.query_row(
                "SELECT value FROM kv_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
        })
        .await??;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let key = key.to_string();
        let value = value.to_string();
        let now = Utc::now().to_rfc3339();
        tokio::task::spawn_blocking(move || -> Result<(), rusqlite::Error> {
            let conn = conn.blocking_lock();
            conn.execute(
                "INSERT OR REPLACE INTO kv_entries (key, value, updated_at) VALUES (?1, ?2, ?3)",
                params![key, value, now],
            )?;
            Ok(())
        })
        .await??;
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, StorageError> {
        let conn = self.conn.clone();
        let keys = tokio::task::spawn_blocking(move || -> Result<Vec<String>, rusqlite::Error> {
            let conn = conn.blocking_lock();
            let mut stmt = conn.prepare("SELECT key FROM kv_entries")?;
            let keys = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(keys)
        })
        .await??;
        Ok(keys)
    }
}
