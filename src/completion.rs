//! Completion ledger: durable attempt records and the merge rules.
//!
//! Every solved task gets one [`CompletionRecord`] in the key-value store,
//! keyed `arc-task-{id}`. Records accumulate attempts over time and track
//! the best (lowest) elapsed time and who set it. Two storage generations
//! coexist: the modern multi-entry shape and a legacy single-attempt shape
//! from before the `entries` array existed. Legacy records are recognized
//! at the storage boundary and migrated explicitly instead of being
//! shape-sniffed in the mutation paths.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use tokio::sync::{Mutex, RwLock};

use crate::storage::{KvStore, StorageError};

const TASK_KEY_PREFIX: &str = "arc-task-";
const LEGACY_AGGREGATE_KEY: &str = "arcCompletionData";
const CURRENT_USER_KEY: &str = "arc-current-user";

/// Attributed to legacy attempts that carried no user.
pub const UNKNOWN_USER: &str = "Unknown";

fn task_key(task_id: &str) -> String {
    format!("{}{}", TASK_KEY_PREFIX, task_id)
}

/// An attempt as submitted by the caller; the store adds the timestamp.
#[derive(Debug, Clone)]
pub struct NewAttempt {
    /// Elapsed solving time in seconds.
    pub time: f64,
    /// Opaque record of the solving session; stored verbatim.
    pub transcript: serde_json::Value,
    pub user: String,
}

/// One recorded solve event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attempt {
    pub time: f64,
    #[serde(default)]
    pub transcript: serde_json::Value,
    pub user: String,
    pub timestamp: DateTime<Utc>,
}

/// Durable, merge-reconciled summary of all attempts for one task.
///
/// `time` is the minimum across `entries` and `user` is the owner of that
/// minimum; `entries` is append-only in call order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRecord {
    #[serde(default)]
    pub task_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub completed: bool,
    pub entries: Vec<Attempt>,
}

impl CompletionRecord {
    fn new(task_id: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            time: None,
            user: None,
            completed: false,
            entries: Vec::new(),
        }
    }

    /// Append an attempt, updating the best time when it strictly improves
    /// on the current one. Ties keep the existing owner.
    fn apply_attempt(&mut self, attempt: Attempt) {
        let improves = match self.time {
            Some(best) => attempt.time < best,
            None => true,
        };
        if improves {
            self.time = Some(attempt.time);
            self.user = Some(attempt.user.clone());
        }
        self.completed = true;
        self.entries.push(attempt);
    }
}

/// Pre-`entries` record shape: the whole record is one implicit attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    pub time: f64,
    #[serde(default)]
    pub transcript: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl LegacyRecord {
    /// The single attempt this record describes. Missing attribution
    /// defaults to [`UNKNOWN_USER`]; a missing timestamp becomes `now`.
    fn into_attempt(self, now: DateTime<Utc>) -> Attempt {
        Attempt {
            time: self.time,
            transcript: self.transcript,
            user: self.user.unwrap_or_else(|| UNKNOWN_USER.to_string()),
            timestamp: self.timestamp.unwrap_or(now),
        }
    }
}

/// Migrate a legacy record to the modern multi-entry shape. The legacy
/// fields become the record's first (and only) entry and its best time.
pub fn migrate_legacy(task_id: &str, legacy: LegacyRecord, now: DateTime<Utc>) -> CompletionRecord {
    let attempt = legacy.into_attempt(now);
    CompletionRecord {
        task_id: task_id.to_string(),
        time: Some(attempt.time),
        user: Some(attempt.user.clone()),
        completed: true,
        entries: vec![attempt],
    }
}

/// Wire shape of a stored record.
///
/// Untagged: a payload with an `entries` array parses as modern, anything
/// else with a `time` falls through to legacy. Tried in that order.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StoredRecord {
    Modern(CompletionRecord),
    Legacy(LegacyRecord),
}

impl StoredRecord {
    /// Normalize to the modern shape. `task_id` comes from the storage key
    /// when the stored payload does not carry one.
    fn into_record(self, task_id: &str, now: DateTime<Utc>) -> CompletionRecord {
        match self {
            StoredRecord::Modern(mut record) => {
                if record.task_id.is_empty() {
                    record.task_id = task_id.to_string();
                }
                record
            }
            StoredRecord::Legacy(legacy) => migrate_legacy(task_id, legacy, now),
        }
    }
}

/// Ledger of completion records over a key-value store.
///
/// Successful writes are mirrored into an in-memory cache; a failed write
/// leaves both the durable store and the cache as they were. Merges for a
/// task id apply strictly in call order.
pub struct CompletionStore {
    store: Box<dyn KvStore>,
    cache: RwLock<HashMap<String, CompletionRecord>>,
    merge_lock: Mutex<()>,
}

impl CompletionStore {
    pub fn new(store: Box<dyn KvStore>) -> Self {
        Self {
            store,
            cache: RwLock::new(HashMap::new()),
            merge_lock: Mutex::new(()),
        }
    }

    /// Whether records will survive a restart.
    pub fn is_persistent(&self) -> bool {
        self.store.is_persistent()
    }

    /// Record one attempt for `task_id`, merging it into any existing
    /// record and returning the updated record.
    ///
    /// A legacy-shaped record is migrated first, so its original solve is
    /// preserved as the first entry. An unparsable stored value is logged
    /// and replaced by a fresh record rather than aborting. A failed
    /// durable write is logged at error level and surfaced with both the
    /// stored and cached record left as they were.
    pub async fn record_attempt(
        &self,
        task_id: &str,
        attempt: NewAttempt,
    ) -> Result<CompletionRecord, StorageError> {
        // The read-modify-write below must not interleave between calls;
        // entries order is defined as call order.
        let _guard = self.merge_lock.lock().await;

        let now = Utc::now();
        let enriched = Attempt {
            time: attempt.time,
            transcript: attempt.transcript,
            user: attempt.user,
            timestamp: now,
        };

        let key = task_key(task_id);
        let mut record = match self.load_stored(&key).await? {
            Some(stored) => stored.into_record(task_id, now),
            None => CompletionRecord::new(task_id),
        };
        record.apply_attempt(enriched);

        if let Err(e) = self.persist_record(&key, &record).await {
            tracing::error!("Failed to persist attempt for task {}: {}", task_id, e);
            return Err(e);
        }
        self.cache
            .write()
            .await
            .insert(task_id.to_string(), record.clone());

        tracing::info!(
            "Recorded attempt for task {} ({} entries)",
            task_id,
            record.entries.len()
        );
        Ok(record)
    }

    /// Fetch the record for `task_id`, preferring the in-memory cache.
    /// An absent record is `Ok(None)`, not an error.
    pub async fn get_completion(
        &self,
        task_id: &str,
    ) -> Result<Option<CompletionRecord>, StorageError> {
        if let Some(record) = self.cache.read().await.get(task_id) {
            return Ok(Some(record.clone()));
        }
        let key = task_key(task_id);
        match self.load_stored(&key).await? {
            Some(stored) => Ok(Some(stored.into_record(task_id, Utc::now()))),
            None => Ok(None),
        }
    }

    /// True iff a record exists for `task_id` and is marked completed.
    pub async fn is_completed(&self, task_id: &str) -> Result<bool, StorageError> {
        Ok(self
            .get_completion(task_id)
            .await?
            .map(|record| record.completed)
            .unwrap_or(false))
    }

    /// Scan the store for every completion record, keyed by task id.
    ///
    /// Entries that fail to parse are logged and skipped; one bad blob
    /// must not abort an export.
    pub async fn list_all_completions(
        &self,
    ) -> Result<BTreeMap<String, CompletionRecord>, StorageError> {
        let now = Utc::now();
        let mut records = BTreeMap::new();
        for key in self.store.keys().await? {
            let task_id = match key.strip_prefix(TASK_KEY_PREFIX) {
                Some(id) => id.to_string(),
                None => continue,
            };
            let raw = match self.store.get(&key).await? {
                Some(raw) => raw,
                None => continue,
            };
            match serde_json::from_str::<StoredRecord>(&raw) {
                Ok(stored) => {
                    records.insert(task_id.clone(), stored.into_record(&task_id, now));
                }
                Err(e) => {
                    tracing::warn!("Skipping unparsable completion record at {}: {}", key, e);
                }
            }
        }
        Ok(records)
    }

    /// The user new attempts are attributed to, defaulting to
    /// [`UNKNOWN_USER`] when none has been set.
    pub async fn current_user(&self) -> Result<String, StorageError> {
        let stored = self.store.get(CURRENT_USER_KEY).await?;
        Ok(stored
            .filter(|user| !user.is_empty())
            .unwrap_or_else(|| UNKNOWN_USER.to_string()))
    }

    pub async fn set_current_user(&self, user: &str) -> Result<(), StorageError> {
        self.store.set(CURRENT_USER_KEY, user).await
    }

    /// One-time backfill from the old aggregate blob, which kept every
    /// task's legacy record under a single key. Only task ids with no
    /// per-task record are imported; existing records win. Returns how
    /// many records were written.
    pub async fn import_legacy_aggregate(&self) -> Result<usize, StorageError> {
        let raw = match self.store.get(LEGACY_AGGREGATE_KEY).await? {
            Some(raw) => raw,
            None => return Ok(0),
        };
        let aggregate: BTreeMap<String, LegacyRecord> = match serde_json::from_str(&raw) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(
                    "Unparsable legacy aggregate at {}: {}",
                    LEGACY_AGGREGATE_KEY,
                    e
                );
                return Ok(0);
            }
        };

        let _guard = self.merge_lock.lock().await;
        let now = Utc::now();
        let mut imported = 0;
        for (task_id, legacy) in aggregate {
            let key = task_key(&task_id);
            if self.store.get(&key).await?.is_some() {
                continue;
            }
            let record = migrate_legacy(&task_id, legacy, now);
            self.persist_record(&key, &record).await?;
            self.cache.write().await.insert(task_id, record);
            imported += 1;
        }
        if imported > 0 {
            tracing::info!("Imported {} legacy completion records", imported);
        }
        Ok(imported)
    }

    async fn persist_record(
        &self,
        key: &str,
        record: &CompletionRecord,
    ) -> Result<(), StorageError> {
        let json = serde_json::to_string(record)?;
        self.store.set(key, &json).await
    }

    async fn load_stored(&self, key: &str) -> Result<Option<StoredRecord>, StorageError> {
        let raw = match self.store.get(key).await? {
            Some(raw) => raw,
            None => return Ok(None),
        };
        match serde_json::from_str::<StoredRecord>(&raw) {
            Ok(stored) => Ok(Some(stored)),
            Err(e) => {
                tracing::warn!("Unparsable completion record at {}: {}", key, e);
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryKvStore;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

    fn attempt(time: f64, user: &str) -> NewAttempt {
        NewAttempt {
            time,
            transcript: json!({ "moves": [] }),
            user: user.to_string(),
        }
    }

    fn store() -> CompletionStore {
        CompletionStore::new(Box::new(MemoryKvStore::new()))
    }

    /// Store that can be told to reject writes, for failure-path tests.
    struct FlakyKvStore {
        inner: MemoryKvStore,
        fail_writes: Arc<AtomicBool>,
    }

    #[async_trait]
    impl KvStore for FlakyKvStore {
        fn is_persistent(&self) -> bool {
            false
        }

        async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::Other,
                    "disk full",
                )));
            }
            self.inner.set(key, value).await
        }

        async fn keys(&self) -> Result<Vec<String>, StorageError> {
            self.inner.keys().await
        }
    }

    /// Counts error-level events emitted while installed as the default
    /// subscriber.
    struct ErrorEventCounter(Arc<AtomicUsize>);

    impl<S: tracing::Subscriber> Layer<S> for ErrorEventCounter {
        fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
            if *event.metadata().level() == tracing::Level::ERROR {
                self.0.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn first_attempt_creates_completed_record() {
        let store = store();
        let record = store
            .record_attempt("2-training-0", attempt(50.0, "alice"))
            .await
            .unwrap();

        assert_eq!(record.task_id, "2-training-0");
        assert_eq!(record.time, Some(50.0));
        assert_eq!(record.user.as_deref(), Some("alice"));
        assert!(record.completed);
        assert_eq!(record.entries.len(), 1);
        assert!(store.is_completed("2-training-0").await.unwrap());
    }

    #[tokio::test]
    async fn faster_attempt_takes_over_best() {
        let store = store();
        store.record_attempt("t", attempt(50.0, "alice")).await.unwrap();
        let record = store.record_attempt("t", attempt(30.0, "bob")).await.unwrap();

        assert_eq!(record.time, Some(30.0));
        assert_eq!(record.user.as_deref(), Some("bob"));
        assert_eq!(record.entries.len(), 2);
        assert_eq!(record.entries[0].user, "alice");
        assert_eq!(record.entries[1].user, "bob");
    }

    #[tokio::test]
    async fn slower_attempt_keeps_best() {
        let store = store();
        store.record_attempt("t", attempt(30.0, "alice")).await.unwrap();
        let record = store.record_attempt("t", attempt(50.0, "bob")).await.unwrap();

        assert_eq!(record.time, Some(30.0));
        assert_eq!(record.user.as_deref(), Some("alice"));
        assert_eq!(record.entries.len(), 2);
    }

    #[tokio::test]
    async fn equal_time_keeps_existing_owner() {
        let store = store();
        store.record_attempt("t", attempt(40.0, "alice")).await.unwrap();
        let record = store.record_attempt("t", attempt(40.0, "bob")).await.unwrap();

        assert_eq!(record.user.as_deref(), Some("alice"));
        assert_eq!(record.entries.len(), 2);
    }

    #[tokio::test]
    async fn legacy_record_migrates_on_attempt() {
        let kv = MemoryKvStore::new();
        kv.set(
            "arc-task-legacy",
            r#"{"time":40,"transcript":"x","user":"alice","completed":true}"#,
        )
        .await
        .unwrap();
        let store = CompletionStore::new(Box::new(kv));

        let record = store
            .record_attempt("legacy", attempt(60.0, "bob"))
            .await
            .unwrap();

        assert_eq!(record.time, Some(40.0));
        assert_eq!(record.user.as_deref(), Some("alice"));
        assert_eq!(record.entries.len(), 2);
        assert_eq!(record.entries[0].user, "alice");
        assert_eq!(record.entries[0].transcript, json!("x"));
        assert_eq!(record.entries[1].user, "bob");
    }

    #[tokio::test]
    async fn legacy_without_user_gets_unknown() {
        let kv = MemoryKvStore::new();
        kv.set("arc-task-old", r#"{"time":12.5,"transcript":"x"}"#)
            .await
            .unwrap();
        let store = CompletionStore::new(Box::new(kv));

        let record = store.get_completion("old").await.unwrap().unwrap();
        assert_eq!(record.user.as_deref(), Some(UNKNOWN_USER));
        assert_eq!(record.entries.len(), 1);
        assert_eq!(record.entries[0].user, UNKNOWN_USER);
    }

    #[tokio::test]
    async fn absent_record_is_none_not_error() {
        let store = store();
        assert_eq!(store.get_completion("nowhere").await.unwrap(), None);
        assert!(!store.is_completed("nowhere").await.unwrap());
    }

    #[tokio::test]
    async fn unparsable_record_is_replaced_by_fresh() {
        let kv = MemoryKvStore::new();
        kv.set("arc-task-bad", "not json at all").await.unwrap();
        let store = CompletionStore::new(Box::new(kv));

        let record = store.record_attempt("bad", attempt(20.0, "carol")).await.unwrap();
        assert_eq!(record.entries.len(), 1);
        assert_eq!(record.time, Some(20.0));
    }

    #[tokio::test]
    async fn list_skips_unparsable_and_foreign_keys() {
        let kv = MemoryKvStore::new();
        kv.set("arc-task-bad", "garbage").await.unwrap();
        kv.set("arc-task-leg", r#"{"time":7,"user":"dot"}"#).await.unwrap();
        kv.set("arc-current-user", "alice").await.unwrap();
        let store = CompletionStore::new(Box::new(kv));
        store.record_attempt("good", attempt(9.0, "eve")).await.unwrap();

        let all = store.list_all_completions().await.unwrap();
        let ids: Vec<&str> = all.keys().map(String::as_str).collect();
        assert_eq!(ids, vec!["good", "leg"]);
        assert_eq!(all["leg"].user.as_deref(), Some("dot"));
        assert_eq!(all["good"].time, Some(9.0));
    }

    #[tokio::test]
    async fn failed_write_leaves_prior_state_intact() {
        let fail_writes = Arc::new(AtomicBool::new(false));
        let store = CompletionStore::new(Box::new(FlakyKvStore {
            inner: MemoryKvStore::new(),
            fail_writes: fail_writes.clone(),
        }));

        store.record_attempt("t", attempt(50.0, "alice")).await.unwrap();

        fail_writes.store(true, Ordering::SeqCst);
        assert!(store.record_attempt("t", attempt(30.0, "bob")).await.is_err());

        let record = store.get_completion("t").await.unwrap().unwrap();
        assert_eq!(record.time, Some(50.0));
        assert_eq!(record.user.as_deref(), Some("alice"));
        assert_eq!(record.entries.len(), 1);

        fail_writes.store(false, Ordering::SeqCst);
        let record = store.record_attempt("t", attempt(30.0, "bob")).await.unwrap();
        assert_eq!(record.time, Some(30.0));
        assert_eq!(record.entries.len(), 2);
    }

    #[tokio::test]
    async fn failed_write_is_logged_at_error_level() {
        let errors = Arc::new(AtomicUsize::new(0));
        let subscriber = tracing_subscriber::registry().with(ErrorEventCounter(errors.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let store = CompletionStore::new(Box::new(FlakyKvStore {
            inner: MemoryKvStore::new(),
            fail_writes: Arc::new(AtomicBool::new(true)),
        }));

        assert!(store.record_attempt("t", attempt(10.0, "alice")).await.is_err());
        assert_eq!(errors.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stored_shape_uses_camel_case_task_id() {
        let store = store();
        let record = store.record_attempt("2-evaluation-3", attempt(5.0, "f")).await.unwrap();
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["taskId"], json!("2-evaluation-3"));
        assert!(value["entries"][0]["timestamp"].is_string());
        assert!(value.get("task_id").is_none());
    }

    #[tokio::test]
    async fn current_user_defaults_to_unknown() {
        let store = store();
        assert_eq!(store.current_user().await.unwrap(), UNKNOWN_USER);

        store.set_current_user("zoe").await.unwrap();
        assert_eq!(store.current_user().await.unwrap(), "zoe");
    }

    #[tokio::test]
    async fn legacy_aggregate_backfills_only_missing_ids() {
        let kv = MemoryKvStore::new();
        kv.set(
            "arcCompletionData",
            r#"{
                "1-training-0": {"time": 12, "transcript": "x", "user": "carol"},
                "1-training-1": {"time": 99, "transcript": "y", "user": "mallory"}
            }"#,
        )
        .await
        .unwrap();
        let store = CompletionStore::new(Box::new(kv));
        store
            .record_attempt("1-training-1", attempt(8.0, "alice"))
            .await
            .unwrap();

        let imported = store.import_legacy_aggregate().await.unwrap();
        assert_eq!(imported, 1);

        let backfilled = store.get_completion("1-training-0").await.unwrap().unwrap();
        assert_eq!(backfilled.user.as_deref(), Some("carol"));
        assert_eq!(backfilled.time, Some(12.0));

        // The freshly recorded attempt was not overwritten.
        let kept = store.get_completion("1-training-1").await.unwrap().unwrap();
        assert_eq!(kept.user.as_deref(), Some("alice"));
        assert_eq!(kept.time, Some(8.0));
    }

    #[test]
    fn migrate_defaults_user_and_timestamp() {
        let legacy = LegacyRecord {
            task_id: None,
            time: 31.0,
            transcript: json!(null),
            user: None,
            completed: true,
            timestamp: None,
        };
        let now = Utc::now();
        let record = migrate_legacy("t", legacy, now);

        assert_eq!(record.task_id, "t");
        assert_eq!(record.time, Some(31.0));
        assert_eq!(record.user.as_deref(), Some(UNKNOWN_USER));
        assert_eq!(record.entries.len(), 1);
        assert_eq!(record.entries[0].timestamp, now);
    }
}
