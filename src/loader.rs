//! Task loading and catalog navigation.
//!
//! The [`TaskLoader`] sits between a [`TaskSource`] and the session: it
//! caches catalog listings per version and subset, resolves an index (or a
//! step from the current index, or a random pick) to a concrete task, and
//! packages the result with the navigation context the session manager
//! needs. Local files bypass the catalog entirely.

use rand::Rng;
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

use crate::catalog::{ArcVersion, CatalogEntry, CatalogError, Subset, TaskRef, TaskSource};
use crate::session::{Direction, LoadContext};
use crate::task::{Task, TaskError};

/// Errors from task loading and catalog navigation.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Stepping past either end of the subset. Reported separately from
    /// other failures so the caller can say "reached the last task"
    /// instead of showing a generic error.
    #[error("{}", exhausted_message(.direction))]
    NavigationExhausted { direction: Direction },

    #[error("{} {} subset lists no tasks", .version.display_name(), .subset)]
    EmptySubset { version: ArcVersion, subset: Subset },

    #[error("task index {index} is out of range ({count} tasks in subset)")]
    IndexOutOfRange { index: usize, count: usize },

    #[error("failed to read task file {path}: {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    #[error(transparent)]
    Malformed(#[from] TaskError),
}

fn exhausted_message(direction: &Direction) -> &'static str {
    match direction {
        Direction::Next => "already at the last task of the subset",
        Direction::Previous => "already at the first task of the subset",
    }
}

/// A task resolved and fetched, ready to hand to the session manager.
#[derive(Debug, Clone)]
pub struct LoadedTask {
    pub task: Task,
    /// Where the task came from; its `storage_id` keys the completion
    /// record.
    pub reference: TaskRef,
    /// Context patch for [`SessionManager::load_task`]. Empty for file
    /// imports, which have no catalog position.
    ///
    /// [`SessionManager::load_task`]: crate::session::SessionManager::load_task
    pub context: LoadContext,
}

/// Resolves catalog positions to fetched tasks.
///
/// Listings are fetched once per `(version, subset)` and kept until the
/// version changes.
pub struct TaskLoader {
    source: Box<dyn TaskSource>,
    version: ArcVersion,
    catalogs: HashMap<(ArcVersion, Subset), Vec<CatalogEntry>>,
}

impl TaskLoader {
    pub fn new(source: Box<dyn TaskSource>) -> Self {
        Self::with_version(source, ArcVersion::default())
    }

    pub fn with_version(source: Box<dyn TaskSource>, version: ArcVersion) -> Self {
        Self {
            source,
            version,
            catalogs: HashMap::new(),
        }
    }

    pub fn version(&self) -> ArcVersion {
        self.version
    }

    /// Switch collections. Cached listings are dropped so the next load
    /// fetches fresh ones.
    pub fn set_version(&mut self, version: ArcVersion) {
        if version != self.version {
            tracing::info!("Switching catalog to {}", version.display_name());
            self.version = version;
            self.catalogs.clear();
        }
    }

    /// Number of tasks listed in `subset`, fetching the listing if needed.
    pub async fn task_count(&mut self, subset: Subset) -> Result<usize, LoadError> {
        self.ensure_catalog(subset).await?;
        Ok(self.cached(subset).len())
    }

    /// Fetch the task at `index` within `subset`.
    pub async fn load_by_index(
        &mut self,
        subset: Subset,
        index: usize,
    ) -> Result<LoadedTask, LoadError> {
        self.ensure_catalog(subset).await?;
        let entries = self.cached(subset);
        let count = entries.len();
        if count == 0 {
            return Err(LoadError::EmptySubset {
                version: self.version,
                subset,
            });
        }
        let entry = entries
            .get(index)
            .cloned()
            .ok_or(LoadError::IndexOutOfRange { index, count })?;

        let task = self.source.fetch_task(&entry).await?;
        tracing::info!(
            "Loaded task '{}' ({}/{} in {} {})",
            task.name,
            index + 1,
            count,
            self.version.display_name(),
            subset
        );

        Ok(LoadedTask {
            task,
            reference: TaskRef::Catalog {
                version: self.version,
                subset,
                index,
            },
            context: LoadContext {
                subset: Some(subset),
                task_index: Some(index),
                total_task_count: Some(count),
            },
        })
    }

    /// Fetch the task one step from `current_index` in `direction`.
    ///
    /// With no current position, `Next` starts at the first task. Stepping
    /// past either end fails with [`LoadError::NavigationExhausted`] and
    /// fetches nothing.
    pub async fn load_adjacent(
        &mut self,
        subset: Subset,
        current_index: Option<usize>,
        direction: Direction,
    ) -> Result<LoadedTask, LoadError> {
        self.ensure_catalog(subset).await?;
        let count = self.cached(subset).len();
        if count == 0 {
            return Err(LoadError::EmptySubset {
                version: self.version,
                subset,
            });
        }

        let target = match direction {
            Direction::Next => match current_index {
                None => 0,
                Some(i) if i + 1 < count => i + 1,
                Some(_) => return Err(LoadError::NavigationExhausted { direction }),
            },
            Direction::Previous => match current_index {
                Some(i) if i > 0 => i - 1,
                _ => return Err(LoadError::NavigationExhausted { direction }),
            },
        };
        self.load_by_index(subset, target).await
    }

    /// Fetch a uniformly random task from `subset`.
    pub async fn load_random(&mut self, subset: Subset) -> Result<LoadedTask, LoadError> {
        self.ensure_catalog(subset).await?;
        let count = self.cached(subset).len();
        if count == 0 {
            return Err(LoadError::EmptySubset {
                version: self.version,
                subset,
            });
        }
        let index = rand::thread_rng().gen_range(0..count);
        self.load_by_index(subset, index).await
    }

    async fn ensure_catalog(&mut self, subset: Subset) -> Result<(), LoadError> {
        let key = (self.version, subset);
        if !self.catalogs.contains_key(&key) {
            let entries = self.source.fetch_catalog(self.version, subset).await?;
            self.catalogs.insert(key, entries);
        }
        Ok(())
    }

    fn cached(&self, subset: Subset) -> &[CatalogEntry] {
        self.catalogs
            .get(&(self.version, subset))
            .map(|entries| entries.as_slice())
            .unwrap_or(&[])
    }
}

/// Read and validate a task from a local JSON file. The filename becomes
/// the task name; there is no catalog context.
pub async fn import_file(path: &Path) -> Result<LoadedTask, LoadError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| LoadError::FileRead {
            path: path.display().to_string(),
            source,
        })?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "imported".to_string());
    import_json(&name, &contents)
}

/// Validate an already-read task payload under a display name.
pub fn import_json(name: &str, json: &str) -> Result<LoadedTask, LoadError> {
    let task = Task::from_json_str(name, json)?;
    tracing::info!("Imported task '{}' from local data", task.name);
    Ok(LoadedTask {
        task,
        reference: TaskRef::File {
            name: name.to_string(),
        },
        context: LoadContext::default(),
    })
}
