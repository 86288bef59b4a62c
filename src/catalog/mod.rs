//! Puzzle catalog vocabulary and the remote task source.
//!
//! Tasks live in two published collections (ARC 1 and ARC 2), each split
//! into a training and an evaluation subset. A catalog listing gives the
//! task filenames and where to download each payload; the [`TaskSource`]
//! trait abstracts the transport so tests can script listings without a
//! network.

mod github;

pub use github::GithubTaskSource;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::task::{Task, TaskError};

/// Errors from catalog listing and task download.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("catalog request for {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error(transparent)]
    Malformed(#[from] TaskError),
}

/// Published ARC collection version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ArcVersion {
    #[serde(rename = "1")]
    V1,
    #[default]
    #[serde(rename = "2")]
    V2,
}

impl ArcVersion {
    /// Human-facing collection name.
    pub fn display_name(&self) -> &'static str {
        match self {
            ArcVersion::V1 => "ARC 1",
            ArcVersion::V2 => "ARC 2",
        }
    }

    /// Map a numeric selector to a version. Anything unrecognized falls
    /// back to the current collection.
    pub fn from_number(n: u32) -> Self {
        match n {
            1 => ArcVersion::V1,
            _ => ArcVersion::V2,
        }
    }
}

impl fmt::Display for ArcVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArcVersion::V1 => write!(f, "1"),
            ArcVersion::V2 => write!(f, "2"),
        }
    }
}

/// Subset of a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subset {
    #[default]
    Training,
    Evaluation,
}

impl Subset {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subset::Training => "training",
            Subset::Evaluation => "evaluation",
        }
    }
}

impl fmt::Display for Subset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a catalog listing: the task filename and where to fetch
/// its payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub name: String,
    pub download_url: String,
}

/// External identity of a task: either a position in a versioned catalog
/// subset, or the name of a locally imported file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TaskRef {
    Catalog {
        version: ArcVersion,
        subset: Subset,
        index: usize,
    },
    File {
        name: String,
    },
}

impl TaskRef {
    /// Stable id used to key this task's completion record.
    ///
    /// Catalog tasks use `{version}-{subset}-{index}` so the same puzzle
    /// always maps to the same record; imported files use their sanitized
    /// filename.
    pub fn storage_id(&self) -> String {
        match self {
            TaskRef::Catalog {
                version,
                subset,
                index,
            } => format!("{}-{}-{}", version, subset, index),
            TaskRef::File { name } => sanitize_task_name(name),
        }
    }
}

impl fmt::Display for TaskRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.storage_id())
    }
}

/// Sanitize a filename for use as a storage id. Keeps alphanumerics and
/// a few safe punctuation characters, replaces the rest.
fn sanitize_task_name(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c == '.' || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "task".to_string()
    } else {
        sanitized
    }
}

/// Source of catalog listings and task payloads.
///
/// Implementations own the transport and do not retry; callers decide what
/// a failed fetch means for them.
#[async_trait]
pub trait TaskSource: Send + Sync {
    /// List the tasks available in one subset of a collection.
    async fn fetch_catalog(
        &self,
        version: ArcVersion,
        subset: Subset,
    ) -> Result<Vec<CatalogEntry>, CatalogError>;

    /// Download and validate a single task payload.
    async fn fetch_task(&self, entry: &CatalogEntry) -> Result<Task, CatalogError>;
}
