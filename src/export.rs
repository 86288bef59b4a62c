//! Completion export.
//!
//! Writes the full completion ledger as indented JSON to a dated file, the
//! same shape a user would expect to re-import or diff across machines.

use chrono::{NaiveDate, Utc};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::completion::CompletionStore;
use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error("failed to serialize completions: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write export file {path}: {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
}

fn export_filename(date: NaiveDate) -> String {
    format!("arc-completions-{}.json", date.format("%Y-%m-%d"))
}

/// Serialize every completion record as indented JSON into `dir`, named
/// with today's date. Returns the path written. Unparsable records were
/// already skipped by the scan, so one bad blob cannot block an export.
pub async fn export_completions(
    store: &CompletionStore,
    dir: &Path,
) -> Result<PathBuf, ExportError> {
    let records = store.list_all_completions().await?;
    let json = serde_json::to_string_pretty(&records)?;

    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|source| ExportError::Write {
            path: dir.display().to_string(),
            source,
        })?;
    let path = dir.join(export_filename(Utc::now().date_naive()));
    tokio::fs::write(&path, json)
        .await
        .map_err(|source| ExportError::Write {
            path: path.display().to_string(),
            source,
        })?;

    tracing::info!(
        "Exported {} completion records to {}",
        records.len(),
        path.display()
    );
    Ok(path)
}
