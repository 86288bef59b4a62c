//! Configuration.
//!
//! Everything is set via environment variables, all optional:
//! - `ARCLAB_DATA_DIR` - Directory for the durable store. Defaults to `$HOME/.arclab`.
//! - `ARCLAB_STORE` - Storage backend: `memory`, `file`, or `sqlite`. Defaults to `file`.
//! - `ARCLAB_ARC_VERSION` - Task collection, `1` or `2`. Defaults to `2`.
//! - `ARCLAB_USER` - Name new attempts are attributed to. Defaults to the stored current user.
//! - `ARCLAB_EXPORT_DIR` - Where completion exports are written. Defaults to the data directory.
//! - `ARCLAB_RETAIN_DRAFTS` - Keep per-pair output drafts when navigating. Defaults to off.

use std::path::PathBuf;
use thiserror::Error;

use crate::catalog::ArcVersion;
use crate::storage::KvStoreType;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Directory holding the durable store.
    pub data_dir: PathBuf,

    /// Storage backend for completion records.
    pub store_type: KvStoreType,

    /// Task collection to browse.
    pub arc_version: ArcVersion,

    /// Overrides the stored current user when set.
    pub user: Option<String>,

    /// Destination directory for completion exports.
    pub export_dir: PathBuf,

    /// Keep each test pair's edited output when navigating between pairs.
    pub retain_drafts: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if `ARCLAB_ARC_VERSION` is not
    /// a number. Unknown version numbers fall back to ARC 2, matching the
    /// catalog's own fallback.
    pub fn from_env() -> Result<Self, ConfigError> {
        let data_dir = std::env::var("ARCLAB_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| default_data_dir());

        let store_type = std::env::var("ARCLAB_STORE")
            .map(|s| KvStoreType::from_str(&s))
            .unwrap_or_default();

        let arc_version = match std::env::var("ARCLAB_ARC_VERSION") {
            Ok(raw) => {
                let n: u32 = raw.parse().map_err(|e| {
                    ConfigError::InvalidValue("ARCLAB_ARC_VERSION".to_string(), format!("{}", e))
                })?;
                ArcVersion::from_number(n)
            }
            Err(_) => ArcVersion::default(),
        };

        let user = std::env::var("ARCLAB_USER").ok().filter(|u| !u.is_empty());

        let export_dir = std::env::var("ARCLAB_EXPORT_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_dir.clone());

        let retain_drafts = std::env::var("ARCLAB_RETAIN_DRAFTS")
            .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);

        Ok(Self {
            data_dir,
            store_type,
            arc_version,
            user,
            export_dir,
            retain_drafts,
        })
    }

    /// Create a config rooted at a specific directory with defaults for
    /// everything else (useful for testing).
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            export_dir: data_dir.clone(),
            data_dir,
            store_type: KvStoreType::default(),
            arc_version: ArcVersion::default(),
            user: None,
            retain_drafts: false,
        }
    }
}

fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".arclab")
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env vars are process-global, so every case shares one test.
    #[test]
    fn version_env_parses_numbers_and_rejects_words() {
        std::env::set_var("ARCLAB_ARC_VERSION", "1");
        let config = Config::from_env().unwrap();
        assert_eq!(config.arc_version, ArcVersion::V1);

        std::env::set_var("ARCLAB_ARC_VERSION", "two");
        let err = Config::from_env().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue(name, _) if name == "ARCLAB_ARC_VERSION"
        ));

        std::env::remove_var("ARCLAB_ARC_VERSION");
    }
}
