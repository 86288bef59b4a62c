//! Task source backed by the GitHub contents API.

use super::{ArcVersion, CatalogEntry, CatalogError, Subset, TaskSource};
use crate::task::Task;
use async_trait::async_trait;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;

const ARC1_CONTENTS_URL: &str = "https://api.github.com/repos/fchollet/ARC/contents/data";
const ARC2_CONTENTS_URL: &str = "https://api.github.com/repos/arcprize/ARC-AGI-2/contents/data";

// GitHub rejects API requests that carry no user agent.
const CLIENT_USER_AGENT: &str = concat!("arclab/", env!("CARGO_PKG_VERSION"));

/// Listing item as the contents API returns it. Directories carry no
/// download URL.
#[derive(Debug, Deserialize)]
struct ContentsItem {
    name: String,
    download_url: Option<String>,
}

/// Fetches catalog listings and task payloads from the published ARC
/// repositories on GitHub.
pub struct GithubTaskSource {
    client: Client,
}

impl GithubTaskSource {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }

    /// Use a preconfigured client, e.g. one with a proxy or custom timeouts.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    fn contents_url(version: ArcVersion) -> &'static str {
        match version {
            ArcVersion::V1 => ARC1_CONTENTS_URL,
            ArcVersion::V2 => ARC2_CONTENTS_URL,
        }
    }

    /// Keep only real files from a listing; directories have no payload.
    fn file_entries(items: Vec<ContentsItem>) -> Vec<CatalogEntry> {
        items
            .into_iter()
            .filter_map(|item| {
                item.download_url.map(|download_url| CatalogEntry {
                    name: item.name,
                    download_url,
                })
            })
            .collect()
    }
}

impl Default for GithubTaskSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TaskSource for GithubTaskSource {
    async fn fetch_catalog(
        &self,
        version: ArcVersion,
        subset: Subset,
    ) -> Result<Vec<CatalogEntry>, CatalogError> {
        let url = format!("{}/{}", Self::contents_url(version), subset);
        tracing::debug!("Fetching catalog listing from {}", url);

        let response = self
            .client
            .get(&url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url,
                status: status.as_u16(),
            });
        }

        let items: Vec<ContentsItem> = response.json().await?;
        let entries = Self::file_entries(items);
        tracing::debug!(
            "Catalog {} {} lists {} tasks",
            version.display_name(),
            subset,
            entries.len()
        );
        Ok(entries)
    }

    async fn fetch_task(&self, entry: &CatalogEntry) -> Result<Task, CatalogError> {
        tracing::debug!("Fetching task {} from {}", entry.name, entry.download_url);

        let response = self
            .client
            .get(&entry.download_url)
            .header(USER_AGENT, CLIENT_USER_AGENT)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CatalogError::Status {
                url: entry.download_url.clone(),
                status: status.as_u16(),
            });
        }

        let value: serde_json::Value = response.json().await?;
        Ok(Task::from_value(entry.name.as_str(), value)?)
    }
}
