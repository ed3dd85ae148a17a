use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Top-level `index.json`: every known (resource, version) pair.
///
/// Rebuilt wholesale from the upstream catalog on each index run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Index {
    #[serde(default = "default_index_schema")]
    pub schema: String,

    pub items: Vec<IndexItem>,

    pub total: usize,

    #[serde(default)]
    pub count_per_type: BTreeMap<String, usize>,

    pub timestamp: DateTime<Utc>,
}

fn default_index_schema() -> String {
    crate::schema::BACKOFFICE_INDEX_V1.to_string()
}

impl Index {
    pub fn new(mut items: Vec<IndexItem>, timestamp: DateTime<Utc>) -> Self {
        items.sort_by(|a, b| a.id.cmp(&b.id));

        let mut count_per_type = BTreeMap::new();
        for item in &items {
            *count_per_type.entry(item.type_.clone()).or_insert(0) += 1;
        }

        Self {
            schema: default_index_schema(),
            total: items.len(),
            items,
            count_per_type,
            timestamp,
        }
    }

    pub fn version_count(&self) -> usize {
        self.items.iter().map(|i| i.versions.len()).sum()
    }

    /// Versions whose manifest could not be fetched or verified.
    pub fn failed_versions(&self) -> impl Iterator<Item = (&IndexItem, &IndexItemVersion)> {
        self.items.iter().flat_map(|item| {
            item.versions
                .iter()
                .filter(|v| v.status == IndexEntryStatus::Error)
                .map(move |v| (item, v))
        })
    }

    pub fn find(&self, id: &str) -> Option<&IndexItem> {
        self.items.iter().find(|i| i.id == id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexItem {
    pub id: String,

    #[serde(rename = "type")]
    pub type_: String,

    /// Tools applicable to this resource type (CI matrix input).
    #[serde(default)]
    pub tools: Vec<String>,

    pub versions: Vec<IndexItemVersion>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexItemVersion {
    pub version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    /// Manifest location.
    pub source: String,

    /// SHA-256 of the fetched manifest; absent when fetching failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,

    #[serde(default)]
    pub status: IndexEntryStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexEntryStatus {
    #[default]
    Ok,
    Error,
}
