//! `collection.json`: one entry per resource for the website.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionMode {
    #[default]
    Published,
    Draft,
}

impl CollectionMode {
    pub fn file_name(self) -> &'static str {
        match self {
            CollectionMode::Published => "collection.json",
            CollectionMode::Draft => "collection_draft.json",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub schema: String,
    pub mode: CollectionMode,
    pub collection: Vec<CollectionEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionEntry {
    pub id: String,
    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(rename = "type")]
    pub type_: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub license: Option<String>,

    #[serde(default)]
    pub authors: serde_json::Value,

    #[serde(default)]
    pub tags: Vec<String>,

    /// `staged/<n>` or the publish number.
    pub version: String,

    /// Published version numbers.
    #[serde(default)]
    pub versions: Vec<u32>,

    #[serde(default)]
    pub staged_versions: Vec<String>,

    pub rdf_source: String,
    pub rdf_sha256: String,

    /// Lifecycle state name of staged entries, `published` otherwise.
    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub concept_doi: Option<String>,
}
