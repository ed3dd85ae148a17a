//! Port traits abstracting all I/O away from the pipelines.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use backoffice_adapter_sdk::ManifestSource as ManifestFetcher;

/// One resource as listed by the upstream catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: String,

    #[serde(rename = "type")]
    pub type_: String,

    pub versions: Vec<CatalogVersion>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogVersion {
    pub version: String,

    #[serde(default)]
    pub comment: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    /// Where the manifest of this version can be fetched.
    pub source: String,

    /// Expected manifest hash, when the catalog publishes one.
    #[serde(default)]
    pub sha256: Option<String>,
}

/// Upstream catalog: the ground truth for which resources and versions exist.
pub trait CatalogSource {
    fn list(&self) -> anyhow::Result<CatalogListing>;
}

/// Entries listed by a [`CatalogSource`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogListing {
    pub entries: Vec<CatalogEntry>,
    /// Resources the catalog announced but did not return.
    pub missing: usize,
}

impl From<Vec<CatalogEntry>> for CatalogListing {
    fn from(entries: Vec<CatalogEntry>) -> Self {
        Self {
            entries,
            missing: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reviewer {
    /// Account id in the catalog service.
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub email: String,

    #[serde(default)]
    pub affiliation: String,

    #[serde(default)]
    pub orcid: String,

    #[serde(default)]
    pub github_user: String,
}

/// The set of users allowed to accept drafts or request changes.
pub trait ReviewerDirectory {
    fn reviewers(&self) -> anyhow::Result<Vec<Reviewer>>;
}

/// An extracted upload: relative file paths and their contents.
pub trait PackageSource {
    /// Relative `/`-separated paths of every file in the package, sorted.
    fn list(&self) -> anyhow::Result<Vec<String>>;

    fn read(&self, rel: &str) -> anyhow::Result<Vec<u8>>;
}

/// Wall clock, injectable for reproducible documents in tests.
pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}
