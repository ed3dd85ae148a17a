use anyhow::Context;
use backoffice_hash::{matches_sha256, sha256_hex};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::debug;

/// Where manifest bytes come from (HTTP catalog, local store, fixtures).
pub trait ManifestSource {
    fn fetch(&self, source: &str) -> anyhow::Result<Vec<u8>>;
}

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("fetch {source_url}: {message}")]
    Fetch { source_url: String, message: String },

    #[error("sha256 mismatch for {source_url}: expected {expected}, got {actual}")]
    HashMismatch {
        source_url: String,
        expected: String,
        actual: String,
    },

    #[error("parse {source_url}: {message}")]
    Parse { source_url: String, message: String },
}

/// A fetched, hash-checked and parsed manifest.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    pub source: String,
    pub sha256: String,
    pub bytes: Vec<u8>,
    /// YAML content as JSON.
    pub content: serde_json::Value,
}

impl Manifest {
    pub fn parse(source: &str, bytes: Vec<u8>) -> Result<Self, ManifestError> {
        let content: serde_json::Value =
            serde_yaml::from_slice(&bytes).map_err(|e| ManifestError::Parse {
                source_url: source.to_string(),
                message: e.to_string(),
            })?;
        if !content.is_object() {
            return Err(ManifestError::Parse {
                source_url: source.to_string(),
                message: "manifest is not a mapping".to_string(),
            });
        }
        Ok(Self {
            source: source.to_string(),
            sha256: sha256_hex(&bytes),
            bytes,
            content,
        })
    }

    /// Fetch, verify against `expected_sha256` (if given) and parse.
    pub fn fetch(
        fetcher: &dyn ManifestSource,
        source: &str,
        expected_sha256: Option<&str>,
    ) -> Result<Self, ManifestError> {
        let bytes = fetcher.fetch(source).map_err(|e| ManifestError::Fetch {
            source_url: source.to_string(),
            message: format!("{e:#}"),
        })?;
        if let Some(expected) = expected_sha256
            && !matches_sha256(&bytes, expected)
        {
            return Err(ManifestError::HashMismatch {
                source_url: source.to_string(),
                expected: expected.trim().to_string(),
                actual: sha256_hex(&bytes),
            });
        }
        Self::parse(source, bytes)
    }

    pub fn type_(&self) -> Option<&str> {
        self.content.get("type")?.as_str()
    }
}

/// A manifest materialized on local disk for tools that take a file path.
#[derive(Debug, Clone)]
pub struct CachedManifest {
    pub path: Utf8PathBuf,
    pub manifest: Manifest,
}

/// Memoizes manifests for one batch of checks.
///
/// Keyed by the expected sha256 when known (identical manifests listed under
/// several versions are fetched once), otherwise by source. Files are written
/// below `dir`, which the caller owns and cleans up.
#[derive(Debug)]
pub struct ManifestCache {
    dir: Utf8PathBuf,
    entries: BTreeMap<String, CachedManifest>,
    fetches: usize,
}

impl ManifestCache {
    pub fn new(dir: impl Into<Utf8PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            entries: BTreeMap::new(),
            fetches: 0,
        }
    }

    pub fn dir(&self) -> &Utf8Path {
        &self.dir
    }

    /// Number of manifests actually fetched (cache misses).
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_or_fetch(
        &mut self,
        fetcher: &dyn ManifestSource,
        source: &str,
        expected_sha256: Option<&str>,
    ) -> anyhow::Result<&CachedManifest> {
        let key = match expected_sha256 {
            Some(sha) if !sha.trim().is_empty() => sha.trim().to_ascii_lowercase(),
            _ => source.to_string(),
        };

        if !self.entries.contains_key(&key) {
            let manifest = Manifest::fetch(fetcher, source, expected_sha256)?;
            self.fetches += 1;

            fs::create_dir_all(&self.dir).with_context(|| format!("create {}", self.dir))?;
            let path = self.dir.join(format!("{}.rdf.yaml", manifest.sha256));
            fs::write(&path, &manifest.bytes).with_context(|| format!("write {path}"))?;
            debug!(source = %source, path = %path, "cached manifest");

            self.entries
                .insert(key.clone(), CachedManifest { path, manifest });
        }

        self.entries
            .get(&key)
            .with_context(|| format!("manifest cache lost entry for {source}"))
    }
}
