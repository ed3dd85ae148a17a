//! Default port implementations: HTTP catalog, URL/file manifest fetcher,
//! directory packages, and in-memory variants for embedding and tests.

use crate::ports::{
    CatalogEntry, CatalogListing, CatalogSource, CatalogVersion, Clock, ManifestFetcher,
    PackageSource, Reviewer, ReviewerDirectory,
};
use crate::settings::CatalogSettings;
use anyhow::{Context, anyhow, bail};
use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fs_err as fs;
use std::collections::BTreeMap;

/// Strip the query string, which may carry tokens or signatures.
pub fn hide_query(url: &str) -> &str {
    url.split_once('?').map_or(url, |(base, _)| base)
}

#[cfg(feature = "http")]
mod http {
    use super::*;
    use serde::Deserialize;
    use std::io::Read;
    use std::time::Duration;
    use tracing::{debug, error};

    const MAX_PAGES: usize = 100;

    #[derive(Debug, Deserialize)]
    struct ListPage {
        #[serde(default)]
        items: Vec<ListedArtifact>,
        #[serde(default)]
        total: usize,
    }

    #[derive(Debug, Deserialize)]
    struct ListedArtifact {
        id: String,
        #[serde(rename = "type", default)]
        type_: Option<String>,
        #[serde(default)]
        versions: Vec<ListedVersion>,
    }

    #[derive(Debug, Deserialize)]
    struct ListedVersion {
        version: String,
        #[serde(default)]
        comment: Option<String>,
        /// Unix seconds or RFC 3339.
        #[serde(default)]
        created_at: Option<serde_json::Value>,
    }

    fn parse_created_at(value: &serde_json::Value) -> Option<DateTime<Utc>> {
        match value {
            serde_json::Value::Number(n) => {
                let secs = n.as_f64()?;
                DateTime::from_timestamp(secs.trunc() as i64, 0)
            }
            serde_json::Value::String(s) => DateTime::parse_from_rfc3339(s)
                .ok()
                .map(|t| t.with_timezone(&Utc)),
            _ => None,
        }
    }

    fn get(
        url: &str,
        query: &[(&str, String)],
        token: Option<&str>,
        timeout: Duration,
    ) -> anyhow::Result<Vec<u8>> {
        let mut req = ureq::get(url)
            .config()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        for (key, value) in query {
            req = req.query(*key, value);
        }
        if let Some(token) = token {
            req = req.header("Authorization", &format!("Bearer {token}"));
        }

        let resp = req
            .call()
            .map_err(|e| anyhow!("http GET {}: {e}", hide_query(url)))?;
        let status: u16 = resp.status().into();
        let mut body = Vec::new();
        resp.into_body()
            .into_reader()
            .read_to_end(&mut body)
            .with_context(|| format!("read response of {}", hide_query(url)))?;
        if !(200..300).contains(&status) {
            bail!("http GET {} failed with status {status}", hide_query(url));
        }
        Ok(body)
    }

    /// Lists resources from the artifact-manager service of the catalog.
    #[derive(Debug, Clone)]
    pub struct HttpCatalog {
        settings: CatalogSettings,
    }

    impl HttpCatalog {
        pub fn new(settings: CatalogSettings) -> Self {
            Self { settings }
        }

        fn base(&self) -> &str {
            self.settings.base_url.trim_end_matches('/')
        }

        /// Download location of the manifest of one version.
        pub fn manifest_url(&self, id: &str, version: &str) -> String {
            let (domain, rest) = match id.split_once('/') {
                Some((domain, rest)) => (domain, rest),
                None => (
                    self.settings
                        .parent_id
                        .split_once('/')
                        .map_or(self.settings.parent_id.as_str(), |(d, _)| d),
                    id,
                ),
            };
            format!(
                "{}/{domain}/artifacts/{rest}/files/rdf.yaml?version={version}",
                self.base()
            )
        }

        fn fetch_all(&self) -> anyhow::Result<(Vec<ListedArtifact>, usize)> {
            let url = format!("{}/public/services/artifact-manager/list", self.base());
            let timeout = Duration::from_secs(self.settings.http_timeout_secs);
            let limit = self.settings.page_limit.max(1);

            collect_pages(|offset| {
                let query = [
                    ("parent_id", self.settings.parent_id.clone()),
                    ("offset", offset.to_string()),
                    ("pagination", "true".to_string()),
                    ("limit", limit.to_string()),
                ];
                let body = get(&url, &query, self.settings.token.as_deref(), timeout)?;
                serde_json::from_slice(&body).context("parse catalog listing")
            })
        }
    }

    /// Page through a listing, asking each page to start after the items received so far.
    ///
    /// The service may cap the page size below the requested limit. Returns the
    /// items and how many of the announced total never arrived.
    fn collect_pages(
        mut fetch_page: impl FnMut(usize) -> anyhow::Result<ListPage>,
    ) -> anyhow::Result<(Vec<ListedArtifact>, usize)> {
        let mut items = Vec::new();
        let mut total = 0;
        for _ in 0..MAX_PAGES {
            let page = fetch_page(items.len())?;
            debug!(offset = items.len(), received = page.items.len(), total = page.total, "catalog page");

            let received = page.items.len();
            total = page.total;
            items.extend(page.items);
            if received == 0 || items.len() >= total {
                break;
            }
        }
        if total != items.len() {
            error!(
                total,
                received = items.len(),
                "catalog reported a different number of items than it returned"
            );
        }
        let missing = total.saturating_sub(items.len());
        Ok((items, missing))
    }

    impl CatalogSource for HttpCatalog {
        fn list(&self) -> anyhow::Result<CatalogListing> {
            let (artifacts, missing) = self
                .fetch_all()
                .with_context(|| format!("list catalog {}", self.settings.parent_id))?;
            let entries = artifacts
                .into_iter()
                .map(|a| CatalogEntry {
                    type_: a.type_.unwrap_or_else(|| "model".to_string()),
                    versions: a
                        .versions
                        .into_iter()
                        .map(|v| CatalogVersion {
                            source: self.manifest_url(&a.id, &v.version),
                            created_at: v.created_at.as_ref().and_then(parse_created_at),
                            comment: v.comment,
                            version: v.version,
                            sha256: None,
                        })
                        .collect(),
                    id: a.id,
                })
                .collect();
            Ok(CatalogListing { entries, missing })
        }
    }

    pub(super) fn fetch_url(
        url: &str,
        token: Option<&str>,
        timeout: Duration,
    ) -> anyhow::Result<Vec<u8>> {
        get(url, &[], token, timeout)
    }

}

#[cfg(feature = "http")]
pub use http::HttpCatalog;

/// Reads a catalog listing (a JSON array of entries) from disk.
#[derive(Debug, Clone)]
pub struct JsonFileCatalog {
    pub path: Utf8PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<Utf8PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl CatalogSource for JsonFileCatalog {
    fn list(&self) -> anyhow::Result<CatalogListing> {
        let bytes = fs::read(&self.path)?;
        let entries: Vec<CatalogEntry> = serde_json::from_slice(&bytes)
            .with_context(|| format!("parse catalog {}", self.path))?;
        Ok(entries.into())
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    entries: Vec<CatalogEntry>,
}

impl InMemoryCatalog {
    pub fn new(entries: Vec<CatalogEntry>) -> Self {
        Self { entries }
    }
}

impl CatalogSource for InMemoryCatalog {
    fn list(&self) -> anyhow::Result<CatalogListing> {
        Ok(self.entries.clone().into())
    }
}

/// Fetches manifests from `http(s)://` URLs, `file://` URLs or local paths.
#[derive(Debug, Clone)]
pub struct UrlManifestFetcher {
    pub token: Option<String>,
    pub http_timeout_secs: u64,
}

impl UrlManifestFetcher {
    pub fn new(token: Option<String>, http_timeout_secs: u64) -> Self {
        Self {
            token,
            http_timeout_secs,
        }
    }
}

impl ManifestFetcher for UrlManifestFetcher {
    fn fetch(&self, source: &str) -> anyhow::Result<Vec<u8>> {
        if source.starts_with("http://") || source.starts_with("https://") {
            #[cfg(feature = "http")]
            {
                return http::fetch_url(
                    source,
                    self.token.as_deref(),
                    std::time::Duration::from_secs(self.http_timeout_secs),
                );
            }
            #[cfg(not(feature = "http"))]
            bail!(
                "cannot fetch {}: built without the `http` feature",
                hide_query(source)
            );
        }
        let path = source.strip_prefix("file://").unwrap_or(source);
        Ok(fs::read(path)?)
    }
}

/// Manifest bytes keyed by source, for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct InMemoryManifests {
    manifests: BTreeMap<String, Vec<u8>>,
}

impl InMemoryManifests {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, source: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.manifests.insert(source.into(), bytes.into());
        self
    }
}

impl ManifestFetcher for InMemoryManifests {
    fn fetch(&self, source: &str) -> anyhow::Result<Vec<u8>> {
        self.manifests
            .get(source)
            .cloned()
            .ok_or_else(|| anyhow!("not found: {}", hide_query(source)))
    }
}

/// A fixed list of reviewers (from configuration).
#[derive(Debug, Clone, Default)]
pub struct StaticReviewers {
    reviewers: Vec<Reviewer>,
}

impl StaticReviewers {
    pub fn new(reviewers: Vec<Reviewer>) -> Self {
        Self { reviewers }
    }
}

impl ReviewerDirectory for StaticReviewers {
    fn reviewers(&self) -> anyhow::Result<Vec<Reviewer>> {
        Ok(self.reviewers.clone())
    }
}

/// An extracted package on local disk.
#[derive(Debug, Clone)]
pub struct DirPackage {
    root: Utf8PathBuf,
}

impl DirPackage {
    pub fn new(root: impl Into<Utf8PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }
}

impl PackageSource for DirPackage {
    fn list(&self) -> anyhow::Result<Vec<String>> {
        if !self.root.is_dir() {
            bail!("package directory {} does not exist", self.root);
        }
        let pattern = self.root.join("**").join("*");
        let mut files = Vec::new();
        for entry in glob::glob(pattern.as_str()).context("build package glob")? {
            let path = entry.context("walk package")?;
            if !path.is_file() {
                continue;
            }
            let rel = path
                .strip_prefix(self.root.as_std_path())
                .with_context(|| format!("{} escapes {}", path.display(), self.root))?;
            let rel = Utf8Path::from_path(rel)
                .with_context(|| format!("non-utf8 file name {}", rel.display()))?;
            files.push(rel.as_str().replace('\\', "/"));
        }
        files.sort();
        Ok(files)
    }

    fn read(&self, rel: &str) -> anyhow::Result<Vec<u8>> {
        Ok(fs::read(self.root.join(rel))?)
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryPackage {
    files: BTreeMap<String, Vec<u8>>,
}

impl InMemoryPackage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, rel: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        self.files.insert(rel.into(), bytes.into());
        self
    }
}

impl PackageSource for InMemoryPackage {
    fn list(&self) -> anyhow::Result<Vec<String>> {
        Ok(self.files.keys().cloned().collect())
    }

    fn read(&self, rel: &str) -> anyhow::Result<Vec<u8>> {
        self.files
            .get(rel)
            .cloned()
            .ok_or_else(|| anyhow!("{rel} is not part of the package"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Always returns the same instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn hide_query_drops_everything_after_question_mark() {
        assert_eq!(
            hide_query("https://s3.example/bucket/x.json?X-Amz-Signature=secret"),
            "https://s3.example/bucket/x.json"
        );
        assert_eq!(hide_query("/local/path"), "/local/path");
    }

    #[test]
    fn dir_package_lists_nested_files_sorted() {
        let temp = TempDir::new().expect("temp dir");
        let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).expect("utf8");
        std::fs::create_dir_all(root.join("weights")).expect("mkdir");
        std::fs::write(root.join("rdf.yaml"), "name: x\n").expect("write");
        std::fs::write(root.join("weights").join("model.pt"), b"\0").expect("write");

        let package = DirPackage::new(root.clone());
        assert_eq!(package.list().unwrap(), vec!["rdf.yaml", "weights/model.pt"]);
        assert_eq!(package.read("rdf.yaml").unwrap(), b"name: x\n");
    }

    #[test]
    fn dir_package_missing_root_is_an_error() {
        let package = DirPackage::new("/definitely/not/here");
        assert!(package.list().is_err());
    }

    #[test]
    fn url_fetcher_reads_file_urls_and_paths() {
        let temp = TempDir::new().expect("temp dir");
        let path = temp.path().join("rdf.yaml");
        std::fs::write(&path, "type: model\n").expect("write");
        let path = path.to_str().expect("utf8");

        let fetcher = UrlManifestFetcher::new(None, 5);
        assert_eq!(fetcher.fetch(path).unwrap(), b"type: model\n");
        assert_eq!(
            fetcher.fetch(&format!("file://{path}")).unwrap(),
            b"type: model\n"
        );
    }

    #[test]
    fn json_file_catalog_parses_entries() {
        let temp = TempDir::new().expect("temp dir");
        let path = Utf8PathBuf::from_path_buf(temp.path().join("catalog.json")).expect("utf8");
        std::fs::write(
            &path,
            r#"[{"id": "a", "type": "model", "versions": [{"version": "v1", "source": "a.yaml"}]}]"#,
        )
        .expect("write");

        let listing = JsonFileCatalog::new(path).list().unwrap();
        assert_eq!(listing.missing, 0);
        let entries = listing.entries;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].versions[0].source, "a.yaml");
        assert_eq!(entries[0].versions[0].sha256, None);
    }
}
