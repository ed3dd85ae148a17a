//! Index builder: enumerate the catalog and seed per-version report scaffolds.

use crate::layout::index_key;
use crate::pipeline::ToolError;
use crate::ports::{CatalogSource, Clock, ManifestFetcher};
use crate::settings::Settings;
use anyhow::Context;
use backoffice_adapter_sdk::Manifest;
use backoffice_reports::{report_dir, summary_path, validate_resource_id};
use backoffice_store::{Store, load_json, save_json};
use backoffice_types::index::{Index, IndexEntryStatus, IndexItem, IndexItemVersion};
use backoffice_types::summary::CompatibilitySummary;
use tracing::{info, warn};

pub use backoffice_adapter_sdk::ManifestError as ManifestFetchError;

/// What happened to a version's report directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaffoldState {
    /// No summary existed; a fresh scaffold was written.
    Created,
    /// The existing summary was built from the same manifest.
    Unchanged,
    /// The manifest changed; stale reports were removed and the scaffold rewritten.
    Reinitialized,
}

/// Outcome of `run_index`.
#[derive(Debug, Clone)]
pub struct IndexOutcome {
    pub index: Index,
    pub created: usize,
    pub unchanged: usize,
    pub reinitialized: usize,
    /// Resources the catalog announced but did not list.
    pub missing: usize,
}

impl IndexOutcome {
    /// Versions recorded with an error marker.
    pub fn failed(&self) -> usize {
        self.index.failed_versions().count()
    }
}

/// Rebuild `index.json` from the catalog.
///
/// A version that cannot be fetched or scaffolded is recorded with
/// `status: error` and the run continues with the remaining versions.
pub fn run_index(
    settings: &Settings,
    store: &dyn Store,
    catalog: &dyn CatalogSource,
    fetcher: &dyn ManifestFetcher,
    clock: &dyn Clock,
) -> Result<IndexOutcome, ToolError> {
    let listing = catalog.list().context("list catalog")?;
    let entries = listing.entries;
    info!(resources = entries.len(), missing = listing.missing, "building index");

    let mut created = 0;
    let mut unchanged = 0;
    let mut reinitialized = 0;
    let mut items = Vec::with_capacity(entries.len());

    for entry in entries {
        let mut versions = Vec::with_capacity(entry.versions.len());
        for v in entry.versions {
            let mut indexed = IndexItemVersion {
                version: v.version,
                comment: v.comment,
                created_at: v.created_at,
                source: v.source,
                sha256: None,
                status: IndexEntryStatus::Ok,
                error: None,
            };

            let scaffolded = validate_resource_id(&entry.id)
                .map_err(anyhow::Error::from)
                .and_then(|()| {
                    Manifest::fetch(fetcher, &indexed.source, v.sha256.as_deref())
                        .map_err(anyhow::Error::from)
                })
                .and_then(|manifest| {
                    initialize_report_dir(
                        store,
                        &settings.reports_root,
                        &entry.id,
                        &indexed.version,
                        &manifest,
                    )
                    .with_context(|| format!("initialize reports of {} {}", entry.id, indexed.version))
                    .map(|state| (manifest, state))
                });

            match scaffolded {
                Ok((manifest, state)) => {
                    match state {
                        ScaffoldState::Created => created += 1,
                        ScaffoldState::Unchanged => unchanged += 1,
                        ScaffoldState::Reinitialized => reinitialized += 1,
                    }
                    indexed.sha256 = Some(manifest.sha256);
                }
                Err(e) => {
                    warn!(resource = %entry.id, version = %indexed.version, error = %format!("{e:#}"), "failed to index version");
                    indexed.status = IndexEntryStatus::Error;
                    indexed.error = Some(format!("{e:#}"));
                }
            }
            versions.push(indexed);
        }

        items.push(IndexItem {
            tools: settings.tools_for(&entry.type_),
            id: entry.id,
            type_: entry.type_,
            versions,
        });
    }

    let index = Index::new(items, clock.now());
    save_json(store, index_key(), &index).context("write index")?;
    info!(
        resources = index.total,
        versions = index.version_count(),
        created,
        reinitialized,
        failed = index.failed_versions().count(),
        "wrote {}",
        store.location(index_key())
    );

    Ok(IndexOutcome {
        index,
        created,
        unchanged,
        reinitialized,
        missing: listing.missing,
    })
}

/// Make sure the version's summary scaffold was built from `manifest`.
pub fn initialize_report_dir(
    store: &dyn Store,
    reports_root: &str,
    id: &str,
    version: &str,
    manifest: &Manifest,
) -> anyhow::Result<ScaffoldState> {
    let key = summary_path(reports_root, id, version);
    let existing = match load_json::<CompatibilitySummary>(store, &key) {
        Ok(existing) => existing,
        Err(e) => {
            warn!(path = %store.location(&key), error = %format!("{e:#}"), "unreadable summary; reinitializing");
            Some(CompatibilitySummary::default())
        }
    };

    let state = match existing {
        Some(summary) if summary.rdf_yaml_sha256 == manifest.sha256 => {
            return Ok(ScaffoldState::Unchanged);
        }
        Some(_) => {
            info!(resource = %id, version = %version, "manifest changed; wiping stale reports");
            store.remove_prefix(&report_dir(reports_root, id, version))?;
            ScaffoldState::Reinitialized
        }
        None => ScaffoldState::Created,
    };

    let scaffold = CompatibilitySummary::scaffold(manifest.content.clone(), &manifest.sha256);
    save_json(store, &key, &scaffold).with_context(|| format!("write scaffold {key}"))?;
    Ok(state)
}
