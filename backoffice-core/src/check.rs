//! Tool-check runs driven by the index or by a staged draft.

use crate::layout::{files_dir, index_key};
use crate::pipeline::ToolError;
use crate::ports::ManifestFetcher;
use crate::settings::Settings;
use crate::staging::{MANIFEST_NAMES, Staging};
use anyhow::{Context, anyhow};
use backoffice_adapter_sdk::{
    CheckOptions, CheckRun, Manifest, ManifestCache, ManifestSource, ToolCheck,
    check_tool_compatibility, check_version,
};
use backoffice_reports::validate_resource_id;
use backoffice_store::{Store, join_key, load_json};
use backoffice_types::index::{Index, IndexEntryStatus, IndexItemVersion};
use backoffice_types::versions::{StageNumber, VersionLabel};
use tracing::{info, warn};

/// Reads manifests straight from the store; the source is the store key.
struct StoreManifests<'a>(&'a dyn Store);

impl ManifestSource for StoreManifests<'_> {
    fn fetch(&self, source: &str) -> anyhow::Result<Vec<u8>> {
        self.0
            .get(source)?
            .with_context(|| format!("{} not found", self.0.location(source)))
    }
}

fn load_index(store: &dyn Store) -> anyhow::Result<Index> {
    load_json(store, index_key())?
        .with_context(|| format!("{} not found; run `index` first", store.location(index_key())))
}

/// Run `check` over every applicable indexed version that has no report yet.
pub fn run_check_tool(
    settings: &Settings,
    store: &dyn Store,
    check: &dyn ToolCheck,
    fetcher: &dyn ManifestFetcher,
    cache: &mut ManifestCache,
    id_prefix: &str,
) -> Result<CheckRun, ToolError> {
    let index = load_index(store)?;
    let opts = CheckOptions {
        reports_root: settings.reports_root.clone(),
        id_prefix: id_prefix.to_string(),
    };
    Ok(check_tool_compatibility(
        store, &index, check, fetcher, cache, &opts,
    )?)
}

/// Check one indexed version, replacing any existing report of this tool version.
pub fn run_test(
    settings: &Settings,
    store: &dyn Store,
    check: &dyn ToolCheck,
    fetcher: &dyn ManifestFetcher,
    cache: &mut ManifestCache,
    id: &str,
    version: &str,
) -> Result<String, ToolError> {
    validate_resource_id(id).map_err(anyhow::Error::from)?;
    let index = load_index(store)?;
    let item = index
        .find(id)
        .ok_or_else(|| anyhow!("{id} is not in the index"))?;
    let indexed = item
        .versions
        .iter()
        .find(|v| v.version == version)
        .ok_or_else(|| anyhow!("{id} has no indexed version {version}"))?;
    if indexed.status == IndexEntryStatus::Error {
        return Err(anyhow!(
            "{id} {version} has no usable manifest: {}",
            indexed.error.as_deref().unwrap_or("unknown error")
        )
        .into());
    }
    if !check.applies_to(&item.type_) {
        return Err(anyhow!("{} does not handle {} resources", check.tool(), item.type_).into());
    }

    Ok(check_version(
        store,
        &settings.reports_root,
        id,
        indexed,
        &item.type_,
        check,
        fetcher,
        cache,
    )?)
}

/// Check staged version `n` of `id` against its manifest in the collection store.
///
/// The draft enters `testing` first; a check that cannot produce a report moves
/// it to `error` and the failure is returned.
pub fn run_staged_test(
    settings: &Settings,
    store: &dyn Store,
    staging: &Staging<'_>,
    check: &dyn ToolCheck,
    cache: &mut ManifestCache,
    id: &str,
    n: StageNumber,
) -> Result<String, ToolError> {
    validate_resource_id(id).map_err(anyhow::Error::from)?;
    let label = VersionLabel::Staged(n);
    let key = join_key(&[
        &files_dir(&settings.collection_root, id, label),
        MANIFEST_NAMES[0],
    ]);
    let source = StoreManifests(store);
    let manifest = Manifest::fetch(&source, &key, None).map_err(anyhow::Error::from)?;
    let item_type = manifest.type_().unwrap_or_default().to_string();
    if !check.applies_to(&item_type) {
        return Err(anyhow!("{} does not handle {item_type:?} resources", check.tool()).into());
    }

    staging.set_testing(id, n, Some(format!("testing with {}", check.tool())))?;
    let version = IndexItemVersion {
        version: label.to_string(),
        comment: None,
        created_at: None,
        source: key,
        sha256: Some(manifest.sha256),
        status: IndexEntryStatus::Ok,
        error: None,
    };
    match check_version(
        store,
        &settings.reports_root,
        id,
        &version,
        &item_type,
        check,
        &source,
        cache,
    ) {
        Ok(path) => {
            info!(resource = %id, version = %label, path = %store.location(&path), "tested staged version");
            Ok(path)
        }
        Err(e) => {
            let message = format!("{} check crashed: {e:#}", check.tool());
            warn!(resource = %id, version = %label, error = %message, "staged test failed");
            staging.record_crash(id, n, &message)?;
            Err(e.into())
        }
    }
}
