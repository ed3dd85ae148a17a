//! `collection.json` / `collection_draft.json` generation.

use crate::layout::{files_dir, versions_key};
use crate::pipeline::ToolError;
use crate::settings::Settings;
use crate::staging::MANIFEST_NAMES;
use anyhow::Context;
use backoffice_hash::sha256_hex;
use backoffice_store::{Store, join_key, load_json, save_json};
use backoffice_types::collection::{Collection, CollectionEntry, CollectionMode};
use backoffice_types::schema::BACKOFFICE_COLLECTION_V1;
use backoffice_types::versions::{LifecycleState, VersionLabel, Versions, staged_label};
use serde_json::Value;
use tracing::{debug, info, warn};

/// Outcome of `generate_collection_json`.
#[derive(Debug, Clone)]
pub struct CollectionOutcome {
    /// Store key the collection was written to.
    pub key: String,
    pub collection: Collection,
    /// Resources skipped because their manifest could not be read.
    pub failed: Vec<String>,
}

/// Write one entry per resource: its latest published version, or in draft
/// mode its latest staged version that is neither published nor superseded.
pub fn generate_collection_json(
    settings: &Settings,
    store: &dyn Store,
    mode: CollectionMode,
) -> Result<CollectionOutcome, ToolError> {
    let root = settings.collection_root.as_str();
    let mut entries = Vec::new();
    let mut failed = Vec::new();

    for dir in store.list_dirs(root)? {
        let Some(versions) = load_json::<Versions>(store, &versions_key(root, &dir))? else {
            debug!(dir = %dir, "no versions.json; skipping");
            continue;
        };
        let Some((label, status)) = select_version(&versions, mode) else {
            continue;
        };
        match entry_for(store, root, &dir, &versions, label, status) {
            Ok(entry) => entries.push(entry),
            Err(e) => {
                warn!(resource = %dir, version = %label, error = %format!("{e:#}"), "skipping collection entry");
                failed.push(dir);
            }
        }
    }

    entries.sort_by(|a, b| a.id.cmp(&b.id));
    let collection = Collection {
        schema: BACKOFFICE_COLLECTION_V1.to_string(),
        mode,
        collection: entries,
    };
    let key = join_key(&[root, mode.file_name()]);
    save_json(store, &key, &collection).context("write collection")?;
    info!(
        entries = collection.collection.len(),
        failed = failed.len(),
        "wrote {}",
        store.location(&key)
    );

    Ok(CollectionOutcome {
        key,
        collection,
        failed,
    })
}

fn select_version(versions: &Versions, mode: CollectionMode) -> Option<(VersionLabel, String)> {
    match mode {
        CollectionMode::Published => versions
            .latest_publish_number()
            .map(|p| (VersionLabel::Published(p), "published".to_string())),
        CollectionMode::Draft => versions
            .staged
            .iter()
            .rev()
            .find(|(_, r)| {
                !matches!(
                    r.status.name,
                    LifecycleState::Published | LifecycleState::Superseded
                )
            })
            .map(|(n, r)| (VersionLabel::Staged(*n), r.status.name.to_string())),
    }
}

fn entry_for(
    store: &dyn Store,
    root: &str,
    dir: &str,
    versions: &Versions,
    label: VersionLabel,
    status: String,
) -> anyhow::Result<CollectionEntry> {
    let key = join_key(&[&files_dir(root, dir, label), MANIFEST_NAMES[0]]);
    let bytes = store
        .get(&key)?
        .with_context(|| format!("{} missing", store.location(&key)))?;
    let manifest: Value = serde_yaml::from_slice(&bytes).with_context(|| format!("parse {key}"))?;
    let text = |field: &str| {
        manifest
            .get(field)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };

    let doi = match label {
        VersionLabel::Published(p) => versions.published.get(&p).and_then(|v| v.doi.clone()),
        VersionLabel::Staged(_) => None,
    };
    let id = match text("id") {
        id if id.is_empty() => dir.to_string(),
        id => id,
    };

    Ok(CollectionEntry {
        id,
        name: text("name"),
        description: text("description"),
        type_: text("type"),
        license: manifest
            .get("license")
            .and_then(Value::as_str)
            .map(str::to_string),
        authors: manifest.get("authors").cloned().unwrap_or(Value::Array(vec![])),
        tags: manifest
            .get("tags")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect(),
        version: label.to_string(),
        versions: versions.published.keys().copied().collect(),
        staged_versions: versions
            .staged
            .iter()
            .filter(|(_, r)| !r.status.name.is_terminal())
            .map(|(n, _)| staged_label(*n))
            .collect(),
        rdf_source: store.location(&key),
        rdf_sha256: sha256_hex(&bytes),
        status,
        doi,
        concept_doi: versions.doi.clone(),
    })
}
