use backoffice_adapter_sdk::Manifest;
use backoffice_core::adapters::{FixedClock, InMemoryCatalog, InMemoryManifests, SystemClock};
use backoffice_core::index::{ScaffoldState, initialize_report_dir, run_index};
use backoffice_core::ports::{CatalogEntry, CatalogListing, CatalogSource, CatalogVersion};
use backoffice_core::settings::{Settings, ToolSettings};
use backoffice_hash::sha256_hex;
use backoffice_store::{MemoryStore, Store, load_json};
use backoffice_types::index::{Index, IndexEntryStatus};
use backoffice_types::summary::CompatibilitySummary;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;

const SHARK: &str = "type: model\nname: affable shark\n";
const SQUID: &str = "type: model\nname: shy squid\n";
const ZEBRA: &str = "type: dataset\nname: zebra stripes\n";

fn clock() -> FixedClock {
    FixedClock(Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap())
}

fn version(v: &str, source: &str, sha256: Option<String>) -> CatalogVersion {
    CatalogVersion {
        version: v.to_string(),
        comment: None,
        created_at: None,
        source: source.to_string(),
        sha256,
    }
}

fn entry(id: &str, type_: &str, versions: Vec<CatalogVersion>) -> CatalogEntry {
    CatalogEntry {
        id: id.to_string(),
        type_: type_.to_string(),
        versions,
    }
}

fn settings() -> Settings {
    let mut settings = Settings::default();
    settings.tools.insert(
        "ilastik".to_string(),
        ToolSettings {
            applicable_types: vec!["model".to_string()],
        },
    );
    settings
        .tools
        .insert("bioimageio.core".to_string(), ToolSettings::default());
    settings
}

fn catalog() -> InMemoryCatalog {
    InMemoryCatalog::new(vec![
        entry(
            "shy-squid",
            "model",
            vec![version("v1", "squid.yaml", Some(sha256_hex(SQUID.as_bytes())))],
        ),
        entry(
            "affable-shark",
            "model",
            vec![version("v1", "shark.yaml", Some(sha256_hex(SHARK.as_bytes())))],
        ),
        entry(
            "zebra-stripes",
            "dataset",
            vec![version("v1", "zebra.yaml", Some("0".repeat(64)))],
        ),
    ])
}

fn manifests() -> InMemoryManifests {
    InMemoryManifests::new()
        .with("shark.yaml", SHARK)
        .with("squid.yaml", SQUID)
        .with("zebra.yaml", ZEBRA)
}

#[test]
fn bad_hash_is_recorded_and_the_rest_is_indexed() {
    let store = MemoryStore::new();
    let outcome = run_index(&settings(), &store, &catalog(), &manifests(), &clock()).unwrap();

    assert_eq!(outcome.created, 2);
    assert_eq!(outcome.failed(), 1);

    let index: Index = load_json(&store, "index.json").unwrap().unwrap();
    let ids: Vec<&str> = index.items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["affable-shark", "shy-squid", "zebra-stripes"]);
    assert_eq!(index.total, 3);
    assert_eq!(index.count_per_type["model"], 2);

    let zebra = index.find("zebra-stripes").unwrap();
    assert_eq!(zebra.versions[0].status, IndexEntryStatus::Error);
    assert!(zebra.versions[0].error.as_deref().unwrap().contains("sha256 mismatch"));
    assert_eq!(zebra.versions[0].sha256, None);
    assert_eq!(zebra.tools, vec!["bioimageio.core"]);

    let shark = index.find("affable-shark").unwrap();
    assert_eq!(shark.tools, vec!["bioimageio.core", "ilastik"]);
    assert_eq!(shark.versions[0].sha256.as_deref(), Some(sha256_hex(SHARK.as_bytes()).as_str()));

    let scaffold: CompatibilitySummary = load_json(&store, "reports/affable-shark/v1/summary.json")
        .unwrap()
        .unwrap();
    assert_eq!(scaffold.rdf_yaml_sha256, sha256_hex(SHARK.as_bytes()));
    assert_eq!(scaffold.rdf_content["name"], "affable shark");
    assert!(!store.exists("reports/zebra-stripes/v1/summary.json").unwrap());
}

#[test]
fn rerun_on_unchanged_catalog_creates_nothing() {
    let store = MemoryStore::new();
    run_index(&settings(), &store, &catalog(), &manifests(), &clock()).unwrap();
    let first = store.get("index.json").unwrap().unwrap();

    let outcome = run_index(&settings(), &store, &catalog(), &manifests(), &clock()).unwrap();
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.unchanged, 2);
    assert_eq!(outcome.reinitialized, 0);
    assert_eq!(store.get("index.json").unwrap().unwrap(), first);
}

#[test]
fn changed_manifest_wipes_stale_reports() {
    let store = MemoryStore::new();
    let old = Manifest::parse("shark.yaml", SHARK.as_bytes().to_vec()).unwrap();
    assert_eq!(
        initialize_report_dir(&store, "reports", "affable-shark", "v1", &old).unwrap(),
        ScaffoldState::Created
    );
    store
        .put(
            "reports/affable-shark/v1/reports/ilastik_1.4.json",
            br#"{"status": "passed"}"#,
        )
        .unwrap();

    let new = Manifest::parse("shark.yaml", b"type: model\nname: renamed\n".to_vec()).unwrap();
    assert_eq!(
        initialize_report_dir(&store, "reports", "affable-shark", "v1", &new).unwrap(),
        ScaffoldState::Reinitialized
    );
    assert_eq!(store.keys(), vec!["reports/affable-shark/v1/summary.json"]);

    assert_eq!(
        initialize_report_dir(&store, "reports", "affable-shark", "v1", &new).unwrap(),
        ScaffoldState::Unchanged
    );
}

#[test]
fn unreachable_manifest_does_not_abort_the_run() {
    let store = MemoryStore::new();
    let catalog = InMemoryCatalog::new(vec![entry(
        "affable-shark",
        "model",
        vec![version("v1", "shark.yaml", None), version("v2", "gone.yaml", None)],
    )]);
    let outcome = run_index(
        &Settings::default(),
        &store,
        &catalog,
        &manifests(),
        &SystemClock,
    )
    .unwrap();

    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.failed(), 1);
    let failed: Vec<&str> = outcome
        .index
        .failed_versions()
        .map(|(_, v)| v.version.as_str())
        .collect();
    assert_eq!(failed, vec!["v2"]);
}

/// Delegates to a [`MemoryStore`] but refuses writes under one key fragment.
#[derive(Debug)]
struct RefusingStore {
    inner: MemoryStore,
    refuse: &'static str,
}

impl Store for RefusingStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<Vec<u8>>> {
        self.inner.get(key)
    }

    fn put(&self, key: &str, contents: &[u8]) -> anyhow::Result<()> {
        if key.contains(self.refuse) {
            anyhow::bail!("disk full writing {key}");
        }
        self.inner.put(key, contents)
    }

    fn list_files(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        self.inner.list_files(prefix)
    }

    fn list_dirs(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        self.inner.list_dirs(prefix)
    }

    fn list_recursive(&self, prefix: &str) -> anyhow::Result<Vec<String>> {
        self.inner.list_recursive(prefix)
    }

    fn remove_prefix(&self, prefix: &str) -> anyhow::Result<()> {
        self.inner.remove_prefix(prefix)
    }

    fn location(&self, key: &str) -> String {
        self.inner.location(key)
    }
}

#[test]
fn scaffold_write_failure_is_recorded_and_the_rest_is_indexed() {
    let store = RefusingStore {
        inner: MemoryStore::new(),
        refuse: "bad-one",
    };
    let catalog = InMemoryCatalog::new(vec![
        entry("a-good", "model", vec![version("v1", "shark.yaml", None)]),
        entry("bad-one", "model", vec![version("v1", "squid.yaml", None)]),
        entry("c-good", "model", vec![version("v1", "squid.yaml", None)]),
    ]);

    let outcome = run_index(&settings(), &store, &catalog, &manifests(), &clock()).unwrap();

    assert_eq!(outcome.created, 2);
    assert_eq!(outcome.failed(), 1);
    let (item, failed) = outcome.index.failed_versions().next().unwrap();
    assert_eq!(item.id, "bad-one");
    assert_eq!(failed.sha256, None);
    assert!(failed.error.as_deref().unwrap().contains("disk full"));

    let written: Index = load_json(&store, "index.json").unwrap().unwrap();
    assert_eq!(written.total, 3);
    assert!(store.exists("reports/a-good/v1/summary.json").unwrap());
    assert!(store.exists("reports/c-good/v1/summary.json").unwrap());
}

#[test]
fn escaping_resource_id_is_recorded_without_writing() {
    let store = MemoryStore::new();
    let catalog = InMemoryCatalog::new(vec![
        entry("../../escaped", "model", vec![version("v1", "shark.yaml", None)]),
        entry("affable-shark", "model", vec![version("v1", "shark.yaml", None)]),
    ]);

    let outcome = run_index(&settings(), &store, &catalog, &manifests(), &clock()).unwrap();

    assert_eq!(outcome.failed(), 1);
    let (item, failed) = outcome.index.failed_versions().next().unwrap();
    assert_eq!(item.id, "../../escaped");
    assert!(failed.error.as_deref().unwrap().contains("invalid resource id"));
    assert!(store.keys().iter().all(|k| !k.contains("escaped")));
}

/// A catalog whose listing stopped short of the announced total.
struct TruncatedCatalog;

impl CatalogSource for TruncatedCatalog {
    fn list(&self) -> anyhow::Result<CatalogListing> {
        Ok(CatalogListing {
            entries: vec![entry("affable-shark", "model", vec![version("v1", "shark.yaml", None)])],
            missing: 2,
        })
    }
}

#[test]
fn incomplete_catalog_listing_is_counted() {
    let store = MemoryStore::new();
    let outcome = run_index(&settings(), &store, &TruncatedCatalog, &manifests(), &clock()).unwrap();

    assert_eq!(outcome.missing, 2);
    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.failed(), 0);
    assert!(store.exists("index.json").unwrap());
}
