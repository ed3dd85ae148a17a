use backoffice_adapter_sdk::{
    CheckContext, CheckOptions, FnToolCheck, ManifestCache, ManifestSource, ToolCheck,
    check_tool_compatibility,
};
use backoffice_hash::sha256_hex;
use backoffice_reports::{ToolIdentity, load_reports};
use backoffice_store::{MemoryStore, Store};
use backoffice_types::index::{Index, IndexEntryStatus, IndexItem, IndexItemVersion};
use backoffice_types::report::{ReportStatus, ToolCompatibilityReport};
use camino::Utf8PathBuf;
use chrono::{TimeZone, Utc};
use pretty_assertions::assert_eq;
use std::cell::Cell;
use std::collections::BTreeMap;

const MODEL: &[u8] = b"type: model\nname: shark\n";
const DATASET: &[u8] = b"type: dataset\nname: cells\n";

#[derive(Default)]
struct MapSource {
    files: BTreeMap<String, Vec<u8>>,
    calls: Cell<usize>,
}

impl ManifestSource for MapSource {
    fn fetch(&self, source: &str) -> anyhow::Result<Vec<u8>> {
        self.calls.set(self.calls.get() + 1);
        self.files
            .get(source)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("404 {source}"))
    }
}

fn version(v: &str, source: &str, bytes: &[u8]) -> IndexItemVersion {
    IndexItemVersion {
        version: v.to_string(),
        comment: None,
        created_at: None,
        source: source.to_string(),
        sha256: Some(sha256_hex(bytes)),
        status: IndexEntryStatus::Ok,
        error: None,
    }
}

fn item(id: &str, type_: &str, versions: Vec<IndexItemVersion>) -> IndexItem {
    IndexItem {
        id: id.to_string(),
        type_: type_.to_string(),
        tools: vec![],
        versions,
    }
}

fn fixture() -> (Index, MapSource) {
    let mut source = MapSource::default();
    source.files.insert("mem://shark/1".into(), MODEL.to_vec());
    source.files.insert("mem://shark/2".into(), MODEL.to_vec());
    source.files.insert("mem://cells/1".into(), DATASET.to_vec());

    let index = Index::new(
        vec![
            item(
                "affable-shark",
                "model",
                vec![
                    version("1", "mem://shark/1", MODEL),
                    version("2", "mem://shark/2", MODEL),
                ],
            ),
            item("cells", "dataset", vec![version("1", "mem://cells/1", DATASET)]),
        ],
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    );
    (index, source)
}

fn cache_dir() -> (tempfile::TempDir, ManifestCache) {
    let temp = tempfile::tempdir().expect("tempdir");
    let dir = Utf8PathBuf::from_path_buf(temp.path().join("manifests")).unwrap();
    (temp, ManifestCache::new(dir))
}

fn passing_check() -> impl ToolCheck {
    FnToolCheck::new(
        ToolIdentity::new("ilastik", "1.4.1").unwrap(),
        vec!["model".to_string()],
        |ctx: &CheckContext<'_>| {
            assert!(ctx.manifest.path.exists());
            assert_eq!(ctx.manifest.manifest.type_(), Some("model"));
            Ok(ToolCompatibilityReport::new(ReportStatus::Passed))
        },
    )
}

fn opts() -> CheckOptions {
    CheckOptions {
        reports_root: "reports".to_string(),
        id_prefix: String::new(),
    }
}

#[test]
fn writes_reports_for_applicable_versions_only() {
    let (index, source) = fixture();
    let (_temp, mut cache) = cache_dir();
    let store = MemoryStore::new();

    let run =
        check_tool_compatibility(&store, &index, &passing_check(), &source, &mut cache, &opts())
            .unwrap();

    assert_eq!(
        run.written,
        vec![
            "reports/affable-shark/1/reports/ilastik_1.4.1.json",
            "reports/affable-shark/2/reports/ilastik_1.4.1.json",
        ]
    );
    assert!(!run.has_failures());

    // Identical manifests are fetched once per batch.
    assert_eq!(source.calls.get(), 1);
    assert_eq!(cache.fetches(), 1);

    let loaded = load_reports(&store, "reports", "affable-shark", "1").unwrap();
    let report = loaded[0].report.as_ref().unwrap();
    assert_eq!(report.tool.as_deref(), Some("ilastik"));
    assert_eq!(report.tool_version.as_deref(), Some("1.4.1"));
    assert!(report.timestamp.is_some());
}

#[test]
fn existing_reports_are_not_recomputed() {
    let (index, source) = fixture();
    let (_temp, mut cache) = cache_dir();
    let store = MemoryStore::new();
    store
        .put(
            "reports/affable-shark/1/reports/ilastik_1.4.1.json",
            br#"{"status": "failed"}"#,
        )
        .unwrap();

    let run =
        check_tool_compatibility(&store, &index, &passing_check(), &source, &mut cache, &opts())
            .unwrap();
    assert_eq!(run.existing, 1);
    assert_eq!(run.written.len(), 1);

    let kept = store
        .get("reports/affable-shark/1/reports/ilastik_1.4.1.json")
        .unwrap()
        .unwrap();
    assert_eq!(kept, br#"{"status": "failed"}"#.to_vec());
}

#[test]
fn failing_checks_and_bad_hashes_do_not_stop_the_batch() {
    let (mut index, source) = fixture();
    index.items[0].versions[1].sha256 = Some("00".repeat(32));
    let (_temp, mut cache) = cache_dir();
    let store = MemoryStore::new();

    let check = FnToolCheck::new(
        ToolIdentity::new("careamics", "0.1").unwrap(),
        vec![],
        |ctx: &CheckContext<'_>| {
            if ctx.item_type == "dataset" {
                anyhow::bail!("cannot load dataset");
            }
            Ok(ToolCompatibilityReport::new(ReportStatus::NotApplicable))
        },
    );

    let run = check_tool_compatibility(&store, &index, &check, &source, &mut cache, &opts())
        .unwrap();

    assert_eq!(run.written, vec!["reports/affable-shark/1/reports/careamics_0.1.json"]);
    let failed: Vec<(&str, &str)> = run
        .failures
        .iter()
        .map(|f| (f.id.as_str(), f.version.as_str()))
        .collect();
    assert_eq!(failed, vec![("affable-shark", "2"), ("cells", "1")]);
    assert!(run.failures[0].message.contains("sha256 mismatch"));
    assert!(run.failures[1].message.contains("cannot load dataset"));
}

#[test]
fn id_prefix_limits_the_batch() {
    let (index, source) = fixture();
    let (_temp, mut cache) = cache_dir();
    let store = MemoryStore::new();
    let check = FnToolCheck::new(ToolIdentity::new("biapy", "3.5").unwrap(), vec![], |_: &CheckContext<'_>| {
        Ok(ToolCompatibilityReport::new(ReportStatus::Passed))
    });

    let opts = CheckOptions {
        id_prefix: "cel".to_string(),
        ..opts()
    };
    let run = check_tool_compatibility(&store, &index, &check, &source, &mut cache, &opts).unwrap();
    assert_eq!(run.written, vec!["reports/cells/1/reports/biapy_3.5.json"]);
}
