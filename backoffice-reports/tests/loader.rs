//! Unit tests for the tool report loader.

use backoffice_reports::{ReportLoadError, load_reports, tool_report_path};
use backoffice_store::{FsStore, MemoryStore, Store};
use backoffice_types::report::ReportStatus;
use camino::Utf8PathBuf;
use pretty_assertions::assert_eq;

const ROOT: &str = "reports";

fn put_report(store: &dyn Store, tool: &str, tool_version: &str, contents: &str) {
    let path = tool_report_path(ROOT, "affable-shark", "1", tool, tool_version).unwrap();
    store.put(&path, contents.as_bytes()).unwrap();
}

fn passed() -> &'static str {
    r#"{ "status": "passed", "details": { "metadata_completeness": 0.5 } }"#
}

#[test]
fn test_missing_reports_dir() {
    let store = MemoryStore::new();
    let reports = load_reports(&store, ROOT, "affable-shark", "1").unwrap();
    assert!(reports.is_empty());
}

#[test]
fn test_reports_sorted_deterministically() {
    let store = MemoryStore::new();
    put_report(&store, "zebra", "1.0", passed());
    put_report(&store, "alpha", "2.0", passed());
    put_report(&store, "middle", "0.1", passed());

    let reports = load_reports(&store, ROOT, "affable-shark", "1").unwrap();
    let names: Vec<String> = reports.iter().filter_map(|r| r.report_name()).collect();
    assert_eq!(names, vec!["alpha_2.0", "middle_0.1", "zebra_1.0"]);
    assert!(reports.iter().all(|r| r.report.is_ok()));
}

#[test]
fn test_corrupt_report_is_collected_not_fatal() {
    let store = MemoryStore::new();
    put_report(&store, "good", "1.0", passed());
    put_report(&store, "bad", "1.0", "{ not json");

    let reports = load_reports(&store, ROOT, "affable-shark", "1").unwrap();
    assert_eq!(reports.len(), 2);

    let bad = &reports[0];
    assert_eq!(bad.identity.as_ref().unwrap().name, "bad");
    assert!(matches!(bad.report, Err(ReportLoadError::Json { .. })));

    let good = reports[1].report.as_ref().unwrap();
    assert_eq!(good.status, ReportStatus::Passed);
    assert_eq!(good.metadata_completeness(), Some(0.5));
}

#[test]
fn test_non_canonical_names_are_flagged() {
    let store = MemoryStore::new();
    store
        .put("reports/affable-shark/1/reports/noversion.json", passed().as_bytes())
        .unwrap();
    store
        .put("reports/affable-shark/1/reports/notes.txt", b"ignored")
        .unwrap();

    let reports = load_reports(&store, ROOT, "affable-shark", "1").unwrap();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].identity.is_none());
    assert!(matches!(
        reports[0].report,
        Err(ReportLoadError::InvalidName { .. })
    ));
}

#[test]
fn test_unknown_status_is_a_parse_error() {
    let store = MemoryStore::new();
    put_report(&store, "tool", "1.0", r#"{ "status": "green" }"#);

    let reports = load_reports(&store, ROOT, "affable-shark", "1").unwrap();
    assert!(matches!(reports[0].report, Err(ReportLoadError::Json { .. })));
}

#[test]
fn test_filesystem_store_ignores_in_flight_temp_files() {
    let temp = tempfile::tempdir().expect("tempdir");
    let root = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
    let store = FsStore::new(root.clone());
    put_report(&store, "ilastik", "1.4.1", passed());

    let reports_dir = root.join("reports/affable-shark/1/reports");
    std::fs::write(reports_dir.join(".careamics_0.1.json.42.0.tmp"), "{").unwrap();

    let reports = load_reports(&store, ROOT, "affable-shark", "1").unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(
        reports[0].path,
        "reports/affable-shark/1/reports/ilastik_1.4.1.json"
    );
}
