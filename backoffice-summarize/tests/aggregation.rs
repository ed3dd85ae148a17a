use backoffice_reports::{LoadedReport, ReportLoadError, ToolIdentity};
use backoffice_summarize::{SummarizeOptions, summarize};
use backoffice_types::report::{ReportStatus, ToolCompatibilityReport};
use backoffice_types::summary::{CompatibilitySummary, SummaryStatus};
use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, hour, 0, 0).unwrap()
}

fn loaded(tool: &str, version: &str, report: ToolCompatibilityReport) -> LoadedReport {
    let identity = ToolIdentity::new(tool, version).unwrap();
    LoadedReport {
        path: format!("reports/m/1/reports/{}", identity.file_name()),
        identity: Some(identity),
        report: Ok(report),
    }
}

fn status(s: ReportStatus) -> ToolCompatibilityReport {
    ToolCompatibilityReport::new(s)
}

fn scaffold() -> CompatibilitySummary {
    CompatibilitySummary::scaffold(serde_json::json!({"name": "m"}), "abc123")
}

fn run(reports: &[LoadedReport]) -> CompatibilitySummary {
    summarize(&scaffold(), reports, &SummarizeOptions::default())
}

#[test]
fn not_applicable_is_excluded_from_the_score() {
    let summary = run(&[
        loaded("toolA", "1.0", status(ReportStatus::Passed)),
        loaded("toolB", "1.0", status(ReportStatus::Failed)),
        loaded("toolC", "1.0", status(ReportStatus::NotApplicable)),
    ]);

    assert_eq!(summary.scores.passed, 1);
    assert_eq!(summary.scores.definitive, 2);
    assert_eq!(summary.scores.overall, Some(0.5));
    assert_eq!(summary.status, SummaryStatus::Failed);
    assert_eq!(summary.tools.len(), 3);
    assert_eq!(summary.rdf_yaml_sha256, "abc123");
}

#[test]
fn most_favorable_status_wins_over_recency() {
    let summary = run(&[
        loaded("toolA", "1.0", status(ReportStatus::Failed).with_timestamp(at(2))),
        loaded("toolA", "1.1", status(ReportStatus::Passed).with_timestamp(at(1))),
    ]);

    let verdict = &summary.tools["toola"];
    assert_eq!(verdict.status, ReportStatus::Passed);
    assert_eq!(verdict.report, "toolA_1.1");
    assert_eq!(verdict.reports, 2);
    assert_eq!(summary.status, SummaryStatus::Passed);
    assert_eq!(summary.tests["toola"].len(), 2);
}

#[test]
fn ties_keep_the_most_recent_report() {
    let older = ToolCompatibilityReport::failed("old failure").with_timestamp(at(1));
    let newer = ToolCompatibilityReport::failed("new failure").with_timestamp(at(5));
    let summary = run(&[loaded("toolA", "2.0", older), loaded("toolA", "1.0", newer)]);

    let verdict = &summary.tools["toola"];
    assert_eq!(verdict.status, ReportStatus::Failed);
    assert_eq!(verdict.error.as_deref(), Some("new failure"));
    assert_eq!(verdict.timestamp, Some(at(5)));
    assert_eq!(verdict.tool_version, "1.0");
}

#[test]
fn error_ranks_with_failed_and_missing_timestamps_are_oldest() {
    let summary = run(&[
        loaded("toolA", "1.0", status(ReportStatus::Error)),
        loaded("toolA", "0.9", status(ReportStatus::Failed).with_timestamp(at(0))),
    ]);
    assert_eq!(summary.tools["toola"].tool_version, "0.9");
}

#[test]
fn no_reports_means_untested() {
    let summary = run(&[]);
    assert_eq!(summary.status, SummaryStatus::Untested);
    assert_eq!(summary.scores.overall, None);
    assert!(summary.tools.is_empty());

    let only_na = run(&[loaded("toolC", "1.0", status(ReportStatus::NotApplicable))]);
    assert_eq!(only_na.status, SummaryStatus::Untested);
    assert_eq!(only_na.scores.definitive, 0);
}

#[test]
fn unreadable_reports_are_listed_but_do_not_block_scores() {
    let broken = LoadedReport {
        path: "reports/m/1/reports/toolB_1.0.json".to_string(),
        identity: Some(ToolIdentity::new("toolB", "1.0").unwrap()),
        report: Err(ReportLoadError::Json {
            message: "expected value at line 1".to_string(),
        }),
    };
    let summary = run(&[loaded("toolA", "1.0", status(ReportStatus::Passed)), broken]);

    assert_eq!(summary.scores.overall, Some(1.0));
    assert!(!summary.tools.contains_key("toolb"));
    assert_eq!(summary.skipped.len(), 1);
    assert_eq!(summary.skipped[0].path, "reports/m/1/reports/toolB_1.0.json");
    assert!(summary.skipped[0].reason.contains("json parse error"));
}

#[test]
fn tool_names_group_case_insensitively() {
    let summary = run(&[
        loaded("ilastik", "1.4.0", status(ReportStatus::Failed)),
        loaded("Ilastik", "1.4.1", status(ReportStatus::Passed)),
    ]);
    assert_eq!(summary.tools.len(), 1);
    assert_eq!(summary.tools["ilastik"].report, "Ilastik_1.4.1");
}

#[test]
fn metadata_scores_come_from_the_core_tool() {
    let core = |completeness: f64, details_status: &str| {
        let mut report = status(ReportStatus::Passed);
        report.details = Some(serde_json::json!({
            "metadata_completeness": completeness,
            "status": details_status,
        }));
        report
    };

    let older_valid = run(&[
        loaded("bioimageio.core", "0.9.2", core(0.6, "valid-format")),
        loaded("bioimageio.core", "0.9.10", core(0.4, "failed")),
    ]);
    assert_eq!(older_valid.scores.metadata_completeness, 0.6);
    assert_eq!(older_valid.scores.metadata_format, 0.5);

    let newest_valid = run(&[
        loaded("bioimageio.core", "0.9.2", core(0.6, "failed")),
        loaded("bioimageio.core", "0.9.10", core(0.4, "passed")),
    ]);
    assert_eq!(newest_valid.scores.metadata_format, 1.0);

    let other_tool = run(&[loaded("ilastik", "1.0", core(0.9, "passed"))]);
    assert_eq!(other_tool.scores.metadata_completeness, 0.0);
    assert_eq!(other_tool.scores.metadata_format, 0.0);
}

#[test]
fn resummarizing_is_byte_identical() {
    let reports = vec![
        loaded("toolA", "1.0", status(ReportStatus::Passed).with_timestamp(at(3))),
        loaded("toolB", "2.0", ToolCompatibilityReport::failed("boom")),
    ];
    let first = run(&reports);
    let second = summarize(&first, &reports, &SummarizeOptions::default());

    assert_eq!(
        serde_json::to_string_pretty(&first).unwrap(),
        serde_json::to_string_pretty(&second).unwrap()
    );
}
