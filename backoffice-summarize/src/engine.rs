use crate::version::compare_versions;
use backoffice_reports::{LoadedReport, ToolIdentity};
use backoffice_types::report::{ReportStatus, ToolCompatibilityReport};
use backoffice_types::summary::{
    CompatibilityScores, CompatibilitySummary, SkippedReport, SummaryStatus, ToolVerdict,
};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Tool whose reports feed the metadata scores.
pub const DEFAULT_CORE_TOOL: &str = "bioimageio.core";

const VALID_FORMAT_STATUSES: [&str; 2] = ["passed", "valid-format"];

#[derive(Debug, Clone)]
pub struct SummarizeOptions {
    pub core_tool: String,
}

impl Default for SummarizeOptions {
    fn default() -> Self {
        Self {
            core_tool: DEFAULT_CORE_TOOL.to_string(),
        }
    }
}

/// A successfully parsed report with its file-name identity.
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    path: &'a str,
    identity: &'a ToolIdentity,
    report: &'a ToolCompatibilityReport,
}

/// Recompute a version summary from the reports currently present.
///
/// The result depends only on the scaffold's manifest fields and the set of
/// reports, never on their enumeration order or the wall clock, so running it
/// again on unchanged inputs serializes to identical bytes.
pub fn summarize(
    scaffold: &CompatibilitySummary,
    reports: &[LoadedReport],
    opts: &SummarizeOptions,
) -> CompatibilitySummary {
    let mut skipped = Vec::new();
    let mut groups: BTreeMap<String, Vec<Candidate<'_>>> = BTreeMap::new();

    for loaded in reports {
        match (&loaded.identity, &loaded.report) {
            (Some(identity), Ok(report)) => {
                groups
                    .entry(identity.group_key())
                    .or_default()
                    .push(Candidate {
                        path: &loaded.path,
                        identity,
                        report,
                    });
            }
            (_, Err(e)) => {
                warn!(path = %loaded.path, error = %e, "skipping unreadable report");
                skipped.push(SkippedReport {
                    path: loaded.path.clone(),
                    reason: e.to_string(),
                });
            }
            (None, Ok(_)) => {
                warn!(path = %loaded.path, "skipping report without tool identity");
                skipped.push(SkippedReport {
                    path: loaded.path.clone(),
                    reason: "report file name does not name a tool and version".to_string(),
                });
            }
        }
    }
    skipped.sort_by(|a, b| a.path.cmp(&b.path).then_with(|| a.reason.cmp(&b.reason)));
    skipped.dedup();

    let mut tools = BTreeMap::new();
    let mut tests = BTreeMap::new();
    for (tool, candidates) in &groups {
        let Some(best) = candidates.iter().copied().max_by(favorability) else {
            continue;
        };
        debug!(
            tool = %tool,
            reports = candidates.len(),
            selected = %best.identity.report_name(),
            status = %best.report.status,
            "selected tool verdict"
        );

        tools.insert(
            tool.clone(),
            ToolVerdict {
                status: best.report.status,
                tool_version: best.identity.version.clone(),
                timestamp: best.report.timestamp,
                error: best.report.error.clone(),
                report: best.identity.report_name(),
                reports: u32::try_from(candidates.len()).unwrap_or(u32::MAX),
            },
        );

        let by_name: BTreeMap<String, ToolCompatibilityReport> = candidates
            .iter()
            .map(|c| (c.identity.report_name(), c.report.clone()))
            .collect();
        tests.insert(tool.clone(), by_name);
    }

    let core = groups
        .get(&opts.core_tool.to_lowercase())
        .map(Vec::as_slice)
        .unwrap_or_default();
    let scores = score(&tools, core);

    CompatibilitySummary {
        schema: scaffold.schema.clone(),
        rdf_content: scaffold.rdf_content.clone(),
        rdf_yaml_sha256: scaffold.rdf_yaml_sha256.clone(),
        status: overall_status(&scores),
        tools,
        scores,
        tests,
        skipped,
    }
}

/// Total order over reports of one tool; the maximum is the verdict.
///
/// Most favorable status first, then the newest timestamp (missing counts as
/// oldest), then the newest tool version, then the file path.
fn favorability(a: &Candidate<'_>, b: &Candidate<'_>) -> Ordering {
    a.report
        .status
        .rank()
        .cmp(&b.report.status.rank())
        .then_with(|| a.report.timestamp.cmp(&b.report.timestamp))
        .then_with(|| compare_versions(&a.identity.version, &b.identity.version))
        .then_with(|| a.path.cmp(b.path))
}

fn score(tools: &BTreeMap<String, ToolVerdict>, core: &[Candidate<'_>]) -> CompatibilityScores {
    let passed = count(tools, |s| s == ReportStatus::Passed);
    let definitive = count(tools, ReportStatus::is_definitive);
    let overall = (definitive > 0).then(|| f64::from(passed) / f64::from(definitive));

    CompatibilityScores {
        passed,
        definitive,
        overall,
        metadata_completeness: metadata_completeness(core),
        metadata_format: metadata_format(core),
    }
}

fn count(tools: &BTreeMap<String, ToolVerdict>, pred: impl Fn(ReportStatus) -> bool) -> u32 {
    let n = tools.values().filter(|v| pred(v.status)).count();
    u32::try_from(n).unwrap_or(u32::MAX)
}

fn overall_status(scores: &CompatibilityScores) -> SummaryStatus {
    if scores.definitive == 0 {
        SummaryStatus::Untested
    } else if scores.passed == scores.definitive {
        SummaryStatus::Passed
    } else {
        SummaryStatus::Failed
    }
}

fn metadata_completeness(core: &[Candidate<'_>]) -> f64 {
    core.iter()
        .filter_map(|c| c.report.metadata_completeness())
        .filter(|v| v.is_finite())
        .fold(0.0_f64, f64::max)
        .clamp(0.0, 1.0)
}

/// 1.0 when the newest core tool version validates the format, 0.5 when only
/// an older one does, 0.0 otherwise.
fn metadata_format(core: &[Candidate<'_>]) -> f64 {
    let valid = |c: &Candidate<'_>| {
        c.report
            .details_status()
            .is_some_and(|s| VALID_FORMAT_STATUSES.contains(&s))
    };

    let Some(newest) = core
        .iter()
        .map(|c| c.identity.version.as_str())
        .max_by(|a, b| compare_versions(a, b))
    else {
        return 0.0;
    };

    let newest_valid = core
        .iter()
        .filter(|c| compare_versions(&c.identity.version, newest) == Ordering::Equal)
        .any(valid);
    if newest_valid {
        1.0
    } else if core.iter().any(valid) {
        0.5
    } else {
        0.0
    }
}
