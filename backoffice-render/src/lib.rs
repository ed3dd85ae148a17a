//! Rendering helpers (markdown) for human-readable artifacts.

use backoffice_types::log::{Chat, Log};
use backoffice_types::report::ReportStatus;
use backoffice_types::summary::{CompatibilitySummary, SummaryStatus};
use std::collections::BTreeSet;

/// One resource version in the overview table.
#[derive(Debug, Clone, Copy)]
pub struct OverviewRow<'a> {
    pub id: &'a str,
    pub version: &'a str,
    pub summary: &'a CompatibilitySummary,
}

pub fn render_summary_md(id: &str, version: &str, summary: &CompatibilitySummary) -> String {
    let mut out = String::new();
    out.push_str(&format!("# {id} {version}\n\n"));
    out.push_str(&format!("- Status: `{}`\n", summary_status_label(summary.status)));
    out.push_str(&format!(
        "- Score: {} ({} of {} definitive)\n",
        score_label(summary.scores.overall),
        summary.scores.passed,
        summary.scores.definitive
    ));
    out.push_str(&format!(
        "- Metadata completeness: {:.2}\n- Metadata format: {:.1}\n\n",
        summary.scores.metadata_completeness, summary.scores.metadata_format
    ));

    out.push_str("## Tools\n\n");
    if summary.tools.is_empty() {
        out.push_str("_No reports yet._\n");
    } else {
        out.push_str("| Tool | Version | Status | Reports | Error |\n");
        out.push_str("|---|---|---|---|---|\n");
        for (tool, verdict) in &summary.tools {
            out.push_str(&format!(
                "| {} | {} | {} {} | {} | {} |\n",
                cell(tool),
                cell(&verdict.tool_version),
                status_icon(verdict.status),
                verdict.status,
                verdict.reports,
                cell(verdict.error.as_deref().unwrap_or("")),
            ));
        }
    }

    if !summary.skipped.is_empty() {
        out.push_str("\n## Unreadable reports\n\n");
        for s in &summary.skipped {
            out.push_str(&format!("- `{}`: {}\n", s.path, s.reason));
        }
    }
    out
}

/// Table of every version with its overall status and per-tool verdicts.
pub fn render_overview_md(rows: &[OverviewRow<'_>]) -> String {
    let tools: BTreeSet<&str> = rows
        .iter()
        .flat_map(|r| r.summary.tools.keys().map(String::as_str))
        .collect();

    let mut out = String::new();
    out.push_str("# Compatibility overview\n\n");
    if rows.is_empty() {
        out.push_str("_No resources indexed._\n");
        return out;
    }

    out.push_str("| Resource | Version | Status | Score |");
    for tool in &tools {
        out.push_str(&format!(" {} |", cell(tool)));
    }
    out.push_str("\n|---|---|---|---|");
    for _ in &tools {
        out.push_str("---|");
    }
    out.push('\n');

    for row in rows {
        out.push_str(&format!(
            "| {} | {} | {} | {} |",
            cell(row.id),
            cell(row.version),
            summary_status_label(row.summary.status),
            score_label(row.summary.scores.overall),
        ));
        for tool in &tools {
            let mark = row
                .summary
                .tools
                .get(*tool)
                .map(|v| status_icon(v.status))
                .unwrap_or("");
            out.push_str(&format!(" {mark} |"));
        }
        out.push('\n');
    }
    out
}

pub fn render_log_md(log: &Log) -> String {
    let mut out = String::new();
    out.push_str("# Log\n\n");
    if log.entries.is_empty() {
        out.push_str("_No entries._\n");
        return out;
    }
    for entry in &log.entries {
        out.push_str(&format!(
            "- {} {}",
            entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
            entry.message
        ));
        if let Some(url) = &entry.run_url {
            out.push_str(&format!(" ([run]({url}))"));
        }
        out.push('\n');
    }
    out
}

pub fn render_chat_md(chat: &Chat) -> String {
    let mut out = String::from("# Chat\n\n");
    if chat.messages.is_empty() {
        out.push_str("_No messages._\n");
        return out;
    }
    for message in &chat.messages {
        out.push_str(&format!(
            "- {} **{}**: {}\n",
            message.timestamp.format("%Y-%m-%d %H:%M:%S"),
            message.author,
            message.text
        ));
    }
    out
}

fn summary_status_label(s: SummaryStatus) -> &'static str {
    match s {
        SummaryStatus::Passed => "passed",
        SummaryStatus::Failed => "failed",
        SummaryStatus::Untested => "untested",
    }
}

fn status_icon(s: ReportStatus) -> &'static str {
    match s {
        ReportStatus::Passed => "✔️",
        ReportStatus::Failed | ReportStatus::Error => "❌",
        ReportStatus::NotApplicable => "➖",
    }
}

fn score_label(score: Option<f64>) -> String {
    match score {
        Some(s) => format!("{:.0}%", s * 100.0),
        None => "-".to_string(),
    }
}

/// Keep table cells on one line and free of column separators.
fn cell(s: &str) -> String {
    s.replace('|', "\\|").replace(['\n', '\r'], " ")
}
