//! Summarizer run: recompute every indexed version's summary from its reports.

use crate::layout::index_key;
use crate::pipeline::ToolError;
use crate::settings::Settings;
use anyhow::Context;
use backoffice_render::{OverviewRow, render_overview_md, render_summary_md};
use backoffice_reports::{load_reports, report_dir, summary_path};
use backoffice_store::{Store, join_key, load_json, save_json};
use backoffice_summarize::{SummarizeOptions, summarize};
use backoffice_types::file_names;
use backoffice_types::index::{Index, IndexEntryStatus};
use backoffice_types::summary::CompatibilitySummary;
use tracing::{debug, info, warn};

/// A version that could not be summarized completely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizeFailure {
    pub id: String,
    pub version: String,
    pub message: String,
}

/// Outcome of `run_summarize`.
#[derive(Debug, Clone, Default)]
pub struct SummarizeOutcome {
    /// Versions whose summary was recomputed.
    pub summarized: usize,
    /// Summaries that changed and were rewritten.
    pub written: usize,
    pub failures: Vec<SummarizeFailure>,
}

/// Summarize every indexed version and render `<reports_root>/overview.md`.
///
/// Reads only the reports present when each directory is listed and never
/// blocks writers; a report landing mid-run is picked up next time. Summaries
/// are rewritten only when their content changed.
pub fn run_summarize(settings: &Settings, store: &dyn Store) -> Result<SummarizeOutcome, ToolError> {
    let index: Index = load_json(store, index_key())?
        .with_context(|| format!("{} not found; run `index` first", store.location(index_key())))?;
    let opts = SummarizeOptions {
        core_tool: settings.core_tool.clone(),
    };

    let mut outcome = SummarizeOutcome::default();
    let mut rows: Vec<(&str, &str, CompatibilitySummary)> = Vec::new();

    for item in &index.items {
        for v in &item.versions {
            if v.status == IndexEntryStatus::Error {
                debug!(resource = %item.id, version = %v.version, "skipping version without manifest");
                continue;
            }
            match summarize_version(settings, store, &opts, &item.id, &v.version) {
                Ok(done) => {
                    outcome.summarized += 1;
                    if done.written {
                        outcome.written += 1;
                    }
                    if !done.summary.skipped.is_empty() {
                        outcome.failures.push(SummarizeFailure {
                            id: item.id.clone(),
                            version: v.version.clone(),
                            message: format!(
                                "{} unreadable report(s)",
                                done.summary.skipped.len()
                            ),
                        });
                    }
                    rows.push((item.id.as_str(), v.version.as_str(), done.summary));
                }
                Err(e) => {
                    warn!(resource = %item.id, version = %v.version, error = %format!("{e:#}"), "failed to summarize");
                    outcome.failures.push(SummarizeFailure {
                        id: item.id.clone(),
                        version: v.version.clone(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }
    }

    let overview_rows: Vec<OverviewRow<'_>> = rows
        .iter()
        .map(|(id, version, summary)| OverviewRow {
            id,
            version,
            summary,
        })
        .collect();
    let overview_key = join_key(&[&settings.reports_root, file_names::OVERVIEW]);
    store
        .put(&overview_key, render_overview_md(&overview_rows).as_bytes())
        .context("write overview")?;

    info!(
        summarized = outcome.summarized,
        written = outcome.written,
        failed = outcome.failures.len(),
        "summarized reports"
    );
    Ok(outcome)
}

/// Result of summarizing one version.
#[derive(Debug, Clone)]
pub struct VersionSummary {
    pub summary: CompatibilitySummary,
    pub written: bool,
}

/// Recompute and (if changed) rewrite one version's summary.
pub fn summarize_version(
    settings: &Settings,
    store: &dyn Store,
    opts: &SummarizeOptions,
    id: &str,
    version: &str,
) -> anyhow::Result<VersionSummary> {
    let key = summary_path(&settings.reports_root, id, version);
    let existing: Option<CompatibilitySummary> = load_json(store, &key)?;
    let scaffold = match &existing {
        Some(existing) => existing.clone(),
        None => {
            warn!(path = %store.location(&key), "summary scaffold missing; summarizing without manifest");
            CompatibilitySummary::default()
        }
    };

    let reports = load_reports(store, &settings.reports_root, id, version)?;
    let summary = summarize(&scaffold, &reports, opts);

    let written = existing.as_ref() != Some(&summary);
    if written {
        save_json(store, &key, &summary).with_context(|| format!("write {key}"))?;
        let md_key = join_key(&[&report_dir(&settings.reports_root, id, version), "summary.md"]);
        store.put(&md_key, render_summary_md(id, version, &summary).as_bytes())?;
        debug!(path = %store.location(&key), status = ?summary.status, "wrote summary");
    }

    Ok(VersionSummary { summary, written })
}
