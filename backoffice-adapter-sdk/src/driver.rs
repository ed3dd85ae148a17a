use crate::check::{CheckContext, ToolCheck};
use crate::manifest::{ManifestCache, ManifestSource};
use anyhow::Context;
use backoffice_reports::tool_report_path;
use backoffice_store::{Store, save_json};
use backoffice_types::index::{Index, IndexEntryStatus, IndexItemVersion};
use backoffice_types::report::ToolCompatibilityReport;
use chrono::Utc;
use tracing::{info, warn};

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Store prefix holding per-version report directories.
    pub reports_root: String,
    /// Only check resources whose id starts with this.
    pub id_prefix: String,
}

/// A version whose check could not produce a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckFailure {
    pub id: String,
    pub version: String,
    pub message: String,
}

#[derive(Debug, Clone, Default)]
pub struct CheckRun {
    /// Store keys of the reports written.
    pub written: Vec<String>,
    /// Versions skipped because a report for this tool version already exists.
    pub existing: usize,
    pub failures: Vec<CheckFailure>,
}

impl CheckRun {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Run `check` over every applicable version in `index`.
///
/// Versions that already have a report for this tool version are skipped, so
/// reruns only fill gaps. A check that fails is recorded and the batch moves on;
/// the version is left without a report (absent, not failed).
pub fn check_tool_compatibility(
    store: &dyn Store,
    index: &Index,
    check: &dyn ToolCheck,
    fetcher: &dyn ManifestSource,
    cache: &mut ManifestCache,
    opts: &CheckOptions,
) -> anyhow::Result<CheckRun> {
    let tool = check.tool();
    let items: Vec<_> = index
        .items
        .iter()
        .filter(|item| item.id.starts_with(&opts.id_prefix) && check.applies_to(&item.type_))
        .collect();
    info!(tool = %tool, items = items.len(), prefix = %opts.id_prefix, "checking tool compatibility");

    let mut run = CheckRun::default();
    for item in items {
        for v in &item.versions {
            if v.status == IndexEntryStatus::Error {
                continue;
            }
            let path = tool_report_path(
                &opts.reports_root,
                &item.id,
                &v.version,
                &tool.name,
                &tool.version,
            )?;
            if store.exists(&path)? {
                info!(path = %store.location(&path), "found existing report");
                run.existing += 1;
                continue;
            }

            match check_one(store, &path, &item.id, &item.type_, v, check, fetcher, cache) {
                Ok(()) => run.written.push(path),
                Err(e) => {
                    warn!(id = %item.id, version = %v.version, error = %format!("{e:#}"), "failed to check");
                    run.failures.push(CheckFailure {
                        id: item.id.clone(),
                        version: v.version.clone(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }
    }
    Ok(run)
}

#[allow(clippy::too_many_arguments)]
fn check_one(
    store: &dyn Store,
    path: &str,
    id: &str,
    item_type: &str,
    v: &IndexItemVersion,
    check: &dyn ToolCheck,
    fetcher: &dyn ManifestSource,
    cache: &mut ManifestCache,
) -> anyhow::Result<()> {
    let manifest = cache.get_or_fetch(fetcher, &v.source, v.sha256.as_deref())?;
    let ctx = CheckContext {
        id,
        version: &v.version,
        item_type,
        manifest,
    };
    let report = check.check(&ctx)?;
    write_report(store, path, check, report)
}

/// Check a single version outside of a batch and write its report.
#[allow(clippy::too_many_arguments)]
pub fn check_version(
    store: &dyn Store,
    reports_root: &str,
    id: &str,
    version: &IndexItemVersion,
    item_type: &str,
    check: &dyn ToolCheck,
    fetcher: &dyn ManifestSource,
    cache: &mut ManifestCache,
) -> anyhow::Result<String> {
    let tool = check.tool();
    let path = tool_report_path(reports_root, id, &version.version, &tool.name, &tool.version)?;
    check_one(store, &path, id, item_type, version, check, fetcher, cache)?;
    Ok(path)
}

fn write_report(
    store: &dyn Store,
    path: &str,
    check: &dyn ToolCheck,
    report: ToolCompatibilityReport,
) -> anyhow::Result<()> {
    let tool = check.tool();
    let mut report = report.with_identity(&tool.name, &tool.version);
    if report.timestamp.is_none() {
        report.timestamp = Some(Utc::now());
    }
    save_json(store, path, &report).with_context(|| format!("write report {path}"))?;
    info!(path = %store.location(path), status = %report.status, "wrote report");
    Ok(())
}
