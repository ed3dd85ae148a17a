//! Static format validation of a version's manifest.

use crate::layout::files_dir;
use crate::pipeline::ToolError;
use crate::ports::Clock;
use crate::settings::Settings;
use crate::staging::MANIFEST_NAMES;
use anyhow::{Context, bail};
use backoffice_reports::{summary_path, tool_report_path, validate_resource_id};
use backoffice_store::{Store, join_key, load_json, save_json};
use backoffice_types::report::{ReportStatus, ToolCompatibilityReport};
use backoffice_types::summary::CompatibilitySummary;
use backoffice_types::versions::VersionLabel;
use jsonschema::Draft;
use serde_json::{Value, json};
use tracing::info;

/// Tool name of the reports written by `validate_format`.
pub const FORMAT_TOOL: &str = "backoffice-format";

const MANIFEST_SCHEMA_BYTES: &[u8] = include_bytes!("../schemas/manifest.v1.schema.json");

/// Outcome of `validate_format`.
#[derive(Debug, Clone)]
pub struct FormatOutcome {
    /// Store key of the written report.
    pub path: String,
    pub report: ToolCompatibilityReport,
}

/// Schema errors of `manifest`, sorted; empty when valid.
pub fn format_errors(manifest: &Value) -> anyhow::Result<Vec<String>> {
    let schema: Value =
        serde_json::from_slice(MANIFEST_SCHEMA_BYTES).context("parse manifest schema")?;
    let validator = jsonschema::options()
        .with_draft(Draft::Draft202012)
        .build(&schema)
        .context("build manifest schema validator")?;

    let mut errors: Vec<String> = validator
        .iter_errors(manifest)
        .map(|e| {
            let at = e.instance_path().to_string();
            if at.is_empty() {
                e.to_string()
            } else {
                format!("{e} at {at}")
            }
        })
        .collect();
    errors.sort();
    Ok(errors)
}

/// Validate the manifest of (`id`, `version`) and write a format report.
///
/// Staged and published versions are read from the collection store; any
/// other version falls back to the manifest recorded in its summary scaffold.
pub fn validate_format(
    settings: &Settings,
    store: &dyn Store,
    clock: &dyn Clock,
    id: &str,
    version: &str,
) -> Result<FormatOutcome, ToolError> {
    let manifest = manifest_for(settings, store, id, version)?;
    let errors = format_errors(&manifest)?;

    let mut report = if errors.is_empty() {
        ToolCompatibilityReport::new(ReportStatus::Passed)
    } else {
        ToolCompatibilityReport::failed(format!("{} format error(s)", errors.len()))
    };
    let status = if errors.is_empty() {
        "valid-format"
    } else {
        "failed"
    };
    report.details = Some(json!({
        "status": status,
        "errors": errors,
    }));
    let report = report
        .with_identity(FORMAT_TOOL, env!("CARGO_PKG_VERSION"))
        .with_timestamp(clock.now());

    let path = tool_report_path(
        &settings.reports_root,
        id,
        version,
        FORMAT_TOOL,
        env!("CARGO_PKG_VERSION"),
    )
    .context("resolve format report path")?;
    save_json(store, &path, &report).with_context(|| format!("write {path}"))?;
    info!(resource = %id, version = %version, status = %report.status, "validated format");

    Ok(FormatOutcome { path, report })
}

fn manifest_for(
    settings: &Settings,
    store: &dyn Store,
    id: &str,
    version: &str,
) -> anyhow::Result<Value> {
    validate_resource_id(id)?;
    if let Some(label) = VersionLabel::parse(version) {
        let key = join_key(&[
            &files_dir(&settings.collection_root, id, label),
            MANIFEST_NAMES[0],
        ]);
        if let Some(bytes) = store.get(&key)? {
            return serde_yaml::from_slice(&bytes).with_context(|| format!("parse {key}"));
        }
    }

    let key = summary_path(&settings.reports_root, id, version);
    let summary: CompatibilitySummary = load_json(store, &key)?
        .with_context(|| format!("no manifest found for {id} {version}"))?;
    if summary.rdf_content.as_object().is_none_or(|m| m.is_empty()) {
        bail!("summary of {id} {version} carries no manifest");
    }
    Ok(summary.rdf_content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn complete_manifest_has_no_errors() {
        let manifest = json!({
            "type": "model",
            "name": "affable shark",
            "description": "nuclei segmentation",
            "authors": [{"name": "Jane"}],
            "license": "MIT",
            "format_version": "0.5.3",
        });
        assert!(format_errors(&manifest).unwrap().is_empty());
    }

    #[test]
    fn missing_fields_are_all_reported() {
        let manifest = json!({"type": "model", "name": "x", "authors": []});
        let errors = format_errors(&manifest).unwrap();
        for field in ["description", "license", "format_version"] {
            assert!(
                errors.iter().any(|e| e.contains(field)),
                "no error mentions {field}: {errors:?}"
            );
        }
        assert!(errors.iter().any(|e| e.contains("/authors")));
    }
}
