use crate::path::{ToolIdentity, parse_report_file_name, tool_reports_dir};
use backoffice_store::{Store, join_key};
use backoffice_types::report::ToolCompatibilityReport;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct LoadedReport {
    /// Store key of the report file.
    pub path: String,
    /// Identity parsed from the file name. `None` when the name is not canonical.
    pub identity: Option<ToolIdentity>,
    pub report: Result<ToolCompatibilityReport, ReportLoadError>,
}

impl LoadedReport {
    /// `<tool>_<tool-version>` as it appears in the file name.
    pub fn report_name(&self) -> Option<String> {
        self.identity.as_ref().map(ToolIdentity::report_name)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReportLoadError {
    #[error("io error: {message}")]
    Io { message: String },

    #[error("json parse error: {message}")]
    Json { message: String },

    #[error("invalid report file name: {message}")]
    InvalidName { message: String },
}

/// Scan `<root>/<id>/<version>/reports/*.json`.
///
/// Only the listing itself can fail; every file that is listed yields an entry,
/// with unreadable or malformed files carried as errors. Files that disappear
/// between listing and reading are dropped (a writer replaced or removed them).
pub fn load_reports(
    store: &dyn Store,
    root: &str,
    id: &str,
    version: &str,
) -> anyhow::Result<Vec<LoadedReport>> {
    let dir = tool_reports_dir(root, id, version);
    debug!(dir = %dir, "scanning tool reports");

    let mut out = Vec::new();
    for name in store.list_files(&dir)? {
        if !name.ends_with(".json") {
            debug!(file = %name, "skipping non-json file in reports dir");
            continue;
        }
        let path = join_key(&[&dir, &name]);

        let identity = parse_report_file_name(&name);
        let bytes = match store.get(&path) {
            Ok(Some(bytes)) => Ok(bytes),
            Ok(None) => {
                debug!(path = %path, "report vanished after listing");
                continue;
            }
            Err(e) => Err(ReportLoadError::Io {
                message: format!("{e:#}"),
            }),
        };

        let report = match (&identity, bytes) {
            (Err(e), _) => Err(ReportLoadError::InvalidName {
                message: e.to_string(),
            }),
            (Ok(_), Err(e)) => Err(e),
            (Ok(_), Ok(bytes)) => serde_json::from_slice::<ToolCompatibilityReport>(&bytes)
                .map_err(|e| ReportLoadError::Json {
                    message: e.to_string(),
                }),
        };

        out.push(LoadedReport {
            path,
            identity: identity.ok(),
            report,
        });
    }

    // Deterministic order matters.
    out.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(out)
}
