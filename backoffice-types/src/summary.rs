use crate::report::{ReportStatus, ToolCompatibilityReport};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Overall test status of a resource version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SummaryStatus {
    Passed,
    Failed,
    #[default]
    Untested,
}

/// `<reports-root>/<id>/<version>/summary.json`.
///
/// The Index Builder writes a scaffold (manifest content + hash, everything
/// else empty); the summarizer rewrites the derived fields. Both shapes
/// deserialize into this type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompatibilitySummary {
    #[serde(default = "default_summary_schema")]
    pub schema: String,

    /// Manifest content (`rdf.yaml`) as JSON.
    #[serde(default)]
    pub rdf_content: serde_json::Value,

    /// SHA-256 of the manifest bytes the scaffold was built from.
    #[serde(default)]
    pub rdf_yaml_sha256: String,

    #[serde(default)]
    pub status: SummaryStatus,

    /// Selected verdict per tool.
    #[serde(default)]
    pub tools: BTreeMap<String, ToolVerdict>,

    #[serde(default)]
    pub scores: CompatibilityScores,

    /// Every parsed report: tool -> report name (`<tool>_<version>`) -> report.
    #[serde(default)]
    pub tests: BTreeMap<String, BTreeMap<String, ToolCompatibilityReport>>,

    /// Reports that could not be loaded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped: Vec<SkippedReport>,
}

fn default_summary_schema() -> String {
    crate::schema::BACKOFFICE_SUMMARY_V1.to_string()
}

impl CompatibilitySummary {
    /// Empty summary for a freshly indexed version.
    pub fn scaffold(rdf_content: serde_json::Value, rdf_yaml_sha256: impl Into<String>) -> Self {
        Self {
            schema: default_summary_schema(),
            rdf_content,
            rdf_yaml_sha256: rdf_yaml_sha256.into(),
            status: SummaryStatus::Untested,
            tools: BTreeMap::new(),
            scores: CompatibilityScores::default(),
            tests: BTreeMap::new(),
            skipped: vec![],
        }
    }
}

impl Default for CompatibilitySummary {
    fn default() -> Self {
        Self::scaffold(serde_json::Value::Object(Default::default()), "")
    }
}

/// The report chosen to represent one tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolVerdict {
    pub status: ReportStatus,
    pub tool_version: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    /// Report name (`<tool>_<tool-version>`) this verdict was taken from.
    pub report: String,

    /// Number of reports seen for this tool.
    pub reports: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompatibilityScores {
    /// Tools whose selected verdict is `passed`.
    #[serde(default)]
    pub passed: u32,

    /// Tools whose selected verdict is not `not-applicable`.
    #[serde(default)]
    pub definitive: u32,

    /// `passed / definitive`; `None` without any definitive verdict.
    #[serde(default)]
    pub overall: Option<f64>,

    /// Best metadata completeness reported by the core tool.
    #[serde(default)]
    pub metadata_completeness: f64,

    /// 1.0: valid with the newest core tool, 0.5: only with an older one, 0.0 otherwise.
    #[serde(default)]
    pub metadata_format: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedReport {
    pub path: String,
    pub reason: String,
}
