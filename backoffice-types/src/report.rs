use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Verdict of one tool run against one resource version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReportStatus {
    Passed,
    Failed,
    NotApplicable,
    Error,
}

impl ReportStatus {
    /// Favorability used when several reports exist for one tool.
    ///
    /// `passed` > `not-applicable` > `failed` = `error`.
    pub fn rank(self) -> u8 {
        match self {
            ReportStatus::Passed => 2,
            ReportStatus::NotApplicable => 1,
            ReportStatus::Failed | ReportStatus::Error => 0,
        }
    }

    /// Whether the status counts as a verdict on compatibility.
    pub fn is_definitive(self) -> bool {
        !matches!(self, ReportStatus::NotApplicable)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Passed => "passed",
            ReportStatus::Failed => "failed",
            ReportStatus::NotApplicable => "not-applicable",
            ReportStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tool compatibility report, as written by an external tool job to
/// `<reports-root>/<id>/<version>/reports/<tool>_<tool-version>.json`.
///
/// The file name is authoritative for the tool identity; `tool` and
/// `tool_version` in the body are informational.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCompatibilityReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_version: Option<String>,

    pub status: ReportStatus,

    /// Explicit score in `0.0..=1.0`. Derived from `status` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub traceback: Vec<String>,

    /// Tool-specific payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub badge: Option<Badge>,

    /// Resource ids the checked resource should link to.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<String>,
}

impl ToolCompatibilityReport {
    pub fn new(status: ReportStatus) -> Self {
        Self {
            tool: None,
            tool_version: None,
            status,
            score: None,
            error: None,
            traceback: vec![],
            details: None,
            timestamp: None,
            badge: None,
            links: vec![],
        }
    }

    /// Report for a tool that could not run against the resource at all.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::new(ReportStatus::Failed)
        }
    }

    pub fn with_identity(mut self, tool: &str, tool_version: &str) -> Self {
        self.tool = Some(tool.to_string());
        self.tool_version = Some(tool_version.to_string());
        self
    }

    pub fn with_timestamp(mut self, at: DateTime<Utc>) -> Self {
        self.timestamp = Some(at);
        self
    }

    /// Score clamped to `0.0..=1.0`, falling back to 1.0 for `passed` and 0.0 otherwise.
    pub fn effective_score(&self) -> f64 {
        let fallback = if self.status == ReportStatus::Passed {
            1.0
        } else {
            0.0
        };
        self.score.unwrap_or(fallback).clamp(0.0, 1.0)
    }

    /// `details.metadata_completeness`, if the tool reports one.
    pub fn metadata_completeness(&self) -> Option<f64> {
        self.details
            .as_ref()?
            .get("metadata_completeness")?
            .as_f64()
    }

    /// `details.status`, used by format validators (`valid-format`, `passed`, `failed`).
    pub fn details_status(&self) -> Option<&str> {
        self.details.as_ref()?.get("status")?.as_str()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Badge {
    pub icon: String,
    pub label: String,
    pub url: String,
}
