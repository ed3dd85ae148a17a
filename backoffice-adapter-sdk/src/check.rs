use crate::manifest::CachedManifest;
use backoffice_reports::ToolIdentity;
use backoffice_types::report::ToolCompatibilityReport;

/// What a tool check gets to look at.
#[derive(Debug, Clone, Copy)]
pub struct CheckContext<'a> {
    pub id: &'a str,
    pub version: &'a str,
    /// Resource type from the index (`model`, `dataset`, ...).
    pub item_type: &'a str,
    pub manifest: &'a CachedManifest,
}

/// One partner tool: produce a compatibility report for a manifest.
///
/// Implementations decide `not-applicable` themselves; returning `Err` means
/// the check could not run at all and no report is written for this version.
pub trait ToolCheck {
    fn tool(&self) -> &ToolIdentity;

    /// Resource types this tool handles. Empty means every type.
    fn applicable_types(&self) -> &[String];

    fn check(&self, ctx: &CheckContext<'_>) -> anyhow::Result<ToolCompatibilityReport>;

    fn applies_to(&self, item_type: &str) -> bool {
        let types = self.applicable_types();
        types.is_empty() || types.iter().any(|t| t == item_type)
    }
}

/// A check backed by a closure; handy for embedding and tests.
pub struct FnToolCheck<F> {
    tool: ToolIdentity,
    applicable_types: Vec<String>,
    f: F,
}

impl<F> FnToolCheck<F>
where
    F: Fn(&CheckContext<'_>) -> anyhow::Result<ToolCompatibilityReport>,
{
    pub fn new(tool: ToolIdentity, applicable_types: Vec<String>, f: F) -> Self {
        Self {
            tool,
            applicable_types,
            f,
        }
    }
}

impl<F> ToolCheck for FnToolCheck<F>
where
    F: Fn(&CheckContext<'_>) -> anyhow::Result<ToolCompatibilityReport>,
{
    fn tool(&self) -> &ToolIdentity {
        &self.tool
    }

    fn applicable_types(&self) -> &[String] {
        &self.applicable_types
    }

    fn check(&self, ctx: &CheckContext<'_>) -> anyhow::Result<ToolCompatibilityReport> {
        (self.f)(ctx)
    }
}
