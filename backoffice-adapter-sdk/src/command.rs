use crate::check::{CheckContext, ToolCheck};
use anyhow::Context;
use backoffice_reports::ToolIdentity;
use backoffice_types::report::ToolCompatibilityReport;
use std::process::Command;
use tracing::{debug, warn};

/// Runs `<program> <args..> <manifest-path>` and reads a report from stdout.
///
/// The resource id and version are passed as `BACKOFFICE_RESOURCE_ID` and
/// `BACKOFFICE_RESOURCE_VERSION`. A non-zero exit becomes a `failed` report
/// carrying stderr; stdout that is not a report is an error (nothing written).
#[derive(Debug, Clone)]
pub struct CommandToolCheck {
    tool: ToolIdentity,
    applicable_types: Vec<String>,
    program: String,
    args: Vec<String>,
}

impl CommandToolCheck {
    pub fn new(tool: ToolIdentity, program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            tool,
            applicable_types: vec![],
            program: program.into(),
            args,
        }
    }

    pub fn with_applicable_types(mut self, types: Vec<String>) -> Self {
        self.applicable_types = types;
        self
    }
}

impl ToolCheck for CommandToolCheck {
    fn tool(&self) -> &ToolIdentity {
        &self.tool
    }

    fn applicable_types(&self) -> &[String] {
        &self.applicable_types
    }

    fn check(&self, ctx: &CheckContext<'_>) -> anyhow::Result<ToolCompatibilityReport> {
        debug!(program = %self.program, id = %ctx.id, version = %ctx.version, "running tool check");
        let out = Command::new(&self.program)
            .args(&self.args)
            .arg(ctx.manifest.path.as_str())
            .env("BACKOFFICE_RESOURCE_ID", ctx.id)
            .env("BACKOFFICE_RESOURCE_VERSION", ctx.version)
            .output()
            .with_context(|| format!("exec {}", self.program))?;

        let stderr = String::from_utf8_lossy(&out.stderr);
        if !out.status.success() {
            warn!(program = %self.program, status = %out.status, "tool check exited unsuccessfully");
            let mut report =
                ToolCompatibilityReport::failed(format!("{} exited with {}", self.program, out.status));
            report.traceback = stderr.lines().map(str::to_string).collect();
            return Ok(report);
        }

        serde_json::from_slice(&out.stdout).with_context(|| {
            format!(
                "{} did not print a compatibility report\nstderr:\n{stderr}",
                self.program
            )
        })
    }
}
