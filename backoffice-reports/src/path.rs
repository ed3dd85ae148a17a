use backoffice_store::join_key;
use backoffice_types::file_names;
use thiserror::Error;

/// Separates tool name and tool version in report file names.
pub const DELIMITER: char = '_';

const REPORT_EXTENSION: &str = ".json";

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PathError {
    #[error("invalid {field} {value:?}: {reason}")]
    InvalidIdentifier {
        field: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// A tool and the version of it that produced a report.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ToolIdentity {
    pub name: String,
    pub version: String,
}

impl ToolIdentity {
    pub fn new(name: &str, version: &str) -> Result<Self, PathError> {
        check_identifier("tool name", name)?;
        check_identifier("tool version", version)?;
        Ok(Self {
            name: name.to_string(),
            version: version.to_string(),
        })
    }

    /// Tools are grouped case-insensitively.
    pub fn group_key(&self) -> String {
        self.name.to_lowercase()
    }

    /// `<tool>_<tool-version>`
    pub fn report_name(&self) -> String {
        format!("{}{DELIMITER}{}", self.name, self.version)
    }

    pub fn file_name(&self) -> String {
        format!("{}{REPORT_EXTENSION}", self.report_name())
    }
}

impl std::fmt::Display for ToolIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

fn check_identifier(field: &'static str, value: &str) -> Result<(), PathError> {
    let reason = if value.is_empty() {
        "must not be empty"
    } else if value.contains(DELIMITER) {
        "must not contain the '_' delimiter"
    } else if value.contains(['/', '\\']) {
        "must not contain path separators"
    } else {
        return Ok(());
    };
    Err(PathError::InvalidIdentifier {
        field,
        value: value.to_string(),
        reason,
    })
}

/// Reject resource ids that would address a key outside their own folder.
pub fn validate_resource_id(id: &str) -> Result<(), PathError> {
    let reason = if id.is_empty() {
        "must not be empty"
    } else if id.contains('\\') {
        "must not contain backslashes"
    } else if id.starts_with('/') {
        "must not be an absolute path"
    } else if id.split('/').any(|s| s.is_empty() || s == "." || s == "..") {
        "must not contain empty, '.' or '..' segments"
    } else {
        return Ok(());
    };
    Err(PathError::InvalidIdentifier {
        field: "resource id",
        value: id.to_string(),
        reason,
    })
}

/// Storage folder name of a resource id (`:` is not portable in paths).
pub fn resource_dir(id: &str) -> String {
    id.replace(':', "_")
}

/// `<root>/<id>/<version>`
pub fn report_dir(root: &str, id: &str, version: &str) -> String {
    join_key(&[root, &resource_dir(id), version])
}

/// `<root>/<id>/<version>/summary.json`
pub fn summary_path(root: &str, id: &str, version: &str) -> String {
    join_key(&[&report_dir(root, id, version), file_names::SUMMARY])
}

/// `<root>/<id>/<version>/reports`
pub fn tool_reports_dir(root: &str, id: &str, version: &str) -> String {
    join_key(&[&report_dir(root, id, version), file_names::REPORTS_DIR])
}

/// `<root>/<id>/<version>/reports/<tool>_<tool-version>.json`
///
/// Fails before any I/O when the tool name or version would make the file name
/// ambiguous to split back into its parts.
pub fn tool_report_path(
    root: &str,
    id: &str,
    version: &str,
    tool: &str,
    tool_version: &str,
) -> Result<String, PathError> {
    let identity = ToolIdentity::new(tool, tool_version)?;
    Ok(join_key(&[
        &tool_reports_dir(root, id, version),
        &identity.file_name(),
    ]))
}

/// Split `<tool>_<tool-version>.json` back into its parts (on the first delimiter).
pub fn parse_report_file_name(file_name: &str) -> Result<ToolIdentity, PathError> {
    let invalid = |reason| PathError::InvalidIdentifier {
        field: "report file name",
        value: file_name.to_string(),
        reason,
    };

    let stem = file_name
        .strip_suffix(REPORT_EXTENSION)
        .ok_or_else(|| invalid("missing .json extension"))?;
    let (tool, version) = stem
        .split_once(DELIMITER)
        .ok_or_else(|| invalid("missing '_' between tool name and version"))?;
    if tool.is_empty() || version.is_empty() {
        return Err(invalid("empty tool name or version"));
    }

    Ok(ToolIdentity {
        name: tool.to_string(),
        version: version.to_string(),
    })
}
