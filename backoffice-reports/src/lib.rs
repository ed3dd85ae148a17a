//! Compatibility report addressing and ingestion.
//!
//! Tool jobs write one JSON report per (resource, version, tool, tool version) at the
//! path produced by [`tool_report_path`]. The loader here is tolerant: a report that
//! cannot be read or parsed is returned as an error entry instead of failing the scan,
//! so one corrupt file never blocks the scores of other tools.

mod load;
mod path;

pub use load::{LoadedReport, ReportLoadError, load_reports};
pub use path::{
    DELIMITER, PathError, ToolIdentity, parse_report_file_name, report_dir, resource_dir,
    summary_path, tool_report_path, tool_reports_dir, validate_resource_id,
};
