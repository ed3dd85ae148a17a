//! Aggregation engine: turns the tool reports of one resource version into its
//! compatibility summary.
//!
//! Pure and deterministic. Reports are grouped by tool (case-insensitively); the
//! most favorable report of each tool is its verdict (`passed` > `not-applicable`
//! > `failed` = `error`, newest first on ties). The overall score counts passed
//! verdicts out of definitive ones; tools without any report do not count.

mod engine;
mod version;

pub use engine::{DEFAULT_CORE_TOOL, SummarizeOptions, summarize};
pub use version::compare_versions;
