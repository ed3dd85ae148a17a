//! SDK for partner tool integrations.
//!
//! Every partner tool (ilastik, BiaPy, CAREamics, the core library, ...) is a
//! [`ToolCheck`]: given a manifest on disk and the resource it belongs to, it
//! produces one [`ToolCompatibilityReport`](backoffice_types::report::ToolCompatibilityReport).
//! [`check_tool_compatibility`] runs a check over the index and writes each report
//! atomically at its canonical path.

mod check;
mod command;
mod driver;
mod manifest;

pub use check::{CheckContext, FnToolCheck, ToolCheck};
pub use command::CommandToolCheck;
pub use driver::{CheckFailure, CheckOptions, CheckRun, check_tool_compatibility, check_version};
pub use manifest::{CachedManifest, Manifest, ManifestCache, ManifestError, ManifestSource};
