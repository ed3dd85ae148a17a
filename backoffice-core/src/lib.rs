//! Embeddable core library for backoffice.
//!
//! Provides clap-free, I/O-abstracted pipelines suitable for linking into
//! CI jobs or other host processes.
//!
//! # Port traits
//!
//! All I/O is abstracted behind port traits in [`ports`] plus the
//! [`Store`](backoffice_store::Store) of `backoffice-store`:
//! - [`CatalogSource`](ports::CatalogSource): list resources and versions upstream
//! - [`ManifestFetcher`](ports::ManifestFetcher): download manifest bytes
//! - [`ReviewerDirectory`](ports::ReviewerDirectory): who may accept drafts
//! - [`PackageSource`](ports::PackageSource): files of an uploaded package
//! - [`Clock`](ports::Clock): wall time
//!
//! The [`adapters`] module provides default implementations and in-memory
//! variants.
//!
//! # Entry points
//!
//! - [`run_index`](index::run_index): rebuild `index.json` and report scaffolds
//! - [`run_summarize`](summarize::run_summarize): recompute every summary
//! - [`run_check_tool`](check::run_check_tool) / [`run_test`](check::run_test): write tool reports
//! - [`Staging`](staging::Staging): staged-draft lifecycle and publication
//! - [`validate_format`](validate::validate_format): manifest format report
//! - [`generate_collection_json`](collection::generate_collection_json)
//! - [`run_wipe`](pipeline::run_wipe)

pub mod adapters;
pub mod check;
pub mod collection;
pub mod index;
pub mod layout;
pub mod pipeline;
pub mod ports;
pub mod settings;
pub mod staging;
pub mod summarize;
pub mod validate;

pub use pipeline::ToolError;

// Re-exported so embedders don't need the lower-level crates directly.
pub use backoffice_adapter_sdk::{CheckRun, CommandToolCheck, ManifestCache, ToolCheck};
pub use backoffice_reports::{LoadedReport, ReportLoadError, ToolIdentity};
