//! Shared DTOs (schemas-as-code) for the backoffice workspace.
//!
//! # Design constraints
//! - These types are serialized to storage and read by other tools.
//! - Maps are `BTreeMap` so serialized output is byte-deterministic.
//! - Readers are tolerant: unknown fields are ignored, optional fields may be absent.

pub mod collection;
pub mod index;
pub mod log;
pub mod report;
pub mod summary;
pub mod versions;

/// Schema identifiers.
pub mod schema {
    pub const BACKOFFICE_SUMMARY_V1: &str = "backoffice.summary.v1";
    pub const BACKOFFICE_INDEX_V1: &str = "backoffice.index.v1";
    pub const BACKOFFICE_COLLECTION_V1: &str = "backoffice.collection.v1";
}

/// Well-known document file names.
pub mod file_names {
    pub const INDEX: &str = "index.json";
    pub const SUMMARY: &str = "summary.json";
    pub const REPORTS_DIR: &str = "reports";
    pub const VERSIONS: &str = "versions.json";
    pub const LOG: &str = "log.json";
    pub const CHAT: &str = "chat.json";
    pub const OVERVIEW: &str = "overview.md";
}
