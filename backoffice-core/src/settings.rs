//! Clap-free settings for the backoffice pipelines.

use backoffice_summarize::DEFAULT_CORE_TOOL;
use camino::Utf8PathBuf;
use std::collections::BTreeMap;

/// Where documents live in the store and how the pipelines behave.
#[derive(Debug, Clone)]
pub struct Settings {
    /// Store prefix of the per-version report directories.
    pub reports_root: String,

    /// Store prefix of staged and published resource files.
    pub collection_root: String,

    /// Tool whose reports feed the metadata scores.
    pub core_tool: String,

    /// Partner tools, keyed by tool name.
    pub tools: BTreeMap<String, ToolSettings>,

    /// Link to the CI run, recorded in status and log entries.
    pub run_url: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            reports_root: "reports".to_string(),
            collection_root: "collection".to_string(),
            core_tool: DEFAULT_CORE_TOOL.to_string(),
            tools: BTreeMap::new(),
            run_url: None,
        }
    }
}

impl Settings {
    /// Configured tools that handle resources of `item_type`, sorted by name.
    pub fn tools_for(&self, item_type: &str) -> Vec<String> {
        self.tools
            .iter()
            .filter(|(_, tool)| tool.applies_to(item_type))
            .map(|(name, _)| name.clone())
            .collect()
    }

    pub fn applicable_types(&self, tool: &str) -> Vec<String> {
        self.tools
            .get(tool)
            .map(|t| t.applicable_types.clone())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolSettings {
    /// Resource types the tool handles; empty means every type.
    pub applicable_types: Vec<String>,
}

impl ToolSettings {
    pub fn applies_to(&self, item_type: &str) -> bool {
        self.applicable_types.is_empty() || self.applicable_types.iter().any(|t| t == item_type)
    }
}

/// Connection settings of the upstream catalog.
#[derive(Debug, Clone)]
pub struct CatalogSettings {
    pub base_url: String,

    /// Collection whose children are listed.
    pub parent_id: String,

    /// Items requested per page.
    pub page_limit: usize,

    pub http_timeout_secs: u64,

    /// API token sent as a bearer token.
    pub token: Option<String>,

    /// Read the catalog listing from a JSON file instead of the service.
    pub file: Option<Utf8PathBuf>,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            base_url: "https://hypha.aicell.io".to_string(),
            parent_id: "bioimage-io/bioimage.io".to_string(),
            page_limit: 10_000,
            http_timeout_secs: 30,
            token: None,
            file: None,
        }
    }
}
