//! Configuration file loading for backoffice.
//!
//! Discovers and loads `backoffice.toml` from the working directory (or the
//! path given with `--config`). Environment variables and CLI flags override
//! the file; the merged result is handed to the core as plain settings.

use anyhow::Context;
use backoffice_core::ports::Reviewer;
use backoffice_core::settings::{CatalogSettings, Settings, ToolSettings};
use camino::{Utf8Path, Utf8PathBuf};
use fs_err as fs;
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::debug;

/// The config file name to search for.
pub const CONFIG_FILE_NAME: &str = "backoffice.toml";

/// Top-level configuration from backoffice.toml.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackofficeConfig {
    /// Tool whose `details` feed the metadata scores.
    pub core_tool: Option<String>,

    pub storage: StorageConfig,

    pub catalog: CatalogConfig,

    /// Partner tools, keyed by tool name.
    pub tools: BTreeMap<String, ToolConfig>,

    /// Users allowed to accept drafts, keyed by account id.
    pub reviewers: BTreeMap<String, ReviewerConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory backing the store.
    pub root: Option<Utf8PathBuf>,
    pub reports_root: Option<String>,
    pub collection_root: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub base_url: Option<String>,
    pub parent_id: Option<String>,
    pub page_limit: Option<usize>,
    pub http_timeout_secs: Option<u64>,
    /// JSON listing used instead of the catalog service.
    pub file: Option<Utf8PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ToolConfig {
    pub applicable_types: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ReviewerConfig {
    pub name: String,
    pub email: String,
    pub affiliation: String,
    pub orcid: String,
    pub github_user: String,
}

/// Discover the backoffice.toml config file in `dir`.
pub fn discover_config(dir: &Utf8Path) -> Option<Utf8PathBuf> {
    let config_path = dir.join(CONFIG_FILE_NAME);
    if config_path.exists() {
        debug!("found config file at {}", config_path);
        Some(config_path)
    } else {
        debug!("no config file found at {}", config_path);
        None
    }
}

/// Load and parse a backoffice.toml config file.
pub fn load_config(path: &Utf8Path) -> anyhow::Result<BackofficeConfig> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("read config file {}", path))?;
    parse_config(&contents).with_context(|| format!("parse config file {}", path))
}

pub fn parse_config(contents: &str) -> anyhow::Result<BackofficeConfig> {
    let config: BackofficeConfig = toml::from_str(contents).context("invalid TOML")?;
    Ok(config)
}

/// Load config from `dir`, or return default if not found.
pub fn load_or_default(dir: &Utf8Path) -> anyhow::Result<BackofficeConfig> {
    match discover_config(dir) {
        Some(path) => load_config(&path),
        None => Ok(BackofficeConfig::default()),
    }
}

/// Values taken from the environment or the command line.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub root: Option<Utf8PathBuf>,
    pub catalog_token: Option<String>,
    pub http_timeout_secs: Option<u64>,
    pub run_url: Option<String>,
}

/// Configuration after applying [`Overrides`] to the file.
#[derive(Debug, Clone)]
pub struct MergedConfig {
    /// Directory backing the store.
    pub root: Utf8PathBuf,
    pub settings: Settings,
    pub catalog: CatalogSettings,
    pub reviewers: Vec<Reviewer>,
}

/// Builder for merging the config file with environment and CLI values.
pub struct ConfigMerger {
    config: BackofficeConfig,
}

impl ConfigMerger {
    pub fn new(config: BackofficeConfig) -> Self {
        Self { config }
    }

    /// Overrides win over the file, the file wins over built-in defaults.
    pub fn merge(self, overrides: Overrides) -> MergedConfig {
        let BackofficeConfig {
            core_tool,
            storage,
            catalog,
            tools,
            reviewers,
        } = self.config;

        let defaults = Settings::default();
        let settings = Settings {
            reports_root: storage.reports_root.unwrap_or(defaults.reports_root),
            collection_root: storage.collection_root.unwrap_or(defaults.collection_root),
            core_tool: core_tool.unwrap_or(defaults.core_tool),
            tools: tools
                .into_iter()
                .map(|(name, tool)| {
                    (
                        name,
                        ToolSettings {
                            applicable_types: tool.applicable_types,
                        },
                    )
                })
                .collect(),
            run_url: overrides.run_url,
        };

        let catalog_defaults = CatalogSettings::default();
        let catalog = CatalogSettings {
            base_url: catalog.base_url.unwrap_or(catalog_defaults.base_url),
            parent_id: catalog.parent_id.unwrap_or(catalog_defaults.parent_id),
            page_limit: catalog.page_limit.unwrap_or(catalog_defaults.page_limit),
            http_timeout_secs: overrides
                .http_timeout_secs
                .or(catalog.http_timeout_secs)
                .unwrap_or(catalog_defaults.http_timeout_secs),
            token: overrides.catalog_token,
            file: catalog.file,
        };

        let reviewers = reviewers
            .into_iter()
            .map(|(id, r)| Reviewer {
                id,
                name: r.name,
                email: r.email,
                affiliation: r.affiliation,
                orcid: r.orcid,
                github_user: r.github_user,
            })
            .collect();

        MergedConfig {
            root: overrides
                .root
                .or(storage.root)
                .unwrap_or_else(|| Utf8PathBuf::from(".")),
            settings,
            catalog,
            reviewers,
        }
    }
}
