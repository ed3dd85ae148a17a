//! `<collection-root>/<id>/versions.json`: staged and published versions of one resource.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// n-th staged version of a resource (`staged/<n>`).
pub type StageNumber = u32;

/// n-th published version of a resource.
pub type PublishNumber = u32;

pub const STAGED_PREFIX: &str = "staged/";

/// Lifecycle state of a staged version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Unpacking,
    Unpacked,
    Testing,
    AwaitingReview,
    ChangesRequested,
    Accepted,
    Published,
    Superseded,
    Error,
}

impl LifecycleState {
    pub const NUM_STEPS: u8 = 6;

    /// Progress step shown to contributors.
    pub fn step(self) -> u8 {
        match self {
            LifecycleState::Error => 0,
            LifecycleState::Unpacking => 1,
            LifecycleState::Unpacked => 2,
            LifecycleState::Testing => 3,
            LifecycleState::AwaitingReview => 4,
            LifecycleState::ChangesRequested | LifecycleState::Accepted => 5,
            LifecycleState::Published | LifecycleState::Superseded => 6,
        }
    }

    /// No further transitions for this staged number.
    pub fn is_terminal(self) -> bool {
        matches!(self, LifecycleState::Published | LifecycleState::Superseded)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LifecycleState::Unpacking => "unpacking",
            LifecycleState::Unpacked => "unpacked",
            LifecycleState::Testing => "testing",
            LifecycleState::AwaitingReview => "awaiting_review",
            LifecycleState::ChangesRequested => "changes_requested",
            LifecycleState::Accepted => "accepted",
            LifecycleState::Published => "published",
            LifecycleState::Superseded => "superseded",
            LifecycleState::Error => "error",
        }
    }

    pub fn default_description(self) -> &'static str {
        match self {
            LifecycleState::Unpacking => "unpacking package",
            LifecycleState::Unpacked => "staging was successful; awaiting automated tests to start",
            LifecycleState::Testing => "testing",
            LifecycleState::AwaitingReview => {
                "Thank you for your contribution! Our maintainers will take a look soon."
            }
            LifecycleState::ChangesRequested => "changes requested",
            LifecycleState::Accepted => {
                "This staged version has been accepted by a maintainer and is about to be published."
            }
            LifecycleState::Published => "published!",
            LifecycleState::Superseded => "superseded",
            LifecycleState::Error => "error",
        }
    }
}

impl std::fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Current status record of a staged version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedStatus {
    pub name: LifecycleState,

    #[serde(default)]
    pub description: String,

    pub step: u8,

    #[serde(default = "default_num_steps")]
    pub num_steps: u8,

    pub timestamp: DateTime<Utc>,

    /// Link to the CI run that set this status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_url: Option<String>,

    /// `superseded`: the staged number that superseded this one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by: Option<StageNumber>,

    /// `published`: the publish number allocated for this draft.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish_number: Option<PublishNumber>,

    /// `error`: the state the error occurred in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub during: Option<LifecycleState>,
}

fn default_num_steps() -> u8 {
    LifecycleState::NUM_STEPS
}

impl StagedStatus {
    pub fn new(name: LifecycleState, timestamp: DateTime<Utc>) -> Self {
        Self {
            name,
            description: name.default_description().to_string(),
            step: name.step(),
            num_steps: LifecycleState::NUM_STEPS,
            timestamp,
            run_url: None,
            by: None,
            publish_number: None,
            during: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_run_url(mut self, run_url: Option<String>) -> Self {
        self.run_url = run_url;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagedVersionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sem_ver: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub status: StagedStatus,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedStatus {
    pub stage_number: StageNumber,
    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedVersionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sem_ver: Option<String>,

    pub timestamp: DateTime<Utc>,

    pub status: PublishedStatus,

    /// Version specific DOI.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Versions {
    #[serde(default)]
    pub staged: BTreeMap<StageNumber, StagedVersionInfo>,

    #[serde(default)]
    pub published: BTreeMap<PublishNumber, PublishedVersionInfo>,

    /// Concept DOI (version unspecific).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VersionsMergeError {
    #[error("may not overwrite concept doi {existing} with {update}")]
    DoiOverwrite { existing: String, update: String },

    #[error("published version {0} is immutable")]
    PublishedImmutable(PublishNumber),
}

impl Versions {
    pub fn latest_stage_number(&self) -> Option<StageNumber> {
        self.staged.keys().next_back().copied()
    }

    pub fn latest_publish_number(&self) -> Option<PublishNumber> {
        self.published.keys().next_back().copied()
    }

    pub fn next_stage_number(&self) -> StageNumber {
        self.latest_stage_number().map_or(1, |n| n + 1)
    }

    pub fn next_publish_number(&self) -> PublishNumber {
        self.latest_publish_number().map_or(1, |n| n + 1)
    }

    /// Merge `update` into `self`: entries are replaced per number, except
    /// that published entries may never change once written.
    pub fn merged(&self, update: Versions) -> Result<Versions, VersionsMergeError> {
        let doi = match (&self.doi, update.doi) {
            (None, update) => update,
            (Some(existing), None) => Some(existing.clone()),
            (Some(existing), Some(update)) if *existing == update => Some(update),
            (Some(existing), Some(update)) => {
                return Err(VersionsMergeError::DoiOverwrite {
                    existing: existing.clone(),
                    update,
                });
            }
        };

        let mut published = self.published.clone();
        for (nr, info) in update.published {
            match published.get(&nr) {
                Some(existing) if existing.status != info.status => {
                    return Err(VersionsMergeError::PublishedImmutable(nr));
                }
                _ => {
                    published.insert(nr, info);
                }
            }
        }

        let mut staged = self.staged.clone();
        staged.extend(update.staged);

        Ok(Versions {
            staged,
            published,
            doi,
        })
    }
}

/// Label of a staged version (`staged/<n>`).
pub fn staged_label(number: StageNumber) -> String {
    format!("{STAGED_PREFIX}{number}")
}

/// A version label parsed into its kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionLabel {
    Staged(StageNumber),
    Published(PublishNumber),
}

impl VersionLabel {
    pub fn parse(label: &str) -> Option<Self> {
        match label.strip_prefix(STAGED_PREFIX) {
            Some(n) => n.parse().ok().map(VersionLabel::Staged),
            None => label.parse().ok().map(VersionLabel::Published),
        }
    }
}

impl std::fmt::Display for VersionLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VersionLabel::Staged(n) => write!(f, "{STAGED_PREFIX}{n}"),
            VersionLabel::Published(n) => write!(f, "{n}"),
        }
    }
}
