//! Per-version `log.json` and `chat.json`, both extended by append.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const LOG_VERSION: &str = "0.1.0";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    #[serde(default = "default_log_version")]
    pub log_version: String,

    #[serde(default)]
    pub entries: Vec<LogEntry>,
}

fn default_log_version() -> String {
    LOG_VERSION.to_string()
}

impl Default for Log {
    fn default() -> Self {
        Self {
            log_version: default_log_version(),
            entries: vec![],
        }
    }
}

impl Log {
    /// Append `update`'s entries. A log of a different `log_version` replaces this one.
    pub fn extended(&self, update: Log) -> Log {
        if update.log_version != self.log_version {
            return update;
        }

        let mut entries = self.entries.clone();
        entries.extend(update.entries);
        Log {
            log_version: update.log_version,
            entries,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    #[serde(default)]
    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,

    pub timestamp: DateTime<Utc>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Chat {
    pub fn extended(&self, update: Chat) -> Chat {
        let mut messages = self.messages.clone();
        messages.extend(update.messages);
        Chat { messages }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub author: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}
