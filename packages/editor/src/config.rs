use crate::mode::EditorMode;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

pub const DEFAULT_CONFIG_NAME: &str = "suggest-edits.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Suggested-edits configuration file format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SuggestEditsConfig {
    /// Mode the editor starts in (subject to capability pinning)
    #[serde(default)]
    pub initial_mode: EditorMode,

    #[serde(default = "default_true")]
    pub can_edit: bool,

    #[serde(default = "default_true")]
    pub can_suggest: bool,

    #[serde(default = "default_author_id")]
    pub author_id: String,

    #[serde(default = "default_author_name")]
    pub author_name: String,

    /// Maximum characters in a thread quote, ellipsis included
    #[serde(default = "default_quote_max_len")]
    pub quote_max_len: usize,

    /// Let suggest-only users reject their own suggestions
    #[serde(default)]
    pub suggesters_can_reject_own: bool,
}

fn default_true() -> bool {
    true
}

fn default_author_id() -> String {
    "anonymous".to_string()
}

fn default_author_name() -> String {
    "Anonymous".to_string()
}

fn default_quote_max_len() -> usize {
    120
}

impl SuggestEditsConfig {
    /// Load config from a directory, falling back to defaults when the
    /// file does not exist
    pub fn load(dir: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config_path = dir.as_ref().join(DEFAULT_CONFIG_NAME);

        if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: SuggestEditsConfig = serde_json::from_str(&content)?;
            tracing::debug!(path = %config_path.display(), "loaded suggested-edits config");
            Ok(config)
        } else {
            Ok(SuggestEditsConfig::default())
        }
    }

    pub fn for_author(mut self, id: impl Into<String>, name: impl Into<String>) -> Self {
        self.author_id = id.into();
        self.author_name = name.into();
        self
    }

    pub fn with_mode(mut self, mode: EditorMode) -> Self {
        self.initial_mode = mode;
        self
    }

    pub fn with_capabilities(mut self, can_edit: bool, can_suggest: bool) -> Self {
        self.can_edit = can_edit;
        self.can_suggest = can_suggest;
        self
    }
}

impl Default for SuggestEditsConfig {
    fn default() -> Self {
        Self {
            initial_mode: EditorMode::default(),
            can_edit: true,
            can_suggest: true,
            author_id: default_author_id(),
            author_name: default_author_name(),
            quote_max_len: default_quote_max_len(),
            suggesters_can_reject_own: false,
        }
    }
}
