//! Configuration loading and management
//!
//! Handles parsing of `.marktask.toml` configuration files.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::lang::Lang;

/// Name of the configuration file at the project root
pub const CONFIG_FILE: &str = ".marktask.toml";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Glob patterns of paths that are never loaded
    #[serde(default)]
    pub exclude: Vec<String>,

    /// Task syntax and behaviour
    #[serde(default)]
    pub tasks: TasksConfig,

    /// Known lists, in board order
    #[serde(default = "default_lists")]
    pub lists: Vec<ListConfig>,

    /// Language overrides keyed by file extension
    #[serde(default)]
    pub languages: BTreeMap<String, Lang>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            exclude: Vec::new(),
            tasks: TasksConfig::default(),
            lists: default_lists(),
            languages: BTreeMap::new(),
        }
    }
}

/// One list of the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListConfig {
    pub name: String,

    /// Hidden lists are parsed but left out of board views
    #[serde(default)]
    pub hidden: bool,

    /// Markers naming an ignored list are not tasks
    #[serde(default)]
    pub ignore: bool,
}

impl ListConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            hidden: false,
            ignore: false,
        }
    }
}

fn default_lists() -> Vec<ListConfig> {
    vec![
        ListConfig::new("TODO"),
        ListConfig::new("DOING"),
        ListConfig::new("DONE"),
    ]
}

/// Where tasks without an order sort within a list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum UnorderedPosition {
    First,
    #[default]
    Last,
}

/// Task syntax configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TasksConfig {
    /// Prefix in front of the list name of tag-style markers
    #[serde(default = "default_token_prefix")]
    pub token_prefix: String,

    /// Separator between metadata keys and values
    #[serde(default = "default_meta_sep")]
    pub meta_sep: String,

    /// Store order only as `order:<n>` metadata, never inline
    #[serde(default = "default_true")]
    pub order_meta: bool,

    /// Keep `#TODO:` when the order is removed
    #[serde(default)]
    pub keep_empty_priority: bool,

    /// Treat `- [ ]` lines as tasks
    #[serde(default = "default_true")]
    pub checkbox_tasks: bool,

    /// A line exactly equal to this ends a markdown description
    #[serde(default)]
    pub card_terminator: Option<String>,

    #[serde(default = "default_tag_prefix")]
    pub tag_prefix: String,

    #[serde(default = "default_context_prefix")]
    pub context_prefix: String,

    /// Put new metadata tokens on their own line inside comment blocks
    #[serde(default)]
    pub meta_new_line: bool,

    /// Add `completed:<timestamp>` when a task enters the done list
    #[serde(default = "default_true")]
    pub add_completed_meta: bool,

    /// List for unchecked checkbox tasks
    #[serde(default = "default_list")]
    pub default_list: String,

    /// List for checked checkbox tasks
    #[serde(default = "default_done_list")]
    pub done_list: String,

    #[serde(default)]
    pub unordered: UnorderedPosition,

    /// New tasks go to the top of their list instead of the bottom
    #[serde(default)]
    pub add_new_cards_to_top: bool,

    /// How long a write waits for another process's lock on the same file
    #[serde(default = "default_lock_timeout_ms")]
    pub lock_timeout_ms: u64,
}

fn default_token_prefix() -> String {
    "#".to_string()
}

fn default_meta_sep() -> String {
    ":".to_string()
}

fn default_true() -> bool {
    true
}

fn default_tag_prefix() -> String {
    "+".to_string()
}

fn default_context_prefix() -> String {
    "@".to_string()
}

fn default_list() -> String {
    "TODO".to_string()
}

fn default_done_list() -> String {
    "DONE".to_string()
}

fn default_lock_timeout_ms() -> u64 {
    crate::lock::DEFAULT_LOCK_TIMEOUT_MS
}

impl Default for TasksConfig {
    fn default() -> Self {
        Self {
            token_prefix: default_token_prefix(),
            meta_sep: default_meta_sep(),
            order_meta: true,
            keep_empty_priority: false,
            checkbox_tasks: true,
            card_terminator: None,
            tag_prefix: default_tag_prefix(),
            context_prefix: default_context_prefix(),
            meta_new_line: false,
            add_completed_meta: true,
            default_list: default_list(),
            done_list: default_done_list(),
            unordered: UnorderedPosition::default(),
            add_new_cards_to_top: false,
            lock_timeout_ms: default_lock_timeout_ms(),
        }
    }
}

impl TasksConfig {
    fn validate(&self) -> Result<()> {
        if self.token_prefix.trim().is_empty() || self.token_prefix.chars().any(char::is_whitespace)
        {
            return Err(Error::InvalidConfig(
                "tasks.token_prefix must be non-empty without whitespace".to_string(),
            ));
        }

        let sep_len = self.meta_sep.chars().count();
        if !(1..=2).contains(&sep_len) || self.meta_sep.chars().any(char::is_whitespace) {
            return Err(Error::InvalidConfig(format!(
                "tasks.meta_sep '{}' must be 1 or 2 non-space characters",
                self.meta_sep
            )));
        }

        for (field, prefix) in [
            ("tasks.tag_prefix", &self.tag_prefix),
            ("tasks.context_prefix", &self.context_prefix),
        ] {
            if prefix.chars().count() != 1 || prefix.chars().any(char::is_alphanumeric) {
                return Err(Error::InvalidConfig(format!(
                    "{field} must be a single non-alphanumeric character"
                )));
            }
        }

        if self.lock_timeout_ms == 0 {
            return Err(Error::InvalidConfig(
                "tasks.lock_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if let Some(terminator) = &self.card_terminator {
            if terminator.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "tasks.card_terminator cannot be blank".to_string(),
                ));
            }
        }

        Ok(())
    }
}

impl Config {
    /// Load configuration from a `.marktask.toml` file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a project root, or return defaults
    pub fn load_from_root(root: &Path) -> Self {
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Self::default();
        }
        match Self::load(&config_path) {
            Ok(config) => config,
            Err(err) => {
                tracing::warn!(path = %config_path.display(), error = %err, "ignoring invalid config");
                Self::default()
            }
        }
    }

    /// Save configuration to a file
    pub fn save(&self, path: &PathBuf) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Configured list, if any
    pub fn list(&self, name: &str) -> Option<&ListConfig> {
        self.lists.iter().find(|list| list.name == name)
    }

    /// A marker naming this list produces a task
    pub fn is_task_list(&self, name: &str) -> bool {
        self.list(name).is_some_and(|list| !list.ignore)
    }

    pub fn list_names(&self) -> Vec<&str> {
        self.lists.iter().map(|list| list.name.as_str()).collect()
    }

    /// Path matches one of the `exclude` globs
    pub fn is_excluded(&self, path: &Path) -> bool {
        self.exclude.iter().any(|pattern| {
            glob::Pattern::new(pattern)
                .map(|pattern| pattern.matches_path(path))
                .unwrap_or(false)
        })
    }

    fn validate(&self) -> Result<()> {
        self.tasks.validate()?;

        if self.lists.is_empty() {
            return Err(Error::InvalidConfig("lists cannot be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for list in &self.lists {
            let name = list.name.trim();
            if name.is_empty() || name != list.name {
                return Err(Error::InvalidConfig(format!(
                    "lists: invalid list name '{}'",
                    list.name
                )));
            }
            if !name
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-')
            {
                return Err(Error::InvalidConfig(format!(
                    "lists: list name '{name}' must be alphanumeric, '_' or '-'"
                )));
            }
            if !seen.insert(name.to_string()) {
                return Err(Error::InvalidConfig(format!(
                    "lists: duplicate list '{name}'"
                )));
            }
        }
        for (field, name) in [
            ("tasks.default_list", &self.tasks.default_list),
            ("tasks.done_list", &self.tasks.done_list),
        ] {
            if !seen.contains(name.as_str()) {
                return Err(Error::InvalidConfig(format!(
                    "{field} '{name}' not in lists"
                )));
            }
        }

        for pattern in &self.exclude {
            if pattern.trim().is_empty() {
                return Err(Error::InvalidConfig(
                    "exclude: pattern cannot be empty".to_string(),
                ));
            }
            glob::Pattern::new(pattern).map_err(|err| {
                Error::InvalidConfig(format!("exclude: invalid glob pattern '{pattern}': {err}"))
            })?;
        }

        for (ext, lang) in &self.languages {
            if lang.symbol.is_empty() && lang.block.is_none() {
                return Err(Error::InvalidConfig(format!(
                    "languages.{ext}: needs a symbol or a block comment"
                )));
            }
        }

        Ok(())
    }
}
