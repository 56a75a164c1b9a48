use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::default::Default;
use std::path::{Path, PathBuf};

/// Application configuration module
/// This module handles the application configuration including loading,
/// validating and saving configuration settings.
/// Represents the application configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Config {
    /// Persistent id inventory settings
    #[serde(default)]
    pub inventory: InventoryConfig,

    /// Operation extraction settings
    #[serde(default)]
    pub extraction: ExtractionConfig,

    /// Text replayer settings
    #[serde(default)]
    pub replay: ReplayConfig,

    /// Foreign transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// Directory holding operations files
    #[serde(default = "default_operations_dir")]
    pub operations_dir: PathBuf,

    /// Maximum number of files processed at the same time
    #[serde(default = "default_concurrent_files")]
    pub concurrent_files: usize,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,
}

/// Persistent id inventory configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InventoryConfig {
    // @field: Inventory file (newline-delimited ids)
    #[serde(default = "default_inventory_path")]
    pub path: PathBuf,

    // @field: Characters per id
    #[serde(default = "default_id_length")]
    pub id_length: usize,

    // @field: Characters ids are drawn from
    #[serde(default = "default_alphabet")]
    pub alphabet: String,
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            path: default_inventory_path(),
            id_length: default_id_length(),
            alphabet: default_alphabet(),
        }
    }
}

/// Operation extraction configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ExtractionConfig {
    /// Maximum distance in characters between a text change and a boundary
    /// change for both to be classified as one merge or split
    #[serde(default = "default_hunk_proximity")]
    pub hunk_proximity: usize,

    /// Prefix of temporary ids given to new subtitles before resolution
    #[serde(default = "default_placeholder_prefix")]
    pub placeholder_prefix: String,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            hunk_proximity: default_hunk_proximity(),
            placeholder_prefix: default_placeholder_prefix(),
        }
    }
}

/// Text replayer configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ReplayConfig {
    /// Characters of context compared on each side of a token
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Minimum context similarity (0.0 to 1.0) for a token to be placed
    #[serde(default = "default_min_similarity")]
    pub min_similarity: f64,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            context_window: default_context_window(),
            min_similarity: default_min_similarity(),
        }
    }
}

/// Foreign transfer configuration
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TransferConfig {
    /// Route foreign files whose sync commit differs from the operations'
    /// from commit to manual review
    #[serde(default = "default_true")]
    pub require_commit_match: bool,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            require_commit_match: true,
        }
    }
}

/// Log verbosity level
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    // @returns: Matching log crate filter
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

fn default_inventory_path() -> PathBuf {
    PathBuf::from("stid_inventory.txt")
}

fn default_id_length() -> usize {
    7
}

// No 0/o, 1/l/i
fn default_alphabet() -> String {
    "abcdefghjkmnpqrstuvwxyz23456789".to_string()
}

fn default_hunk_proximity() -> usize {
    20
}

fn default_placeholder_prefix() -> String {
    "tmp-".to_string()
}

fn default_context_window() -> usize {
    16
}

fn default_min_similarity() -> f64 {
    0.5
}

fn default_operations_dir() -> PathBuf {
    PathBuf::from("subtitle_operations")
}

fn default_concurrent_files() -> usize {
    4
}

fn default_true() -> bool {
    true
}

impl Config {
    /// Load a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        let config: Config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;
        Ok(config)
    }

    /// Save the configuration as pretty JSON
    pub fn save(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Validate the configuration for consistency and required values
    pub fn validate(&self) -> Result<()> {
        if self.inventory.id_length == 0 {
            return Err(anyhow!("Inventory id_length must be greater than 0"));
        }

        let mut chars: Vec<char> = self.inventory.alphabet.chars().collect();
        chars.sort_unstable();
        chars.dedup();
        if chars.len() < 2 {
            return Err(anyhow!("Inventory alphabet needs at least two distinct characters"));
        }
        if chars.iter().any(|c| c.is_whitespace()) {
            return Err(anyhow!("Inventory alphabet must not contain whitespace"));
        }

        if self.extraction.placeholder_prefix.is_empty() {
            return Err(anyhow!("Extraction placeholder_prefix must not be empty"));
        }

        if self.replay.context_window == 0 {
            return Err(anyhow!("Replay context_window must be greater than 0"));
        }
        if !(0.0..=1.0).contains(&self.replay.min_similarity) {
            return Err(anyhow!(
                "Replay min_similarity must be between 0.0 and 1.0, got {}",
                self.replay.min_similarity
            ));
        }

        if self.concurrent_files == 0 {
            return Err(anyhow!("concurrent_files must be greater than 0"));
        }

        Ok(())
    }
}

/// Default implementation for Config
impl Default for Config {
    fn default() -> Self {
        Config {
            inventory: InventoryConfig::default(),
            extraction: ExtractionConfig::default(),
            replay: ReplayConfig::default(),
            transfer: TransferConfig::default(),
            operations_dir: default_operations_dir(),
            concurrent_files: default_concurrent_files(),
            log_level: LogLevel::default(),
        }
    }
}
