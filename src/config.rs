//! Configuration: defaults, TOML file parsing, platform config directory.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Explorer configuration. Every field has a default so a missing or partial
/// config file is fine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    /// Rows per page served to the table sink.
    pub page_size: usize,
    /// Distinct query results kept before LRU eviction.
    pub cache_capacity: usize,
    /// Row target for the bundled demo dataset.
    pub demo_rows: usize,
    pub csv: CsvConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvConfig {
    /// Single ASCII delimiter for CSV uploads and exports.
    pub delimiter: char,
    pub has_header: bool,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            page_size: 50,
            cache_capacity: 64,
            // One full pass of the classic 142-country, 12-year panel.
            demo_rows: 1704,
            csv: CsvConfig::default(),
        }
    }
}

impl Default for CsvConfig {
    fn default() -> Self {
        Self {
            delimiter: ',',
            has_header: true,
        }
    }
}

impl ExplorerConfig {
    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self> {
        let config: ExplorerConfig =
            toml::from_str(input).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()
    }

    fn validate(self) -> Result<Self> {
        if self.page_size == 0 {
            return Err(Error::Config("page_size must be positive".to_string()));
        }
        if self.cache_capacity == 0 {
            return Err(Error::Config(
                "cache_capacity must be positive".to_string(),
            ));
        }
        if !self.csv.delimiter.is_ascii() {
            return Err(Error::Config(format!(
                "csv.delimiter must be a single ASCII character, got '{}'",
                self.csv.delimiter
            )));
        }
        Ok(self)
    }

    /// The delimiter as the byte Polars readers and writers take.
    pub fn delimiter_byte(&self) -> u8 {
        self.csv.delimiter as u8
    }

    /// Load from the manager's config file, falling back to defaults when the
    /// file does not exist. A present-but-malformed file is an error so typos
    /// do not silently revert settings.
    pub fn load_or_default(manager: &ConfigManager) -> Result<Self> {
        let path = manager.config_file();
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(&path)?;
        Self::from_toml_str(&contents)
    }
}

/// Locates the config directory and file.
#[derive(Clone)]
pub struct ConfigManager {
    config_dir: PathBuf,
}

impl ConfigManager {
    /// Create a ConfigManager with a custom config directory (primarily for testing)
    pub fn with_dir(config_dir: PathBuf) -> Self {
        Self { config_dir }
    }

    /// Create a new ConfigManager for the given app name
    pub fn new(app_name: &str) -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not determine config directory".to_string()))?
            .join(app_name);
        Ok(Self { config_dir })
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("config.toml")
    }
}
