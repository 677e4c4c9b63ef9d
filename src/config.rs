//! Configuration management for shelve.
//!
//! This module handles loading and saving configuration from/to TOML files.
//! Configuration covers the media classes and their extensions, the
//! classification policy, transfer and conflict settings, metadata store
//! defaults, traversal rules, and UI preferences. On first run, a default
//! configuration is automatically created.

use chrono::NaiveDate;
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::conflict::ConflictAction;
use crate::transfer::TransferMode;

/// Main configuration structure for shelve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Media class folder name -> dot-prefixed extensions
    pub categories: BTreeMap<String, Vec<String>>,
    pub classify: ClassifyConfig,
    pub transfer: TransferConfig,
    pub conflict: ConflictConfig,
    pub metadata: MetadataConfig,
    pub scan: ScanConfig,
    pub ui: UIConfig,
}

/// Which classification policy an organize run uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifyMode {
    Extension,
    Name,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifyConfig {
    pub mode: ClassifyMode,
    /// Substring searched for in file names when `mode = "name"`
    pub name_pattern: String,
    /// Destination folder for files matched by name
    pub name_folder: String,
    pub case_sensitive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    pub mode: TransferMode,
    /// Maximum number of in-flight move/copy operations
    pub max_concurrent_transfers: usize,
    /// Flush the metadata store after this many successful transfers
    pub flush_every: usize,
    /// Compute and use content hashes for duplicate detection
    pub hash: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConflictConfig {
    /// Applied to every conflict without prompting. When unset, conflicts are
    /// prompted for, which requires a terminal.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_action: Option<ConflictAction>,
    pub max_suffix_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataConfig {
    pub default_file: PathBuf,
    /// Birth dates some filesystems report when the real one is unknown
    pub invalid_dates: Vec<NaiveDate>,
}

/// Directory traversal configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Entries whose name starts with this prefix are skipped
    pub hidden_prefix: String,
    /// Entry names that are always skipped
    pub exclude_names: Vec<String>,
    pub follow_symlinks: bool,
}

/// User interface configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UIConfig {
    pub color: ColorConfig,
}

/// Color theme configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColorConfig {
    /// Theme name: "default", "cyan", "magenta", "yellow", "green", "red", "blue", "white"
    pub theme: String,
}

impl Default for Config {
    fn default() -> Self {
        let mut categories = BTreeMap::new();

        categories.insert(
            "images".to_string(),
            vec![
                // Common formats
                ".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".tif", ".webp",
                // Apple formats
                ".heic", ".heif", // RAW camera formats
                ".raw", ".cr2", ".nef", ".arw", ".dng", ".orf", ".rw2",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        categories.insert(
            "videos".to_string(),
            vec![
                ".mp4", ".avi", ".mov", ".mkv", ".wmv", ".flv", ".webm", ".m4v", ".mpg", ".mpeg",
                ".3gp", ".mts", ".m2ts",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        );

        Self {
            categories,
            classify: ClassifyConfig {
                mode: ClassifyMode::Extension,
                name_pattern: "Screenshot".to_string(),
                name_folder: "screenshots".to_string(),
                case_sensitive: true,
            },
            transfer: TransferConfig {
                mode: TransferMode::Move,
                max_concurrent_transfers: 10,
                flush_every: 100,
                hash: true,
            },
            conflict: ConflictConfig {
                default_action: None,
                max_suffix_attempts: 9999,
            },
            metadata: MetadataConfig {
                default_file: PathBuf::from("metadata.json"),
                invalid_dates: vec![
                    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default(),
                    NaiveDate::from_ymd_opt(1980, 1, 1).unwrap_or_default(),
                ],
            },
            scan: ScanConfig {
                hidden_prefix: ".".to_string(),
                exclude_names: vec![
                    "System Volume Information".to_string(),
                    "$RECYCLE.BIN".to_string(),
                    "node_modules".to_string(),
                ],
                follow_symlinks: false,
            },
            ui: UIConfig {
                color: ColorConfig {
                    theme: "default".to_string(),
                },
            },
        }
    }
}

impl Config {
    /// Returns the configuration directory path.
    ///
    /// Typically `~/.config/shelve` on Unix systems or `%USERPROFILE%/.config/shelve` on Windows.
    ///
    /// # Errors
    ///
    /// Returns an error if the home directory cannot be determined.
    fn get_config_dir() -> Result<PathBuf> {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .map_err(|_| color_eyre::eyre::eyre!("Could not determine home directory"))?;

        Ok(PathBuf::from(home).join(".config").join("shelve"))
    }

    fn get_config_path() -> Result<PathBuf> {
        Ok(Self::get_config_dir()?.join("config.toml"))
    }

    /// Loads configuration from the user config file, creating default if it doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if file I/O fails or if the TOML is malformed.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use shelve::config::Config;
    ///
    /// # fn main() -> color_eyre::Result<()> {
    /// let config = Config::load()?;
    /// println!("Moving with {} workers", config.transfer.max_concurrent_transfers);
    /// # Ok(())
    /// # }
    /// ```
    pub fn load() -> Result<Self> {
        let config_path = Self::get_config_path()?;

        if !config_path.exists() {
            tracing::info!("Config file not found, creating default config");
            let config = Self::default();
            config.save_to(&config_path)?;
            tracing::info!("Default config created at: {}", config_path.display());
            return Ok(config);
        }

        Self::load_from(&config_path)
    }

    /// Loads configuration from an explicit file. The file must exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            color_eyre::eyre::eyre!("Could not read config {}: {}", path.display(), e)
        })?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;

        Ok(config)
    }

    /// Saves the configuration to `path`, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let contents = toml::to_string_pretty(self)?;
        fs::write(path, contents)?;

        Ok(())
    }

    /// Rejects values that would make a run meaningless.
    pub fn validate(&self) -> Result<()> {
        if self.transfer.max_concurrent_transfers == 0 {
            color_eyre::eyre::bail!("transfer.max_concurrent_transfers must be at least 1");
        }
        if self.transfer.flush_every == 0 {
            color_eyre::eyre::bail!("transfer.flush_every must be at least 1");
        }
        if self.classify.mode == ClassifyMode::Name && self.classify.name_pattern.is_empty() {
            color_eyre::eyre::bail!("classify.name_pattern must not be empty in name mode");
        }
        if self.classify.mode == ClassifyMode::Extension && self.categories.is_empty() {
            color_eyre::eyre::bail!("at least one media category is required in extension mode");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();

        assert!(config.categories.contains_key("images"));
        assert!(config.categories.contains_key("videos"));

        assert_eq!(config.classify.mode, ClassifyMode::Extension);
        assert_eq!(config.transfer.max_concurrent_transfers, 10);
        assert_eq!(config.transfer.mode, TransferMode::Move);
        assert!(config.transfer.hash);
        assert!(config.conflict.default_action.is_none());

        assert_eq!(config.scan.hidden_prefix, ".");
        assert!(
            config
                .scan
                .exclude_names
                .contains(&"node_modules".to_string())
        );
        assert_eq!(config.ui.color.theme, "default");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_image_extensions() {
        let config = Config::default();
        let images = &config.categories["images"];

        assert!(images.contains(&".jpg".to_string()));
        assert!(images.contains(&".jpeg".to_string()));
        assert!(images.contains(&".heic".to_string()));
        assert!(images.contains(&".cr2".to_string()));
    }

    #[test]
    fn test_config_sentinel_dates() {
        let config = Config::default();
        let epoch = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert!(config.metadata.invalid_dates.contains(&epoch));
    }

    #[test]
    fn test_config_save_and_load_from() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.conflict.default_action = Some(ConflictAction::Suffix);
        config.transfer.mode = TransferMode::Copy;
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.conflict.default_action, Some(ConflictAction::Suffix));
        assert_eq!(loaded.transfer.mode, TransferMode::Copy);
    }

    #[test]
    fn test_config_toml_names() {
        let toml = toml::to_string_pretty(&Config::default()).unwrap();
        assert!(toml.contains("mode = \"extension\""));
        assert!(toml.contains("mode = \"move\""));
        assert!(toml.contains("invalid_dates"));
    }

    #[test]
    fn test_config_validate_rejects_zero_workers() {
        let mut config = Config::default();
        config.transfer.max_concurrent_transfers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_validate_rejects_empty_pattern() {
        let mut config = Config::default();
        config.classify.mode = ClassifyMode::Name;
        config.classify.name_pattern.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_load_from_missing_file() {
        let temp = TempDir::new().unwrap();
        assert!(Config::load_from(&temp.path().join("nope.toml")).is_err());
    }
}
