//! Sifter configuration
//!
//! Defaults, overridden by `settings.json` in the platform config directory
//! (~/.config/meme-sifter/ on Linux), then by `MEME_SIFTER_*` environment
//! variables. A `.env` file is loaded by `run()` before this is read.

use crate::error::ConfigError;
use crate::models::MAX_AUTHORIZATION_BATCH;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Images recognized concurrently, and published together, per batch
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Relative folder memes are moved into; also excluded from every scan
pub const DEFAULT_DESTINATION: &str = "Pictures/Memes";

const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SifterConfig {
    pub batch_size: usize,
    /// Most handles covered by one write-access request (at most 50)
    pub authorization_cap: usize,
    pub destination_folder: String,
    /// Storage root that relative paths and location handles resolve against
    pub library_root: PathBuf,
    /// Folders under the root to scan
    pub scan_folders: Vec<String>,
    pub ocr_command: String,
    /// Chinese + English by default
    pub ocr_languages: String,
    pub ocr_timeout_secs: u64,
}

impl Default for SifterConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            authorization_cap: MAX_AUTHORIZATION_BATCH,
            destination_folder: DEFAULT_DESTINATION.to_string(),
            library_root: dirs::home_dir().unwrap_or_else(|| PathBuf::from(".")),
            scan_folders: vec![
                "Pictures".to_string(),
                "DCIM".to_string(),
                "Download".to_string(),
            ],
            ocr_command: "tesseract".to_string(),
            ocr_languages: "chi_sim+eng".to_string(),
            ocr_timeout_secs: 30,
        }
    }
}

impl SifterConfig {
    /// Get the default settings path (~/.config/meme-sifter/settings.json)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("meme-sifter").join(SETTINGS_FILE))
    }

    /// Load settings from the default location, then apply the environment
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = match Self::default_path() {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Read a settings file; a missing file yields the defaults
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let json = fs::read_to_string(path)?;
        let config: SifterConfig = serde_json::from_str(&json)?;

        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(config)
    }

    /// Write settings, creating the parent directory if needed
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Apply `MEME_SIFTER_*` overrides using `lookup` to read variables
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("MEME_SIFTER_BATCH_SIZE") {
            self.batch_size = value.trim().parse().map_err(|_| ConfigError::Invalid {
                field: "batchSize",
                reason: format!("not a number: {}", value),
            })?;
        }
        if let Some(value) = lookup("MEME_SIFTER_DESTINATION") {
            self.destination_folder = value;
        }
        if let Some(value) = lookup("MEME_SIFTER_LIBRARY_ROOT") {
            self.library_root = PathBuf::from(value);
        }
        if let Some(value) = lookup("MEME_SIFTER_OCR_COMMAND") {
            self.ocr_command = value;
        }
        if let Some(value) = lookup("MEME_SIFTER_OCR_LANGUAGES") {
            self.ocr_languages = value;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid {
                field: "batchSize",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.authorization_cap == 0 || self.authorization_cap > MAX_AUTHORIZATION_BATCH {
            return Err(ConfigError::Invalid {
                field: "authorizationCap",
                reason: format!("must be between 1 and {}", MAX_AUTHORIZATION_BATCH),
            });
        }
        if self.destination_folder.trim_matches('/').trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "destinationFolder",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    /// Absolute path of the destination folder
    pub fn destination_path(&self) -> PathBuf {
        self.library_root
            .join(self.destination_folder.trim_matches('/'))
    }
}
