use super::app_config::AppConfig;
use directories::ProjectDirs;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, warn};

const APP_QUALIFIER: &str = "com";
const APP_ORGANIZATION: &str = "notimedia";
const APP_NAME: &str = "notimedia";
const CONFIG_FILE_NAME: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to determine config directory")]
    ConfigDirNotFound,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("toml serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Locates, reads and writes `config.toml`.
pub struct StorageManager {
    config_path: PathBuf,
}

impl StorageManager {
    /// Uses `config.toml` in the platform config directory.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the configuration directory cannot be determined.
    pub fn new() -> Result<Self, ConfigError> {
        let dir = ProjectDirs::from(APP_QUALIFIER, APP_ORGANIZATION, APP_NAME)
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::ConfigDirNotFound)?;

        Ok(Self::with_path(dir.join(CONFIG_FILE_NAME)))
    }

    /// Uses an explicit config file.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self { config_path: path }
    }

    /// Returns the config file path.
    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Reads the configuration.
    ///
    /// A missing file yields defaults without touching the filesystem. A
    /// malformed file is reported and defaults are used.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an existing file cannot be read.
    pub fn load_config(&self) -> Result<AppConfig, ConfigError> {
        if !self.config_path.exists() {
            debug!(path = %self.config_path.display(), "No config file, using defaults");
            return Ok(AppConfig::default());
        }

        let content = fs::read_to_string(&self.config_path)?;
        Ok(toml::from_str::<AppConfig>(&content).unwrap_or_else(|e| {
            warn!(path = %self.config_path.display(), error = %e, "Ignoring malformed config file");
            AppConfig::default()
        }))
    }

    /// Writes `config` atomically, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be written.
    pub fn save_config(&self, config: &AppConfig) -> Result<(), ConfigError> {
        let parent = self
            .config_path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent)?;

        let content = toml::to_string_pretty(config)?;
        let mut temp_file = tempfile::NamedTempFile::new_in(parent)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.persist(&self.config_path).map_err(|e| e.error)?;

        info!(path = %self.config_path.display(), "Wrote configuration");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_config_uses_defaults_without_writing() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let manager = StorageManager::with_path(config_path.clone());

        let config = manager.load_config().unwrap();

        assert_eq!(config, AppConfig::default());
        assert!(!config_path.exists());
        assert!(!dir.path().join("nested").exists());
    }

    #[test]
    fn test_load_config_handles_malformed_file() {
        let dir = tempdir().unwrap();
        let config_file = dir.path().join(CONFIG_FILE_NAME);
        let manager = StorageManager::with_path(config_file.clone());

        fs::write(&config_file, "target_width = [").unwrap();

        let config = manager.load_config().unwrap();
        assert_eq!(config, AppConfig::default());
        let content = fs::read_to_string(&config_file).unwrap();
        assert_eq!(content, "target_width = [");
    }

    #[test]
    fn test_load_config_reads_values() {
        let dir = tempdir().unwrap();
        let custom = dir.path().join("custom.toml");
        fs::write(&custom, "target_width = 600.0\n[downloader]\nmax_attempts = 2\n").unwrap();

        let config = StorageManager::with_path(custom).load_config().unwrap();

        assert!((config.target_width - 600.0).abs() < f64::EPSILON);
        assert_eq!(config.downloader.max_attempts, 2);
    }

    #[test]
    fn test_save_creates_directories_and_reloads() {
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("notimedia").join(CONFIG_FILE_NAME);
        let manager = StorageManager::with_path(config_path.clone());

        let mut config = AppConfig::default();
        config.downloader.max_concurrent_fetches = 8;
        manager.save_config(&config).unwrap();

        assert!(config_path.exists());
        let loaded = manager.load_config().unwrap();
        assert_eq!(loaded.downloader.max_concurrent_fetches, 8);
        assert_eq!(manager.config_path(), config_path.as_path());
    }
}
