//! Application configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::args::CliArgs;
use super::storage::ConfigError;
use crate::infrastructure::media::DownloaderConfig;

/// Default width images are capped to.
pub const DEFAULT_TARGET_WIDTH: f64 = 375.0;

/// Log level configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Trace level.
    Trace,
    /// Debug level.
    Debug,
    /// Info level.
    #[default]
    Info,
    /// Warning level.
    Warn,
    /// Error level.
    Error,
}

impl LogLevel {
    /// Converts to tracing level.
    #[must_use]
    pub const fn to_tracing_level(self) -> tracing::Level {
        match self {
            Self::Trace => tracing::Level::TRACE,
            Self::Debug => tracing::Level::DEBUG,
            Self::Info => tracing::Level::INFO,
            Self::Warn => tracing::Level::WARN,
            Self::Error => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Trace => write!(f, "trace"),
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// Application configuration, read from `config.toml` and overridden by CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Log file path. Logs go to stderr when unset.
    #[serde(skip)]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Width images are capped to.
    #[serde(default = "default_target_width")]
    pub target_width: f64,

    /// Downloader tuning.
    #[serde(default)]
    pub downloader: DownloaderConfig,
}

fn default_target_width() -> f64 {
    DEFAULT_TARGET_WIDTH
}

impl AppConfig {
    /// Merges CLI arguments into the configuration.
    pub fn merge_with_args(&mut self, args: &CliArgs) {
        if let Some(log_path) = &args.log_path {
            self.log_path = Some(log_path.clone());
        }
        if let Some(log_level) = args.log_level {
            self.log_level = log_level;
        }
        if let Some(width) = args.width {
            self.target_width = width;
        }
        if let Some(max_attempts) = args.max_attempts {
            self.downloader.max_attempts = max_attempts;
        }
        if let Some(fetches) = args.max_concurrent_fetches {
            self.downloader.max_concurrent_fetches = fetches;
        }
        if let Some(resizes) = args.max_concurrent_resizes {
            self.downloader.max_concurrent_resizes = resizes;
        }
        if let Some(timeout) = args.timeout_secs {
            self.downloader.timeout_secs = timeout;
        }
        if let Some(filter) = args.resize_filter {
            self.downloader.resize_filter = filter;
        }
    }

    /// Checks values that would make the downloader useless.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.target_width.is_finite() || self.target_width <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "target_width must be a positive number, got {}",
                self.target_width
            )));
        }
        if self.downloader.max_attempts == 0 {
            return Err(ConfigError::Invalid(
                "downloader.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.downloader.max_concurrent_fetches == 0 {
            return Err(ConfigError::Invalid(
                "downloader.max_concurrent_fetches must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            log_path: None,
            log_level: LogLevel::Info,
            target_width: DEFAULT_TARGET_WIDTH,
            downloader: DownloaderConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::media::ResizeFilter;
    use clap::Parser;

    #[test]
    fn test_parse_config_with_downloader_section() {
        let toml_content = r#"
            log_level = "debug"
            target_width = 414.0

            [downloader]
            max_attempts = 5
            resize_filter = "lanczos3"
        "#;

        let config: AppConfig = toml::from_str(toml_content).expect("Failed to parse config");

        assert_eq!(config.log_level, LogLevel::Debug);
        assert!((config.target_width - 414.0).abs() < f64::EPSILON);
        assert_eq!(config.downloader.max_attempts, 5);
        assert_eq!(config.downloader.resize_filter, ResizeFilter::Lanczos3);
        // Unspecified fields keep their defaults.
        assert_eq!(config.downloader.max_concurrent_fetches, 4);
        assert_eq!(config.downloader.timeout_secs, 30);
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();

        assert_eq!(config.log_level, LogLevel::Info);
        assert_eq!(config.downloader.max_attempts, 3);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_merge_with_args_overrides() {
        let args = CliArgs::parse_from([
            "notimedia",
            "--width",
            "320",
            "--max-attempts",
            "1",
            "--log-level",
            "trace",
            "https://example.com/a.png",
        ]);
        let mut config = AppConfig::default();

        config.merge_with_args(&args);

        assert!((config.target_width - 320.0).abs() < f64::EPSILON);
        assert_eq!(config.downloader.max_attempts, 1);
        assert_eq!(config.log_level, LogLevel::Trace);
        assert_eq!(config.downloader.max_concurrent_fetches, 4);
        assert!(config.log_path.is_none());
    }

    #[test]
    fn test_log_path_only_set_when_given() {
        let args = CliArgs::parse_from([
            "notimedia",
            "--log-path",
            "/tmp/notimedia.log",
            "https://example.com/a.png",
        ]);
        let mut config = AppConfig::default();

        config.merge_with_args(&args);

        assert_eq!(config.log_path, Some(PathBuf::from("/tmp/notimedia.log")));
    }

    #[test]
    fn test_log_level_maps_to_tracing_level() {
        assert_eq!(LogLevel::Trace.to_tracing_level(), tracing::Level::TRACE);
        assert_eq!(LogLevel::Warn.to_tracing_level(), tracing::Level::WARN);
        assert_eq!(LogLevel::default().to_tracing_level(), tracing::Level::INFO);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig {
            target_width: 0.0,
            ..AppConfig::default()
        };
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.target_width = 320.0;
        config.downloader.max_attempts = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }
}
