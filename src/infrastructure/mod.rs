//! Infrastructure layer with external service adapters.

/// Application configuration.
pub mod config;
/// Media fetching, caching and resizing.
pub mod media;

pub use config::{AppConfig, CliArgs, ConfigError, LogLevel, StorageManager};
pub use media::{
    BatchOutcome, CacheStats, DownloaderConfig, HttpMediaFetcher, MediaDownloader, MediaStore,
    ResizeFilter, capped_size,
};
