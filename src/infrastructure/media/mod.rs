//! Notification media handling.
//!
//! This module provides:
//! - An HTTP fetcher for image bytes
//! - The in-memory store of originals, resized images and retry bookkeeping
//! - Width-capped resizing on the blocking pool
//! - The batch coordinator tying them together

pub mod downloader;
pub mod http_fetcher;
pub mod resize;
pub mod store;

pub use downloader::{BatchOutcome, DownloaderConfig, MediaDownloader, ResizeFilter};
pub use http_fetcher::{DEFAULT_USER_AGENT, HttpMediaFetcher};
pub use resize::{Resizer, capped_size};
pub use store::{CacheStats, DEFAULT_MAX_ATTEMPTS, MediaStore};
