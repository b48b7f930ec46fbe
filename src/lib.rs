//! Notimedia - concurrent fetch, cache and resize engine for notification images.
//!
//! Images are keyed by URL. Each one is downloaded at most a bounded number of
//! times, cached at full resolution, and kept as a copy capped to the most
//! recently requested width.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

/// Domain layer containing entities, errors, and port definitions.
pub mod domain;
/// Infrastructure layer containing adapters for external services.
pub mod infrastructure;

pub use domain::{ImageSize, MediaError, MediaStatus, MediaUrl};
pub use infrastructure::{BatchOutcome, DownloaderConfig, MediaDownloader};

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name.
pub const NAME: &str = "notimedia";
