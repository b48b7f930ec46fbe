use super::app_config::LogLevel;
use crate::infrastructure::media::ResizeFilter;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "notimedia",
    version,
    about = "Fetch, cache and width-cap notification images",
    long_about = None
)]
pub struct CliArgs {
    /// Image URLs to fetch.
    #[arg(value_name = "URL", required = true)]
    pub urls: Vec<String>,

    /// Configuration file path.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Write the effective configuration back to the config file.
    #[arg(long)]
    pub write_config: bool,

    /// Log file path. Logs go to stderr when omitted.
    #[arg(long, value_name = "PATH")]
    pub log_path: Option<PathBuf>,

    /// Log verbosity level.
    #[arg(long, value_enum)]
    pub log_level: Option<LogLevel>,

    /// Width images are capped to.
    #[arg(short, long)]
    pub width: Option<f64>,

    /// Refit cached images to this width after fetching.
    #[arg(long, value_name = "WIDTH")]
    pub refit_width: Option<f64>,

    /// Fetch rounds to run, retrying failed URLs within the retry budget.
    #[arg(long, default_value_t = 1)]
    pub rounds: u32,

    /// Fetch attempts allowed per URL.
    #[arg(long)]
    pub max_attempts: Option<u32>,

    /// Maximum concurrent network fetches.
    #[arg(long)]
    pub max_concurrent_fetches: Option<usize>,

    /// Maximum concurrent resizes.
    #[arg(long)]
    pub max_concurrent_resizes: Option<usize>,

    /// Request timeout in seconds.
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Resampling filter.
    #[arg(long, value_enum)]
    pub resize_filter: Option<ResizeFilter>,
}
