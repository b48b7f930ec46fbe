use std::collections::HashSet;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use notimedia::infrastructure::{AppConfig, BatchOutcome, CliArgs, MediaDownloader, StorageManager};
use notimedia::{MediaStatus, MediaUrl};

fn init_logging(config: &AppConfig) -> Result<()> {
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(config.log_level.to_tracing_level()).into())
        .from_env_lossy();

    if let Some(log_path) = &config.log_path {
        if let Some(parent) = log_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(log_path)?;

        let file_layer = fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_target(true)
            .with_thread_ids(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();

        info!(path = %log_path.display(), "Logging initialized");
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    Ok(())
}

fn load_config(args: &CliArgs) -> Result<AppConfig> {
    let storage = match &args.config {
        Some(path) => StorageManager::with_path(path.clone()),
        None => StorageManager::new()?,
    };

    let mut config = storage.load_config()?;
    config.merge_with_args(args);
    config.validate()?;

    if args.write_config {
        storage.save_config(&config)?;
        println!("wrote {}", storage.config_path().display());
    }
    Ok(config)
}

fn parse_urls(raw: &[String]) -> HashSet<MediaUrl> {
    raw.iter()
        .filter_map(|input| match MediaUrl::parse(input) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(input = %input, error = %e, "Skipping invalid URL");
                None
            }
        })
        .collect()
}

fn print_outcome(label: &str, outcome: Option<&BatchOutcome>) {
    match outcome {
        Some(outcome) => {
            println!("{label}: {} settled", outcome.len());
            for (url, result) in &outcome.results {
                match result {
                    Ok(size) => println!("  ok    {url} -> {size}"),
                    Err(e) => println!("  error {url}: {e}"),
                }
            }
        }
        None => println!("{label}: nothing to do"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = CliArgs::parse();
    let config = load_config(&args).wrap_err("Failed to load configuration")?;
    init_logging(&config)?;

    info!(version = notimedia::VERSION, "Starting notimedia");

    let urls = parse_urls(&args.urls);
    let downloader = MediaDownloader::new(config.downloader.clone())?;

    for round in 1..=args.rounds.max(1) {
        let outcome = downloader.fetch_and_cache(&urls, config.target_width).await;
        print_outcome(&format!("fetch round {round}"), outcome.as_ref());
        if outcome.is_none() {
            break;
        }
    }

    if let Some(width) = args.refit_width {
        let outcome = downloader.refit_cached_images(width).await;
        print_outcome(&format!("refit to {width}"), outcome.as_ref());
    }

    let mut ordered: Vec<MediaUrl> = urls.into_iter().collect();
    ordered.sort();
    let found = downloader.lookup(&ordered);
    for url in &ordered {
        let status = downloader.status(url);
        match found.get(url) {
            Some(image) => println!("{url}: {status}, {}x{}", image.width(), image.height()),
            None if status == MediaStatus::Exhausted => println!("{url}: gave up"),
            None => println!("{url}: {status}"),
        }
    }
    println!("{}", downloader.stats());

    downloader.shutdown();
    Ok(())
}
