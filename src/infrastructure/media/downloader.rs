//! Concurrent fetch, cache and resize coordinator.
//!
//! A batch claims every eligible URL under the store lock, runs one unit of
//! work per URL (fetch, decode, store original, resize, store resized) in a
//! `JoinSet`, and resolves once after all units settled.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use image::DynamicImage;
use image::imageops::FilterType;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::domain::entities::{ImageSize, MediaStatus, MediaUrl};
use crate::domain::errors::MediaError;
use crate::domain::ports::MediaFetcherPort;

use super::http_fetcher::{DEFAULT_USER_AGENT, HttpMediaFetcher};
use super::resize::Resizer;
use super::store::{CacheStats, DEFAULT_MAX_ATTEMPTS, MediaStore};

/// Resampling filter used for resizes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ResizeFilter {
    /// Nearest neighbour.
    Nearest,
    /// Linear.
    #[default]
    Triangle,
    /// Cubic.
    CatmullRom,
    /// Gaussian.
    Gaussian,
    /// Lanczos with window 3.
    Lanczos3,
}

impl From<ResizeFilter> for FilterType {
    fn from(filter: ResizeFilter) -> Self {
        match filter {
            ResizeFilter::Nearest => Self::Nearest,
            ResizeFilter::Triangle => Self::Triangle,
            ResizeFilter::CatmullRom => Self::CatmullRom,
            ResizeFilter::Gaussian => Self::Gaussian,
            ResizeFilter::Lanczos3 => Self::Lanczos3,
        }
    }
}

/// Configuration for the media downloader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloaderConfig {
    /// Fetch attempts allowed per URL over the downloader's lifetime.
    pub max_attempts: u32,
    /// Maximum concurrent network fetches.
    pub max_concurrent_fetches: usize,
    /// Maximum concurrent resizes.
    pub max_concurrent_resizes: usize,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// User agent for media requests.
    pub user_agent: String,
    /// Resampling filter.
    pub resize_filter: ResizeFilter,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_concurrent_fetches: 4,
            max_concurrent_resizes: 2,
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            resize_filter: ResizeFilter::default(),
        }
    }
}

/// Per-URL results of one settled batch.
#[derive(Debug, Clone, Default)]
pub struct BatchOutcome {
    /// Final size of each dispatched URL, or why it failed.
    pub results: HashMap<MediaUrl, Result<ImageSize, MediaError>>,
}

impl BatchOutcome {
    /// URLs that produced an image.
    pub fn succeeded(&self) -> impl Iterator<Item = &MediaUrl> {
        self.results
            .iter()
            .filter_map(|(url, result)| result.is_ok().then_some(url))
    }

    /// URLs that failed, with their errors.
    pub fn failed(&self) -> impl Iterator<Item = (&MediaUrl, &MediaError)> {
        self.results
            .iter()
            .filter_map(|(url, result)| result.as_ref().err().map(|e| (url, e)))
    }

    /// Returns true if every unit succeeded.
    #[must_use]
    pub fn is_complete_success(&self) -> bool {
        self.results.values().all(Result::is_ok)
    }

    /// Number of units in the batch.
    #[must_use]
    pub fn len(&self) -> usize {
        self.results.len()
    }

    /// Returns true if the batch had no units.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Fetches, caches and width-caps images keyed by URL.
///
/// Dropping the downloader cancels outstanding work; cache contents written
/// before cancellation stay in place.
pub struct MediaDownloader {
    inner: Arc<Inner>,
}

struct Inner {
    store: Arc<Mutex<MediaStore>>,
    fetcher: Arc<dyn MediaFetcherPort>,
    resizer: Resizer,
    fetch_permits: Arc<Semaphore>,
    shutdown: CancellationToken,
    batch_seq: AtomicU64,
    config: DownloaderConfig,
}

impl std::fmt::Debug for MediaDownloader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaDownloader")
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

impl MediaDownloader {
    /// Creates a downloader fetching over HTTP.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: DownloaderConfig) -> Result<Self, MediaError> {
        let fetcher = HttpMediaFetcher::new(
            Duration::from_secs(config.timeout_secs),
            &config.user_agent,
        )?;
        Ok(Self::with_fetcher(config, Arc::new(fetcher)))
    }

    /// Creates a downloader around any fetcher.
    #[must_use]
    pub fn with_fetcher(config: DownloaderConfig, fetcher: Arc<dyn MediaFetcherPort>) -> Self {
        let inner = Inner {
            store: Arc::new(Mutex::new(MediaStore::new(config.max_attempts))),
            fetcher,
            resizer: Resizer::new(config.resize_filter.into(), config.max_concurrent_resizes),
            fetch_permits: Arc::new(Semaphore::new(config.max_concurrent_fetches.max(1))),
            shutdown: CancellationToken::new(),
            batch_seq: AtomicU64::new(0),
            config,
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    /// Fetches every eligible URL and caches it capped to `target_width`.
    ///
    /// Returns `None` without doing any work when no URL is eligible. A URL is
    /// eligible when it has no cached original, is not in flight and still
    /// has fetch attempts left.
    pub async fn fetch_and_cache(
        &self,
        urls: &HashSet<MediaUrl>,
        target_width: f64,
    ) -> Option<BatchOutcome> {
        let claims = self.inner.claim(urls);
        if claims.is_empty() {
            trace!(requested = urls.len(), "No media eligible for download");
            return None;
        }
        Some(self.inner.clone().run_fetch_batch(claims, target_width).await)
    }

    /// Callback form of [`Self::fetch_and_cache`].
    ///
    /// Eligible URLs are claimed before this returns. `on_complete` runs once
    /// after the batch settled, and never when nothing was eligible, in which
    /// case `None` is returned.
    pub fn spawn_fetch_and_cache<F>(
        &self,
        urls: &HashSet<MediaUrl>,
        target_width: f64,
        on_complete: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(BatchOutcome) + Send + 'static,
    {
        let claims = self.inner.claim(urls);
        if claims.is_empty() {
            trace!(requested = urls.len(), "No media eligible for download");
            return None;
        }
        let inner = self.inner.clone();
        Some(tokio::spawn(async move {
            let outcome = inner.run_fetch_batch(claims, target_width).await;
            on_complete(outcome);
        }))
    }

    /// Re-derives resized images whose size no longer matches `target_width`.
    ///
    /// URLs without a resized image yet are left alone. Returns `None` when
    /// nothing needed a resize.
    pub async fn refit_cached_images(&self, target_width: f64) -> Option<BatchOutcome> {
        let candidates = self.inner.store.lock().refit_candidates(target_width);
        if candidates.is_empty() {
            trace!(target_width, "Cached media already fits");
            return None;
        }
        Some(self.inner.clone().run_refit_batch(candidates, target_width).await)
    }

    /// Callback form of [`Self::refit_cached_images`].
    pub fn spawn_refit_cached_images<F>(
        &self,
        target_width: f64,
        on_complete: F,
    ) -> Option<JoinHandle<()>>
    where
        F: FnOnce(BatchOutcome) + Send + 'static,
    {
        let candidates = self.inner.store.lock().refit_candidates(target_width);
        if candidates.is_empty() {
            trace!(target_width, "Cached media already fits");
            return None;
        }
        let inner = self.inner.clone();
        Some(tokio::spawn(async move {
            let outcome = inner.run_refit_batch(candidates, target_width).await;
            on_complete(outcome);
        }))
    }

    /// Returns the resized images cached for `urls`, skipping absent ones.
    #[must_use]
    pub fn lookup(&self, urls: &[MediaUrl]) -> HashMap<MediaUrl, Arc<DynamicImage>> {
        self.inner.store.lock().lookup(urls)
    }

    /// Returns the cached full-resolution image for `url`.
    #[must_use]
    pub fn original(&self, url: &MediaUrl) -> Option<Arc<DynamicImage>> {
        self.inner.store.lock().original(url)
    }

    /// Returns where `url` stands in the pipeline.
    #[must_use]
    pub fn status(&self, url: &MediaUrl) -> MediaStatus {
        self.inner.store.lock().status(url)
    }

    /// Returns the number of fetch attempts issued for `url`.
    #[must_use]
    pub fn attempts(&self, url: &MediaUrl) -> u32 {
        self.inner.store.lock().attempts(url)
    }

    /// Returns true if a fetch for `url` is in flight.
    #[must_use]
    pub fn is_loading(&self, url: &MediaUrl) -> bool {
        self.inner.store.lock().is_in_flight(url)
    }

    /// Returns the number of in-flight fetches.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.store.lock().in_flight_count()
    }

    /// Returns store statistics.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        self.inner.store.lock().stats()
    }

    /// Returns the active configuration.
    #[must_use]
    pub fn config(&self) -> &DownloaderConfig {
        &self.inner.config
    }

    /// Cancels all outstanding fetches and resizes.
    pub fn shutdown(&self) {
        if !self.inner.shutdown.is_cancelled() {
            debug!(pending = self.pending_count(), "Cancelling outstanding media work");
            self.inner.shutdown.cancel();
        }
    }
}

impl Drop for MediaDownloader {
    fn drop(&mut self) {
        self.inner.shutdown.cancel();
    }
}

impl Inner {
    /// Claims every eligible URL, counting one attempt each.
    fn claim(&self, urls: &HashSet<MediaUrl>) -> Vec<InFlightClaim> {
        if self.shutdown.is_cancelled() {
            return Vec::new();
        }
        let mut store = self.store.lock();
        urls.iter()
            .filter(|url| store.try_begin_fetch(url))
            .map(|url| InFlightClaim::new(self.store.clone(), url.clone()))
            .collect()
    }

    async fn run_fetch_batch(
        self: Arc<Self>,
        claims: Vec<InFlightClaim>,
        target_width: f64,
    ) -> BatchOutcome {
        let batch = self.batch_seq.fetch_add(1, Ordering::Relaxed);
        info!(batch, count = claims.len(), target_width, "Dispatching media batch");

        let mut units = JoinSet::new();
        let mut urls = HashMap::with_capacity(claims.len());
        for claim in claims {
            let url = claim.url.clone();
            let inner = self.clone();
            let handle = units.spawn(async move { inner.fetch_unit(claim, target_width).await });
            urls.insert(handle.id(), url);
        }

        let outcome = collect_units(&mut units, &urls).await;
        info!(
            batch,
            succeeded = outcome.succeeded().count(),
            failed = outcome.failed().count(),
            "Media batch settled"
        );
        outcome
    }

    async fn run_refit_batch(
        self: Arc<Self>,
        candidates: Vec<(MediaUrl, Arc<DynamicImage>)>,
        target_width: f64,
    ) -> BatchOutcome {
        let batch = self.batch_seq.fetch_add(1, Ordering::Relaxed);
        debug!(batch, count = candidates.len(), target_width, "Refitting cached media");

        let mut units = JoinSet::new();
        let mut urls = HashMap::with_capacity(candidates.len());
        for (url, original) in candidates {
            let inner = self.clone();
            let unit_url = url.clone();
            let handle = units.spawn(async move {
                inner.resize_and_store(&unit_url, original, target_width).await
            });
            urls.insert(handle.id(), url);
        }

        collect_units(&mut units, &urls).await
    }

    async fn fetch_unit(
        &self,
        claim: InFlightClaim,
        target_width: f64,
    ) -> Result<ImageSize, MediaError> {
        let fetched = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(MediaError::Cancelled),
            result = self.fetch_original(&claim.url) => result,
        };

        match fetched {
            Ok(original) => {
                let url = claim.succeed(original.clone());
                trace!(url = %url, size = %ImageSize::of(&original), "Cached original");
                self.resize_and_store(&url, original, target_width).await
            }
            Err(e) => {
                let url = claim.url.clone();
                let attempts = self.store.lock().attempts(&url);
                if claim.fail() {
                    warn!(url = %url, attempts, error = %e, "Giving up on media");
                } else {
                    warn!(url = %url, attempts, error = %e, "Media fetch failed");
                }
                Err(e)
            }
        }
    }

    async fn fetch_original(&self, url: &MediaUrl) -> Result<Arc<DynamicImage>, MediaError> {
        let bytes = {
            let _permit = self
                .fetch_permits
                .acquire()
                .await
                .map_err(|e| MediaError::task(e.to_string()))?;
            self.fetcher.fetch(url).await?
        };

        let decoded = tokio::task::spawn_blocking(move || image::load_from_memory(&bytes))
            .await?
            .map_err(|e| MediaError::decode(e.to_string()))?;

        Ok(Arc::new(decoded))
    }

    async fn resize_and_store(
        &self,
        url: &MediaUrl,
        original: Arc<DynamicImage>,
        target_width: f64,
    ) -> Result<ImageSize, MediaError> {
        let resized = tokio::select! {
            biased;
            () = self.shutdown.cancelled() => Err(MediaError::Cancelled),
            result = self.resizer.fit(original, target_width) => result,
        }
        .inspect_err(|e| {
            if !matches!(e, MediaError::Cancelled) {
                error!(url = %url, error = %e, "Resize failed");
            }
        })?;

        let size = ImageSize::of(&resized);
        self.store.lock().store_resized(url, resized);
        Ok(size)
    }
}

async fn collect_units(
    units: &mut JoinSet<Result<ImageSize, MediaError>>,
    urls: &HashMap<tokio::task::Id, MediaUrl>,
) -> BatchOutcome {
    let mut outcome = BatchOutcome {
        results: HashMap::with_capacity(urls.len()),
    };

    while let Some(joined) = units.join_next_with_id().await {
        match joined {
            Ok((id, result)) => {
                if let Some(url) = urls.get(&id) {
                    outcome.results.insert(url.clone(), result);
                }
            }
            Err(e) => {
                if let Some(url) = urls.get(&e.id()) {
                    error!(url = %url, error = %e, "Media task failed");
                    outcome.results.insert(url.clone(), Err(e.into()));
                }
            }
        }
    }

    outcome
}

/// In-flight mark for one URL.
///
/// Released as a failure when dropped unresolved, so an aborted or panicked
/// unit never leaves its URL stuck in flight.
struct InFlightClaim {
    store: Arc<Mutex<MediaStore>>,
    url: MediaUrl,
    resolved: bool,
}

impl InFlightClaim {
    fn new(store: Arc<Mutex<MediaStore>>, url: MediaUrl) -> Self {
        Self {
            store,
            url,
            resolved: false,
        }
    }

    fn succeed(mut self, image: Arc<DynamicImage>) -> MediaUrl {
        self.resolved = true;
        self.store.lock().finish_fetch_success(&self.url, image);
        self.url.clone()
    }

    /// Returns true if the retry budget is now spent.
    fn fail(mut self) -> bool {
        self.resolved = true;
        self.store.lock().finish_fetch_failure(&self.url)
    }
}

impl Drop for InFlightClaim {
    fn drop(&mut self) {
        if !self.resolved {
            self.store.lock().finish_fetch_failure(&self.url);
        }
    }
}
