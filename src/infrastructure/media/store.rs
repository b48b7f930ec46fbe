//! Cache store for originals, resized images and fetch bookkeeping.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use image::DynamicImage;

use crate::domain::entities::{ImageSize, MediaStatus, MediaUrl};

use super::resize::capped_size;

/// Default number of fetch attempts allowed per URL.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Plain data holder for the downloader.
///
/// Carries no synchronization of its own; the owner guards it with a single
/// lock and never holds that lock across an await point.
#[derive(Debug)]
pub struct MediaStore {
    originals: HashMap<MediaUrl, Arc<DynamicImage>>,
    resized: HashMap<MediaUrl, Arc<DynamicImage>>,
    in_flight: HashSet<MediaUrl>,
    attempts: HashMap<MediaUrl, u32>,
    max_attempts: u32,
}

impl MediaStore {
    /// Creates an empty store with the given retry budget.
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            originals: HashMap::new(),
            resized: HashMap::new(),
            in_flight: HashSet::new(),
            attempts: HashMap::new(),
            max_attempts,
        }
    }

    /// Returns true if `url` may be dispatched right now.
    #[must_use]
    pub fn is_eligible(&self, url: &MediaUrl) -> bool {
        !self.originals.contains_key(url)
            && self.attempts(url) < self.max_attempts
            && !self.in_flight.contains(url)
    }

    /// Marks `url` as in flight and counts the attempt, if it is eligible.
    pub fn try_begin_fetch(&mut self, url: &MediaUrl) -> bool {
        if !self.is_eligible(url) {
            return false;
        }
        self.in_flight.insert(url.clone());
        *self.attempts.entry(url.clone()).or_insert(0) += 1;
        true
    }

    /// Stores the decoded original and clears the in-flight mark.
    pub fn finish_fetch_success(&mut self, url: &MediaUrl, image: Arc<DynamicImage>) {
        self.in_flight.remove(url);
        self.originals.entry(url.clone()).or_insert(image);
    }

    /// Clears the in-flight mark. Returns true if the budget is now spent.
    pub fn finish_fetch_failure(&mut self, url: &MediaUrl) -> bool {
        self.in_flight.remove(url);
        self.attempts(url) >= self.max_attempts
    }

    /// Replaces the resized entry for `url`.
    pub fn store_resized(&mut self, url: &MediaUrl, image: Arc<DynamicImage>) {
        self.resized.insert(url.clone(), image);
    }

    /// Originals whose resized entry no longer matches the capped size for
    /// `max_width`. URLs without a resized entry are skipped.
    #[must_use]
    pub fn refit_candidates(&self, max_width: f64) -> Vec<(MediaUrl, Arc<DynamicImage>)> {
        self.resized
            .iter()
            .filter_map(|(url, current)| {
                let original = self.originals.get(url)?;
                let target = capped_size(ImageSize::of(original), max_width);
                (ImageSize::of(current) != target).then(|| (url.clone(), original.clone()))
            })
            .collect()
    }

    /// Resized images for the requested URLs that are present.
    #[must_use]
    pub fn lookup(&self, urls: &[MediaUrl]) -> HashMap<MediaUrl, Arc<DynamicImage>> {
        urls.iter()
            .filter_map(|url| self.resized.get(url).map(|img| (url.clone(), img.clone())))
            .collect()
    }

    /// Returns the cached original for `url`.
    #[must_use]
    pub fn original(&self, url: &MediaUrl) -> Option<Arc<DynamicImage>> {
        self.originals.get(url).cloned()
    }

    /// Returns the number of attempts issued for `url`.
    #[must_use]
    pub fn attempts(&self, url: &MediaUrl) -> u32 {
        self.attempts.get(url).copied().unwrap_or(0)
    }

    /// Returns true if a fetch for `url` is in flight.
    #[must_use]
    pub fn is_in_flight(&self, url: &MediaUrl) -> bool {
        self.in_flight.contains(url)
    }

    /// Number of in-flight fetches.
    #[must_use]
    pub fn in_flight_count(&self) -> usize {
        self.in_flight.len()
    }

    /// Derives the pipeline status of `url`.
    #[must_use]
    pub fn status(&self, url: &MediaUrl) -> MediaStatus {
        if self.originals.contains_key(url) {
            return MediaStatus::Ready;
        }
        if self.in_flight.contains(url) {
            return MediaStatus::Downloading;
        }
        match self.attempts(url) {
            0 => MediaStatus::NotRequested,
            n if n >= self.max_attempts => MediaStatus::Exhausted,
            attempts => MediaStatus::Failed { attempts },
        }
    }

    /// Returns a snapshot of the store counters.
    #[must_use]
    pub fn stats(&self) -> CacheStats {
        let exhausted = self
            .attempts
            .iter()
            .filter(|(url, n)| {
                **n >= self.max_attempts
                    && !self.originals.contains_key(*url)
                    && !self.in_flight.contains(*url)
            })
            .count();

        CacheStats {
            originals: self.originals.len(),
            resized: self.resized.len(),
            in_flight: self.in_flight.len(),
            exhausted,
            attempts: self.attempts.values().map(|n| u64::from(*n)).sum(),
        }
    }
}

impl Default for MediaStore {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// Counters describing the store contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Cached originals.
    pub originals: usize,
    /// Cached resized images.
    pub resized: usize,
    /// Fetches in flight.
    pub in_flight: usize,
    /// URLs whose retry budget is spent.
    pub exhausted: usize,
    /// Fetch attempts issued overall.
    pub attempts: u64,
}

impl std::fmt::Display for CacheStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Media: {} originals, {} resized, {} in flight, {} exhausted ({} attempts)",
            self.originals, self.resized, self.in_flight, self.exhausted, self.attempts
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(name: &str) -> MediaUrl {
        MediaUrl::parse(&format!("https://example.com/{name}.png")).unwrap()
    }

    fn img(w: u32, h: u32) -> Arc<DynamicImage> {
        Arc::new(DynamicImage::new_rgb8(w, h))
    }

    #[test]
    fn test_begin_fetch_marks_in_flight_and_counts() {
        let mut store = MediaStore::default();
        let a = url("a");

        assert!(store.try_begin_fetch(&a));
        assert!(store.is_in_flight(&a));
        assert_eq!(store.attempts(&a), 1);
        assert_eq!(store.status(&a), MediaStatus::Downloading);

        // Duplicate while in flight is rejected and not counted.
        assert!(!store.try_begin_fetch(&a));
        assert_eq!(store.attempts(&a), 1);
    }

    #[test]
    fn test_retry_budget_is_enforced() {
        let mut store = MediaStore::new(3);
        let a = url("a");

        for attempt in 1..=3 {
            assert!(store.try_begin_fetch(&a));
            let exhausted = store.finish_fetch_failure(&a);
            assert_eq!(exhausted, attempt == 3);
        }

        assert!(!store.try_begin_fetch(&a));
        assert_eq!(store.attempts(&a), 3);
        assert_eq!(store.status(&a), MediaStatus::Exhausted);
        assert_eq!(store.stats().exhausted, 1);
    }

    #[test]
    fn test_failure_keeps_url_eligible() {
        let mut store = MediaStore::default();
        let a = url("a");

        store.try_begin_fetch(&a);
        store.finish_fetch_failure(&a);

        assert!(!store.is_in_flight(&a));
        assert!(store.is_eligible(&a));
        assert_eq!(store.status(&a), MediaStatus::Failed { attempts: 1 });
    }

    #[test]
    fn test_cached_original_is_not_eligible() {
        let mut store = MediaStore::default();
        let a = url("a");

        store.try_begin_fetch(&a);
        store.finish_fetch_success(&a, img(10, 10));

        assert!(!store.is_eligible(&a));
        assert_eq!(store.status(&a), MediaStatus::Ready);
        assert!(store.original(&a).is_some());
    }

    #[test]
    fn test_lookup_returns_only_present_entries() {
        let mut store = MediaStore::default();
        let a = url("a");
        let b = url("b");
        store.store_resized(&a, img(10, 10));

        let found = store.lookup(&[a.clone(), b]);
        assert_eq!(found.len(), 1);
        assert!(found.contains_key(&a));

        assert!(store.lookup(&[url("never")]).is_empty());
    }

    #[test]
    fn test_refit_candidates() {
        let mut store = MediaStore::default();
        let wide = url("wide");
        let narrow = url("narrow");
        let no_resized = url("no_resized");

        store.finish_fetch_success(&wide, img(1000, 500));
        store.store_resized(&wide, img(500, 250));
        store.finish_fetch_success(&narrow, img(200, 100));
        store.store_resized(&narrow, img(200, 100));
        store.finish_fetch_success(&no_resized, img(1000, 500));

        assert!(store.refit_candidates(500.0).is_empty());

        let candidates = store.refit_candidates(250.0);
        let urls: Vec<_> = candidates.iter().map(|(u, _)| u.clone()).collect();
        assert_eq!(urls, vec![wide]);
    }

    #[test]
    fn test_stats_display() {
        let mut store = MediaStore::default();
        let a = url("a");
        store.try_begin_fetch(&a);

        let stats = store.stats();
        assert_eq!(stats.in_flight, 1);
        assert_eq!(stats.attempts, 1);
        assert_eq!(
            stats.to_string(),
            "Media: 0 originals, 0 resized, 1 in flight, 0 exhausted (1 attempts)"
        );
    }
}
