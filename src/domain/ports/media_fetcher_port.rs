//! Port definition for retrieving media bytes.

use async_trait::async_trait;
use bytes::Bytes;

use crate::domain::entities::MediaUrl;
use crate::domain::errors::MediaError;

/// Port for fetching raw image bytes over the network.
/// Implementations must be thread-safe and must not cache responses.
#[async_trait]
pub trait MediaFetcherPort: Send + Sync {
    /// Retrieves the encoded image at `url`.
    async fn fetch(&self, url: &MediaUrl) -> Result<Bytes, MediaError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::{HashMap, HashSet};
    use std::io::Cursor;
    use std::time::Duration;

    use parking_lot::Mutex;

    /// Mock fetcher serving generated PNGs.
    #[derive(Default)]
    pub struct MockMediaFetcher {
        images: Mutex<HashMap<MediaUrl, (u32, u32)>>,
        broken: Mutex<HashSet<MediaUrl>>,
        calls: Mutex<HashMap<MediaUrl, u32>>,
        delay: Option<Duration>,
    }

    impl MockMediaFetcher {
        /// Creates a fetcher that fails every request.
        pub fn new() -> Self {
            Self::default()
        }

        /// Delays every response.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        /// Serves a PNG of the given size at `url`.
        pub fn with_image(self, url: &MediaUrl, width: u32, height: u32) -> Self {
            self.images.lock().insert(url.clone(), (width, height));
            self
        }

        /// Serves bytes that are not an image at `url`.
        pub fn with_garbage(self, url: &MediaUrl) -> Self {
            self.broken.lock().insert(url.clone());
            self
        }

        /// Number of fetches issued for `url`.
        pub fn calls(&self, url: &MediaUrl) -> u32 {
            self.calls.lock().get(url).copied().unwrap_or(0)
        }

        /// Number of fetches issued overall.
        pub fn total_calls(&self) -> u32 {
            self.calls.lock().values().sum()
        }
    }

    pub fn encode_png(width: u32, height: u32) -> Bytes {
        let img = image::DynamicImage::new_rgb8(width, height);
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png)
            .expect("encode test png");
        Bytes::from(buf.into_inner())
    }

    #[async_trait]
    impl MediaFetcherPort for MockMediaFetcher {
        async fn fetch(&self, url: &MediaUrl) -> Result<Bytes, MediaError> {
            *self.calls.lock().entry(url.clone()).or_insert(0) += 1;

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            if self.broken.lock().contains(url) {
                return Ok(Bytes::from_static(b"definitely not a png"));
            }

            let size = self.images.lock().get(url).copied();
            match size {
                Some((width, height)) => Ok(encode_png(width, height)),
                None => Err(MediaError::Status { code: 404 }),
            }
        }
    }
}
