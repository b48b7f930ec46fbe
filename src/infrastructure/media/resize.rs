//! Width-capped resizing.

use std::sync::Arc;

use image::DynamicImage;
use image::imageops::FilterType;
use tokio::sync::Semaphore;
use tracing::trace;

use crate::domain::entities::ImageSize;
use crate::domain::errors::MediaError;

/// Scales `original` down so its width does not exceed `max_width`.
///
/// Sizes already narrow enough are returned unchanged, as is everything when
/// `max_width` is not a positive finite number.
#[must_use]
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn capped_size(original: ImageSize, max_width: f64) -> ImageSize {
    if !max_width.is_finite() || max_width <= 0.0 || f64::from(original.width) <= max_width {
        return original;
    }

    let width = max_width.round().max(1.0);
    let height = (f64::from(original.height) * width / f64::from(original.width))
        .round()
        .max(1.0);

    ImageSize::new(width as u32, height as u32)
}

/// Produces width-capped copies of images on the blocking pool.
#[derive(Debug, Clone)]
pub struct Resizer {
    filter: FilterType,
    permits: Arc<Semaphore>,
}

impl Resizer {
    /// Creates a resizer allowing `max_concurrent` resizes at once.
    #[must_use]
    pub fn new(filter: FilterType, max_concurrent: usize) -> Self {
        Self {
            filter,
            permits: Arc::new(Semaphore::new(max_concurrent.max(1))),
        }
    }

    /// Returns `image` capped to `max_width`.
    ///
    /// When no resize is needed the same `Arc` is returned without leaving the
    /// current task.
    ///
    /// # Errors
    /// Returns `MediaError::Task` if the blocking task panicked or the pool
    /// was shut down.
    pub async fn fit(
        &self,
        image: Arc<DynamicImage>,
        max_width: f64,
    ) -> Result<Arc<DynamicImage>, MediaError> {
        let current = ImageSize::of(&image);
        let target = capped_size(current, max_width);
        if target == current {
            return Ok(image);
        }

        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| MediaError::task(e.to_string()))?;

        trace!(from = %current, to = %target, "Resizing image");

        let filter = self.filter;
        let resized = tokio::task::spawn_blocking(move || {
            image.resize_exact(target.width, target.height, filter)
        })
        .await?;

        Ok(Arc::new(resized))
    }
}
