//! Domain types for notification media.

use std::str::FromStr;

use url::Url;

use crate::domain::errors::MediaError;

/// Unique key identifying a remotely fetched image.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MediaUrl(Url);

impl MediaUrl {
    /// Parses an `http` or `https` URL.
    ///
    /// # Errors
    /// Returns `MediaError::InvalidUrl` if the input is not a valid web URL.
    pub fn parse(input: &str) -> Result<Self, MediaError> {
        let url = Url::parse(input).map_err(|e| MediaError::invalid_url(input, e.to_string()))?;
        Self::try_from(url)
    }

    /// Returns the underlying URL.
    #[must_use]
    pub const fn as_url(&self) -> &Url {
        &self.0
    }

    /// Returns the URL as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<Url> for MediaUrl {
    type Error = MediaError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        match url.scheme() {
            "http" | "https" => Ok(Self(url)),
            other => Err(MediaError::invalid_url(
                url.as_str(),
                format!("unsupported scheme '{other}'"),
            )),
        }
    }
}

impl FromStr for MediaUrl {
    type Err = MediaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for MediaUrl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Pixel dimensions of an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl ImageSize {
    /// Creates a new size.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Returns the size of a decoded image.
    #[must_use]
    pub fn of(image: &image::DynamicImage) -> Self {
        Self::new(image.width(), image.height())
    }
}

impl std::fmt::Display for ImageSize {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Where a URL currently stands in the fetch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MediaStatus {
    /// Never dispatched.
    #[default]
    NotRequested,
    /// A fetch is in flight.
    Downloading,
    /// The original image is cached.
    Ready,
    /// Every attempt so far failed, but the retry budget is not spent.
    Failed {
        /// Attempts issued so far.
        attempts: u32,
    },
    /// The retry budget is spent; the URL is never fetched again.
    Exhausted,
}

impl MediaStatus {
    /// Returns true if the original image is available.
    #[must_use]
    pub const fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns true if a fetch is in flight.
    #[must_use]
    pub const fn is_loading(&self) -> bool {
        matches!(self, Self::Downloading)
    }

    /// Returns true if the URL will never be fetched again.
    #[must_use]
    pub const fn is_exhausted(&self) -> bool {
        matches!(self, Self::Exhausted)
    }
}

impl std::fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotRequested => write!(f, "not requested"),
            Self::Downloading => write!(f, "downloading"),
            Self::Ready => write!(f, "ready"),
            Self::Failed { attempts } => write!(f, "failed ({attempts} attempts)"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}
