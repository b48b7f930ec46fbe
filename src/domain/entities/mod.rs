//! Domain entity definitions.

mod media;

pub use media::{ImageSize, MediaStatus, MediaUrl};
