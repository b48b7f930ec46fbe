//! Domain layer with media entities, errors and port definitions.

/// Entity definitions.
pub mod entities;
/// Error types.
pub mod errors;
/// Port definitions.
pub mod ports;

pub use entities::{ImageSize, MediaStatus, MediaUrl};
pub use errors::MediaError;
pub use ports::MediaFetcherPort;
