//! imgstream - desktop image streaming capture source
//!
//! A push-model capture source that hands desktop images to a media
//! pipeline as timestamped raw video buffers, with a fixed catalog of
//! negotiable raw formats.

pub mod config;
pub mod format;
pub mod locator;
pub mod source;
pub mod stream;

// Re-exports
pub use config::Config;
pub use format::{FormatDescriptor, FormatNegotiator, PixelLayout};
pub use locator::Locator;
pub use source::{CaptureError, CaptureSource, Control, ControlKind};
pub use stream::{ProducerStream, StreamError, VideoBuffer};
