//! Producer streams
//!
//! A producer stream pushes timestamped raw video buffers to its
//! subscribers. Capture sources own exactly one and drive its start/stop.

mod frame;
mod image_stream;
mod x11;

pub use frame::{StreamStats, VideoBuffer};
pub use image_stream::{scale_to_format, DesktopStreamFactory, ImageStream, StreamSettings};
pub use x11::{X11Grabber, X11GrabberSource, ZPixmapLayout};

use crate::format::FormatDescriptor;
use crate::locator::Locator;
use crossbeam::channel::Receiver;
use image::RgbaImage;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Producer stream errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// The desktop grabber could not be opened or failed to read
    Grabber(String),
    /// The capture thread could not be spawned
    Thread(String),
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Grabber(msg) => write!(f, "Desktop grabber failed: {}", msg),
            StreamError::Thread(msg) => write!(f, "Capture thread failed: {}", msg),
        }
    }
}

impl Error for StreamError {}

/// A push-model source of raw video buffers.
pub trait ProducerStream: Send + Sync {
    /// Format of the buffers the stream produces
    fn format(&self) -> FormatDescriptor;

    /// Change the produced format; takes effect on the next frame
    fn set_format(&self, format: FormatDescriptor);

    /// Begin producing frames
    fn start(&self) -> Result<(), StreamError>;

    /// Stop producing frames
    fn stop(&self);

    fn is_started(&self) -> bool;

    /// Register a consumer; buffers are pushed to the returned channel
    fn subscribe(&self) -> Receiver<VideoBuffer>;

    fn stats(&self) -> StreamStats {
        StreamStats::default()
    }
}

/// Creates the producer stream of a capture source.
pub trait StreamFactory: Send {
    fn create(&self, locator: Option<&Locator>) -> Arc<dyn ProducerStream>;
}

impl<F> StreamFactory for F
where
    F: Fn(Option<&Locator>) -> Arc<dyn ProducerStream> + Send,
{
    fn create(&self, locator: Option<&Locator>) -> Arc<dyn ProducerStream> {
        self(locator)
    }
}

/// Reads whole-screen images.
pub trait DesktopGrabber: Send {
    /// Grab the current screen contents as RGBX pixels
    fn grab(&mut self) -> Result<RgbaImage, StreamError>;
}

/// Opens a grabber for the target a locator names.
pub trait GrabberSource: Send + Sync {
    fn open(&self, locator: Option<&Locator>) -> Result<Box<dyn DesktopGrabber>, StreamError>;
}

impl<F> GrabberSource for F
where
    F: Fn(Option<&Locator>) -> Result<Box<dyn DesktopGrabber>, StreamError> + Send + Sync,
{
    fn open(&self, locator: Option<&Locator>) -> Result<Box<dyn DesktopGrabber>, StreamError> {
        self(locator)
    }
}
