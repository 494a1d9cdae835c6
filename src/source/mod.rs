//! Push capture sources
//!
//! A capture source owns connection and run state, lazily creates its
//! single producer stream and exposes format negotiation to the pipeline.

mod capture_source;
mod controls;

pub use capture_source::CaptureSource;
pub use controls::{Control, ControlKind, ControlRegistry};

use crate::config::Config;
use crate::format::{FormatDescriptor, UnsupportedFormat};
use crate::locator::{Locator, LocatorError};
use crate::stream::{DesktopStreamFactory, StreamError, X11GrabberSource};
use serde::Serialize;
use std::error::Error;
use std::fmt;
use std::sync::Arc;

/// Capture source errors
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// start() before connect()
    NotConnected,
    /// start() before streams()
    NoStream,
    /// No locator configured
    NoLocator,
    /// Requested format matches no supported format
    UnsupportedFormat(FormatDescriptor),
    /// Failure reported by the producer stream
    Stream(StreamError),
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CaptureError::NotConnected => write!(f, "Capture source must be connected"),
            CaptureError::NoStream => write!(f, "Capture source has no stream; call streams() first"),
            CaptureError::NoLocator => write!(f, "Capture source has no locator"),
            CaptureError::UnsupportedFormat(format) => write!(f, "Unsupported format: {}", format),
            CaptureError::Stream(e) => write!(f, "{}", e),
        }
    }
}

impl Error for CaptureError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CaptureError::Stream(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StreamError> for CaptureError {
    fn from(e: StreamError) -> Self {
        CaptureError::Stream(e)
    }
}

impl From<UnsupportedFormat> for CaptureError {
    fn from(e: UnsupportedFormat) -> Self {
        CaptureError::UnsupportedFormat(e.0)
    }
}

/// Content type of produced buffers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Raw,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Raw => "raw",
        }
    }
}

/// Duration of the media a source produces; live capture never knows it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaDuration {
    Unknown,
}

/// Describes a capture target and what it can produce
#[derive(Debug, Clone, Serialize)]
pub struct CaptureInfo {
    /// Target name (locator remainder)
    pub name: String,
    pub locator: Locator,
    pub formats: Vec<FormatDescriptor>,
}

/// Build a desktop capture source from configuration.
pub fn desktop_source(config: &Config) -> Result<CaptureSource, LocatorError> {
    let locator = Locator::parse(&config.capture.locator)?;
    let grabbers = Arc::new(X11GrabberSource::new(config.capture.display.clone()));
    let factory = DesktopStreamFactory::new(grabbers, config.stream.settings());
    Ok(CaptureSource::with_locator(locator, factory)
        .with_stream_format_index(config.capture.stream_format_index))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn desktop_source_uses_configured_locator() {
        let mut config = Config::default();
        config.capture.locator = "imgstreaming:1".to_string();
        let source = desktop_source(&config).expect("valid locator");
        assert_eq!(source.locator().map(Locator::remainder), Some("1"));
        assert!(!source.is_connected());
    }

    #[test]
    fn desktop_source_rejects_bad_locator() {
        let mut config = Config::default();
        config.capture.locator = "nonsense".to_string();
        assert!(desktop_source(&config).is_err());
    }

    #[test]
    fn stream_error_converts() {
        let err: CaptureError = StreamError::Grabber("gone".to_string()).into();
        assert_eq!(err.to_string(), "Desktop grabber failed: gone");
        assert!(err.source().is_some());
    }
}
