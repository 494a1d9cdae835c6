//! Configuration management for imgstream

use crate::format::{FormatCatalog, FormatDescriptor, DEFAULT_STREAM_FORMAT_INDEX};
use crate::locator::Locator;
use crate::stream::StreamSettings;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Capture target configuration
    pub capture: CaptureConfig,

    /// Producer stream configuration
    #[serde(default)]
    pub stream: StreamConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// Capture target locator (e.g. "imgstreaming:0")
    pub locator: String,

    /// X11 display name
    #[serde(default = "default_display")]
    pub display: String,

    /// Catalog index a new stream starts with
    #[serde(default = "default_stream_format_index")]
    pub stream_format_index: usize,

    /// Resolution to negotiate before streaming ("WIDTHxHEIGHT")
    #[serde(default)]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Frame rate when the negotiated format leaves it open
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,

    /// Buffers queued per consumer before frames are dropped
    #[serde(default = "default_buffer_depth")]
    pub buffer_depth: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            buffer_depth: default_buffer_depth(),
        }
    }
}

impl StreamConfig {
    pub fn settings(&self) -> StreamSettings {
        StreamSettings {
            default_frame_rate: self.frame_rate,
            buffer_depth: self.buffer_depth,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter
    pub level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capture: CaptureConfig {
                locator: "imgstreaming:0".to_string(),
                display: default_display(),
                stream_format_index: DEFAULT_STREAM_FORMAT_INDEX,
                format: None,
            },
            stream: StreamConfig::default(),
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Config {
    /// Load configuration from TOML file
    pub fn load(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        if !path.exists() {
            return Ok(Config::default());
        }

        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        Locator::parse(&self.capture.locator)?;

        if FormatCatalog::get(self.capture.stream_format_index).is_none() {
            return Err(format!(
                "Stream format index {} is outside the {} supported formats",
                self.capture.stream_format_index,
                FormatCatalog::formats().len()
            )
            .into());
        }

        if let Some(ref format) = self.capture.format {
            let requested = parse_resolution(format)?;
            if FormatCatalog::find(&requested).is_none() {
                return Err(format!("Capture format {} is not supported", format).into());
            }
        }

        if self.stream.frame_rate.is_nan() || self.stream.frame_rate <= 0.0 {
            return Err("Stream frame rate must be positive".into());
        }

        if self.stream.buffer_depth == 0 {
            return Err("Stream buffer depth must be non-zero".into());
        }

        Ok(())
    }
}

/// Parse a "WIDTHxHEIGHT" string into an XRGB32 format request.
pub fn parse_resolution(value: &str) -> Result<FormatDescriptor, String> {
    let (width, height) = value
        .trim()
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("Invalid resolution {:?}, expected WIDTHxHEIGHT", value))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|_| format!("Invalid width in {:?}", value))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|_| format!("Invalid height in {:?}", value))?;
    Ok(FormatDescriptor::xrgb32(width, height))
}


fn default_display() -> String {
    std::env::var("DISPLAY").unwrap_or_else(|_| ":0".to_string())
}

fn default_stream_format_index() -> usize {
    DEFAULT_STREAM_FORMAT_INDEX
}

fn default_frame_rate() -> f32 { 10.0 }
fn default_buffer_depth() -> usize { 2 }
