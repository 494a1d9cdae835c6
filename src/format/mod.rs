//! Raw video format descriptors
//!
//! Describes the fixed raw layout produced by the image stream and the
//! catalog of resolutions a capture source advertises.

mod catalog;
mod negotiator;

pub use catalog::{FormatCatalog, DEFAULT_STREAM_FORMAT_INDEX, FORMATS};
pub use negotiator::{FormatNegotiator, UnsupportedFormat};

use serde::{Deserialize, Serialize};
use std::fmt;

/// Channel layout of one pixel.
///
/// Channel positions are 1-based byte offsets inside a pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelLayout {
    pub bits_per_pixel: u8,
    pub red: u8,
    pub green: u8,
    pub blue: u8,
}

impl PixelLayout {
    /// 32 bits per pixel, bytes R, G, B then one unused byte.
    pub const XRGB32: PixelLayout = PixelLayout {
        bits_per_pixel: 32,
        red: 1,
        green: 2,
        blue: 3,
    };

    pub const fn bytes_per_pixel(&self) -> usize {
        (self.bits_per_pixel / 8) as usize
    }
}

/// A concrete raw video format.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FormatDescriptor {
    /// Frame width in pixels
    pub width: u32,

    /// Frame height in pixels
    pub height: u32,

    /// Byte length of one frame
    pub max_data_length: usize,

    /// Pixel layout
    pub layout: PixelLayout,

    /// Frame rate, `None` when unspecified or variable
    pub frame_rate: Option<f32>,
}

impl FormatDescriptor {
    /// Build an XRGB32 descriptor for the given resolution.
    pub const fn xrgb32(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            max_data_length: width as usize * height as usize * PixelLayout::XRGB32.bytes_per_pixel(),
            layout: PixelLayout::XRGB32,
            frame_rate: None,
        }
    }

    pub fn with_frame_rate(mut self, frame_rate: f32) -> Self {
        self.frame_rate = Some(frame_rate);
        self
    }

    /// Whether `candidate` may be served by this format.
    ///
    /// Resolution and layout must be equal. The byte length is derived and
    /// not compared; an unspecified frame rate on `self` accepts any
    /// finite, positive rate.
    pub fn accepts(&self, candidate: &FormatDescriptor) -> bool {
        if let Some(rate) = candidate.frame_rate {
            if !rate.is_finite() || rate <= 0.0 {
                return false;
            }
        }
        if self.width != candidate.width || self.height != candidate.height {
            return false;
        }
        if self.layout != candidate.layout {
            return false;
        }
        match (self.frame_rate, candidate.frame_rate) {
            (Some(ours), Some(theirs)) => (ours - theirs).abs() < f32::EPSILON,
            _ => true,
        }
    }

    /// The concrete format adopted when `candidate` is accepted by `self`.
    pub fn adopt(&self, candidate: &FormatDescriptor) -> FormatDescriptor {
        FormatDescriptor {
            frame_rate: self.frame_rate.or(candidate.frame_rate),
            ..*self
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RGB {}x{}, {} bpp, {} bytes",
            self.width, self.height, self.layout.bits_per_pixel, self.max_data_length
        )?;
        if let Some(rate) = self.frame_rate {
            write!(f, ", {} fps", rate)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{FormatDescriptor, PixelLayout};

    #[test]
    fn xrgb32_derives_byte_length() {
        let format = FormatDescriptor::xrgb32(320, 240);
        assert_eq!(format.max_data_length, 320 * 240 * 4);
        assert_eq!(format.layout, PixelLayout::XRGB32);
        assert!(format.frame_rate.is_none());
    }

    #[test]
    fn accepts_ignores_byte_length() {
        let entry = FormatDescriptor::xrgb32(352, 288);
        let mut candidate = FormatDescriptor::xrgb32(352, 288);
        candidate.max_data_length = 1;
        assert!(entry.accepts(&candidate));
        assert_eq!(entry.adopt(&candidate).max_data_length, 352 * 288 * 4);
    }

    #[test]
    fn accepts_rejects_other_layout() {
        let entry = FormatDescriptor::xrgb32(352, 288);
        let mut candidate = entry;
        candidate.layout = PixelLayout {
            bits_per_pixel: 24,
            red: 3,
            green: 2,
            blue: 1,
        };
        assert!(!entry.accepts(&candidate));
    }

    #[test]
    fn adopt_keeps_requested_frame_rate() {
        let entry = FormatDescriptor::xrgb32(128, 96);
        let candidate = FormatDescriptor::xrgb32(128, 96).with_frame_rate(15.0);
        assert!(entry.accepts(&candidate));
        assert_eq!(entry.adopt(&candidate).frame_rate, Some(15.0));
    }

    #[test]
    fn accepts_rejects_unusable_frame_rates() {
        let entry = FormatDescriptor::xrgb32(128, 96);
        for rate in [f32::INFINITY, f32::NEG_INFINITY, f32::NAN, -5.0, 0.0] {
            let candidate = FormatDescriptor::xrgb32(128, 96).with_frame_rate(rate);
            assert!(!entry.accepts(&candidate), "rate {} accepted", rate);
        }
    }
}
