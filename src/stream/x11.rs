//! X11 desktop grabber
//!
//! Reads the root window of a screen with `GetImage` and converts the
//! server's pixel layout to RGBX bytes.

use super::{DesktopGrabber, GrabberSource, StreamError};
use crate::locator::Locator;
use image::RgbaImage;
use log::{debug, info};
use x11rb::connection::Connection;
use x11rb::protocol::xproto::{ConnectionExt, Format, ImageFormat, ImageOrder, Window};
use x11rb::rust_connection::RustConnection;

/// Opens [`X11Grabber`]s on a display
#[derive(Debug, Clone)]
pub struct X11GrabberSource {
    /// X11 display name (e.g. ":0")
    display: String,
}

impl X11GrabberSource {
    pub fn new(display: impl Into<String>) -> Self {
        Self {
            display: display.into(),
        }
    }
}

impl GrabberSource for X11GrabberSource {
    fn open(&self, locator: Option<&Locator>) -> Result<Box<dyn DesktopGrabber>, StreamError> {
        let (conn, default_screen) = x11rb::connect(Some(self.display.as_str())).map_err(|e| {
            StreamError::Grabber(format!("cannot connect to display {}: {}", self.display, e))
        })?;
        let screen = locator
            .and_then(Locator::screen_index)
            .unwrap_or(default_screen);
        let grabber = X11Grabber::new(conn, screen)?;
        let (width, height) = grabber.dimensions();
        info!(
            "Grabbing X11 display {} screen {} ({}x{})",
            self.display, screen, width, height
        );
        Ok(Box::new(grabber))
    }
}

/// Byte layout of a ZPixmap image as the server sends it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZPixmapLayout {
    /// Pixel depth in bits
    pub depth: u8,

    pub lsb_first: bool,

    pub bytes_per_pixel: usize,

    /// Bytes per line (stride)
    pub bytes_per_line: usize,
}

impl ZPixmapLayout {
    /// Layout for `width` pixels of `depth` given the server's pixmap formats.
    ///
    /// Falls back to 32 bpp unpadded rows when the depth is not listed.
    pub fn for_depth(formats: &[Format], width: u32, depth: u8, lsb_first: bool) -> Self {
        let (bytes_per_pixel, bytes_per_line) = compute_format(formats, width, depth);
        Self {
            depth,
            lsb_first,
            bytes_per_pixel,
            bytes_per_line,
        }
    }

    /// Convert `height` rows of `width` pixels to RGBX.
    ///
    /// Pixels past the end of `src` and unsupported depths come out black.
    pub fn convert_to_rgbx(&self, src: &[u8], width: u32, height: u32) -> Vec<u8> {
        let mut dst = Vec::with_capacity(width as usize * height as usize * 4);

        for y in 0..height as usize {
            for x in 0..width as usize {
                let offset = y * self.bytes_per_line + x * self.bytes_per_pixel;
                let (r, g, b) = match self.depth {
                    24 | 32 if offset + self.bytes_per_pixel.max(3) <= src.len() => {
                        if self.lsb_first {
                            (src[offset + 2], src[offset + 1], src[offset])
                        } else {
                            let base = offset + self.bytes_per_pixel.saturating_sub(3);
                            (src[base], src[base + 1], src[base + 2])
                        }
                    }
                    16 if offset + 2 <= src.len() => {
                        let pixel = if self.lsb_first {
                            u16::from_le_bytes([src[offset], src[offset + 1]])
                        } else {
                            u16::from_be_bytes([src[offset], src[offset + 1]])
                        };
                        (
                            (((pixel >> 11) & 0x1F) as u8) << 3,
                            (((pixel >> 5) & 0x3F) as u8) << 2,
                            ((pixel & 0x1F) as u8) << 3,
                        )
                    }
                    _ => (0, 0, 0),
                };
                dst.extend_from_slice(&[r, g, b, 0xFF]);
            }
        }

        dst
    }

    /// Number of complete rows `data_len` bytes hold, capped at `height`.
    pub fn effective_height(&self, data_len: usize, height: u32) -> u32 {
        let max_rows = data_len / self.bytes_per_line.max(1);
        max_rows.min(height as usize) as u32
    }
}

/// Screen grabber over an X11 connection
pub struct X11Grabber {
    conn: RustConnection,

    /// Root window
    root: Window,

    /// Screen width
    width: u16,

    /// Screen height
    height: u16,

    layout: ZPixmapLayout,
}

impl X11Grabber {
    pub fn new(conn: RustConnection, screen_num: usize) -> Result<Self, StreamError> {
        let setup = conn.setup();
        let screen = setup
            .roots
            .get(screen_num)
            .ok_or_else(|| StreamError::Grabber(format!("screen {} does not exist", screen_num)))?;
        let root = screen.root;
        let width = screen.width_in_pixels;
        let height = screen.height_in_pixels;
        let lsb_first = setup.image_byte_order == ImageOrder::LSB_FIRST;
        let layout = ZPixmapLayout::for_depth(
            &setup.pixmap_formats,
            u32::from(width),
            screen.root_depth,
            lsb_first,
        );
        debug!("Screen {} pixel layout: {:?}", screen_num, layout);

        Ok(Self {
            conn,
            root,
            width,
            height,
            layout,
        })
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (u32::from(self.width), u32::from(self.height))
    }
}

impl DesktopGrabber for X11Grabber {
    fn grab(&mut self) -> Result<RgbaImage, StreamError> {
        let image = self
            .conn
            .get_image(
                ImageFormat::Z_PIXMAP,
                self.root,
                0,
                0,
                self.width,
                self.height,
                u32::MAX,
            )
            .map_err(|e| StreamError::Grabber(e.to_string()))?
            .reply()
            .map_err(|e| StreamError::Grabber(e.to_string()))?;

        let (width, full_height) = self.dimensions();
        let height = self.layout.effective_height(image.data.len(), full_height);
        if height != full_height {
            debug!(
                "Truncated grab: expected {} rows, got {} rows",
                full_height, height
            );
        }
        let data = self.layout.convert_to_rgbx(&image.data, width, height);
        RgbaImage::from_raw(width, height, data)
            .ok_or_else(|| StreamError::Grabber("grabbed image has unexpected size".to_string()))
    }
}

fn compute_format(formats: &[Format], width: u32, depth: u8) -> (usize, usize) {
    let mut bytes_per_pixel = 4usize;
    let mut bytes_per_line = width as usize * bytes_per_pixel;
    for format in formats {
        if format.depth == depth {
            let bpp = format.bits_per_pixel as usize;
            let pad = (format.scanline_pad as usize).max(1);
            bytes_per_pixel = (bpp / 8).max(1);
            let bits_per_line = width as usize * bpp;
            let padded_bits = ((bits_per_line + pad - 1) / pad) * pad;
            bytes_per_line = padded_bits / 8;
            return (bytes_per_pixel, bytes_per_line);
        }
    }
    (bytes_per_pixel, bytes_per_line)
}
