// Supported resolutions for desktop image streaming

use super::FormatDescriptor;

/// Every format an image-streaming source can produce, in advertised order.
pub static FORMATS: [FormatDescriptor; 6] = [
    FormatDescriptor::xrgb32(128, 96),
    FormatDescriptor::xrgb32(176, 144),
    FormatDescriptor::xrgb32(320, 240),
    FormatDescriptor::xrgb32(352, 288),
    FormatDescriptor::xrgb32(704, 576),
    FormatDescriptor::xrgb32(720, 480),
];

/// Catalog index a newly created stream starts with when nothing was negotiated.
///
/// Kept at 720x480 for compatibility with existing consumers.
pub const DEFAULT_STREAM_FORMAT_INDEX: usize = 5;

/// Lookup over [`FORMATS`].
pub struct FormatCatalog;

impl FormatCatalog {
    pub fn formats() -> &'static [FormatDescriptor] {
        &FORMATS
    }

    /// Format reported before any negotiation took place.
    pub fn default_format() -> &'static FormatDescriptor {
        &FORMATS[0]
    }

    pub fn get(index: usize) -> Option<&'static FormatDescriptor> {
        FORMATS.get(index)
    }

    /// First catalog entry accepting `candidate`.
    pub fn find(candidate: &FormatDescriptor) -> Option<&'static FormatDescriptor> {
        FORMATS.iter().find(|entry| entry.accepts(candidate))
    }
}
