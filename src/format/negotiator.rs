//! Format control facet of a capture source.

use super::{FormatCatalog, FormatDescriptor};
use crate::stream::ProducerStream;
use log::{debug, warn};
use parking_lot::RwLock;
use std::error::Error;
use std::fmt;
use std::sync::{Arc, Weak};

/// A requested format matched no catalog entry.
#[derive(Debug, Clone, PartialEq)]
pub struct UnsupportedFormat(pub FormatDescriptor);

impl fmt::Display for UnsupportedFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Unsupported format: {}", self.0)
    }
}

impl Error for UnsupportedFormat {}

struct NegotiatorState {
    current: FormatDescriptor,
    explicitly_chosen: bool,
    stream: Option<Weak<dyn ProducerStream>>,
}

/// Holds the selected format and validates changes against the catalog.
pub struct FormatNegotiator {
    state: RwLock<NegotiatorState>,
}

impl FormatNegotiator {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(NegotiatorState {
                current: *FormatCatalog::default_format(),
                explicitly_chosen: false,
                stream: None,
            }),
        }
    }

    /// Currently selected format
    pub fn format(&self) -> FormatDescriptor {
        self.state.read().current
    }

    /// Select the catalog format matching `candidate`.
    ///
    /// Returns the adopted catalog descriptor, which may differ from
    /// `candidate` in derived fields. The selection is forwarded to the
    /// bound stream if one exists.
    pub fn set_format(&self, candidate: &FormatDescriptor) -> Result<FormatDescriptor, UnsupportedFormat> {
        let entry = match FormatCatalog::find(candidate) {
            Some(entry) => entry,
            None => {
                debug!("Rejected format {}", candidate);
                return Err(UnsupportedFormat(*candidate));
            }
        };
        let adopted = entry.adopt(candidate);

        // Forward under the write guard so the stream sees selections in
        // the order they commit.
        let mut state = self.state.write();
        state.current = adopted;
        state.explicitly_chosen = true;
        if let Some(stream) = state.stream.as_ref().and_then(Weak::upgrade) {
            debug!("Forwarding format {} to bound stream", adopted);
            stream.set_format(adopted);
        }
        Ok(adopted)
    }

    /// Owned copy of every supported format.
    pub fn supported_formats(&self) -> Vec<FormatDescriptor> {
        FormatCatalog::formats().to_vec()
    }

    /// Whether a format was selected through [`set_format`](Self::set_format).
    pub fn is_explicitly_chosen(&self) -> bool {
        self.state.read().explicitly_chosen
    }

    /// Attach a freshly created stream, hand it its initial format and
    /// return that format.
    ///
    /// An explicit selection wins; otherwise the catalog entry at
    /// `default_index` is adopted. `stream.set_format` must not call back
    /// into this negotiator.
    pub(crate) fn bind_stream(&self, stream: &Arc<dyn ProducerStream>, default_index: usize) -> FormatDescriptor {
        let mut state = self.state.write();
        if !state.explicitly_chosen {
            state.current = match FormatCatalog::get(default_index) {
                Some(format) => *format,
                None => {
                    warn!(
                        "Stream format index {} out of range, using {}",
                        default_index,
                        FormatCatalog::default_format()
                    );
                    *FormatCatalog::default_format()
                }
            };
        }
        stream.set_format(state.current);
        state.stream = Some(Arc::downgrade(stream));
        state.current
    }
}

impl Default for FormatNegotiator {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FormatNegotiator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("FormatNegotiator")
            .field("current", &state.current)
            .field("explicitly_chosen", &state.explicitly_chosen)
            .field("bound", &state.stream.is_some())
            .finish()
    }
}
