//! Capture source state machine

use super::{CaptureError, CaptureInfo, ContentType, Control, ControlKind, ControlRegistry, MediaDuration};
use crate::format::{FormatNegotiator, DEFAULT_STREAM_FORMAT_INDEX};
use crate::locator::Locator;
use crate::stream::{ProducerStream, StreamFactory};
use log::{debug, info, warn};
use std::fmt;
use std::sync::Arc;

/// Push source exposing one desktop image stream.
///
/// States: disconnected, connected, started. `start()` requires a
/// connection and a stream obtained through `streams()`. Disconnecting a
/// started source stops its stream first and logs a warning, so a started
/// source is always connected.
pub struct CaptureSource {
    connected: bool,
    started: bool,
    locator: Option<Locator>,
    negotiator: Arc<FormatNegotiator>,
    controls: ControlRegistry,
    stream: Option<Arc<dyn ProducerStream>>,
    factory: Box<dyn StreamFactory>,
    stream_format_index: usize,
}

impl CaptureSource {
    pub fn new(factory: impl StreamFactory + 'static) -> Self {
        let negotiator = Arc::new(FormatNegotiator::new());
        let controls = ControlRegistry::new(vec![Control::Format(negotiator.clone())]);
        Self {
            connected: false,
            started: false,
            locator: None,
            negotiator,
            controls,
            stream: None,
            factory: Box::new(factory),
            stream_format_index: DEFAULT_STREAM_FORMAT_INDEX,
        }
    }

    pub fn with_locator(locator: Locator, factory: impl StreamFactory + 'static) -> Self {
        let mut source = Self::new(factory);
        source.locator = Some(locator);
        source
    }

    /// Override the catalog index a new stream starts with.
    pub fn with_stream_format_index(mut self, index: usize) -> Self {
        self.stream_format_index = index;
        self
    }

    pub fn locator(&self) -> Option<&Locator> {
        self.locator.as_ref()
    }

    /// Replace the locator. A stream that already exists keeps its target.
    pub fn set_locator(&mut self, locator: Locator) {
        if self.stream.is_some() {
            debug!("Locator changed to {} after stream creation", locator);
        }
        self.locator = Some(locator);
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_started(&self) -> bool {
        self.started
    }

    pub fn connect(&mut self) {
        if self.connected {
            return;
        }
        self.connected = true;
        debug!("Capture source connected ({})", self.describe_locator());
    }

    pub fn disconnect(&mut self) {
        if self.started {
            warn!("Capture source disconnected while started; stopping stream");
            self.stop();
        }
        if self.connected {
            debug!("Capture source disconnected ({})", self.describe_locator());
        }
        self.connected = false;
    }

    /// The source's single producer stream, created on first call.
    pub fn streams(&mut self) -> Vec<Arc<dyn ProducerStream>> {
        vec![self.stream_or_create().clone()]
    }

    fn stream_or_create(&mut self) -> &Arc<dyn ProducerStream> {
        let Self {
            stream,
            factory,
            negotiator,
            locator,
            stream_format_index,
            ..
        } = self;
        stream.get_or_insert_with(|| {
            let stream = factory.create(locator.as_ref());
            let format = negotiator.bind_stream(&stream, *stream_format_index);
            info!(
                "Created capture stream ({}) with format {}",
                locator.as_ref().map(Locator::as_str).unwrap_or("no locator"),
                format
            );
            stream
        })
    }

    pub fn start(&mut self) -> Result<(), CaptureError> {
        if self.started {
            return Ok(());
        }
        if !self.connected {
            return Err(CaptureError::NotConnected);
        }
        let stream = self.stream.as_ref().ok_or(CaptureError::NoStream)?;
        stream.start()?;
        self.started = true;
        info!("Capture source started ({})", self.describe_locator());
        Ok(())
    }

    pub fn stop(&mut self) {
        if !self.started {
            return;
        }
        self.started = false;
        if let Some(stream) = &self.stream {
            stream.stop();
        }
        info!("Capture source stopped ({})", self.describe_locator());
    }

    /// Owned copy of every control this source exposes
    pub fn controls(&self) -> Vec<Control> {
        self.controls.all()
    }

    pub fn control(&self, kind: ControlKind) -> Option<Control> {
        self.controls.get(kind)
    }

    pub fn format_control(&self) -> Arc<FormatNegotiator> {
        self.negotiator.clone()
    }

    pub fn capture_info(&self) -> Result<CaptureInfo, CaptureError> {
        let locator = self.locator.as_ref().ok_or(CaptureError::NoLocator)?;
        Ok(CaptureInfo {
            name: locator.remainder().to_string(),
            locator: locator.clone(),
            formats: self.negotiator.supported_formats(),
        })
    }

    pub fn content_type(&self) -> ContentType {
        ContentType::Raw
    }

    pub fn duration(&self) -> MediaDuration {
        MediaDuration::Unknown
    }

    fn describe_locator(&self) -> &str {
        self.locator.as_ref().map(Locator::as_str).unwrap_or("no locator")
    }
}

impl fmt::Debug for CaptureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CaptureSource")
            .field("connected", &self.connected)
            .field("started", &self.started)
            .field("locator", &self.locator)
            .field("format", &self.negotiator.format())
            .field("has_stream", &self.stream.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::FormatDescriptor;
    use crate::stream::{StreamError, VideoBuffer};
    use crossbeam::channel::{bounded, Receiver};
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingStream {
        format: Mutex<Option<FormatDescriptor>>,
        set_format_calls: AtomicUsize,
        starts: AtomicUsize,
        stops: AtomicUsize,
        running: AtomicBool,
        fail_start: bool,
    }

    impl ProducerStream for CountingStream {
        fn format(&self) -> FormatDescriptor {
            self.format.lock().expect("format set")
        }

        fn set_format(&self, format: FormatDescriptor) {
            self.set_format_calls.fetch_add(1, Ordering::SeqCst);
            *self.format.lock() = Some(format);
        }

        fn start(&self) -> Result<(), StreamError> {
            if self.fail_start {
                return Err(StreamError::Grabber("display unavailable".to_string()));
            }
            self.starts.fetch_add(1, Ordering::SeqCst);
            self.running.store(true, Ordering::SeqCst);
            Ok(())
        }

        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
            self.running.store(false, Ordering::SeqCst);
        }

        fn is_started(&self) -> bool {
            self.running.load(Ordering::SeqCst)
        }

        fn subscribe(&self) -> Receiver<VideoBuffer> {
            bounded(1).1
        }
    }

    struct Harness {
        created: Arc<AtomicUsize>,
        last: Arc<Mutex<Option<Arc<CountingStream>>>>,
    }

    impl Harness {
        fn stream(&self) -> Arc<CountingStream> {
            self.last.lock().clone().expect("stream created")
        }
    }

    fn source_with(locator: Option<Locator>, fail_start: bool) -> (CaptureSource, Harness) {
        let created = Arc::new(AtomicUsize::new(0));
        let last = Arc::new(Mutex::new(None));
        let harness = Harness {
            created: created.clone(),
            last: last.clone(),
        };
        let factory = move |_: Option<&Locator>| -> Arc<dyn ProducerStream> {
            created.fetch_add(1, Ordering::SeqCst);
            let stream = Arc::new(CountingStream {
                fail_start,
                ..Default::default()
            });
            *last.lock() = Some(stream.clone());
            stream
        };
        let source = match locator {
            Some(locator) => CaptureSource::with_locator(locator, factory),
            None => CaptureSource::new(factory),
        };
        (source, harness)
    }

    fn locator() -> Locator {
        Locator::parse("imgstreaming:0").expect("locator")
    }

    #[test]
    fn connected_iff_last_call_was_connect() {
        let (mut source, _) = source_with(None, false);
        let calls = [true, true, false, true, false, false, true];
        for connect in calls {
            if connect {
                source.connect();
            } else {
                source.disconnect();
            }
            assert_eq!(source.is_connected(), connect);
        }
    }

    #[test]
    fn start_on_fresh_source_is_not_connected() {
        let (mut source, _) = source_with(Some(locator()), false);
        assert_eq!(source.start(), Err(CaptureError::NotConnected));
        assert!(!source.is_started());
    }

    #[test]
    fn start_while_disconnected_never_changes_state() {
        let (mut source, harness) = source_with(Some(locator()), false);
        source.streams();
        source.connect();
        source.disconnect();

        assert_eq!(source.start(), Err(CaptureError::NotConnected));
        assert!(!source.is_started());
        assert_eq!(harness.stream().starts.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn start_without_streams_fails() {
        let (mut source, harness) = source_with(Some(locator()), false);
        source.connect();
        assert_eq!(source.start(), Err(CaptureError::NoStream));
        assert!(!source.is_started());
        assert_eq!(harness.created.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn streams_returns_same_instance() {
        let (mut source, harness) = source_with(Some(locator()), false);
        let first = source.streams();
        for _ in 0..5 {
            let again = source.streams();
            assert_eq!(again.len(), 1);
            assert!(Arc::ptr_eq(&first[0], &again[0]));
        }
        assert_eq!(harness.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn full_lifecycle() {
        let (mut source, harness) = source_with(Some(locator()), false);
        source.connect();

        let streams = source.streams();
        assert_eq!(streams.len(), 1);
        assert_eq!(streams[0].format().dimensions(), (720, 480));
        assert_eq!(streams[0].format().max_data_length, 720 * 480 * 4);
        assert_eq!(source.format_control().format().dimensions(), (720, 480));

        source.start().expect("start");
        assert!(source.is_started());
        let stream = harness.stream();
        assert_eq!(stream.starts.load(Ordering::SeqCst), 1);

        source.start().expect("second start is a no-op");
        assert_eq!(stream.starts.load(Ordering::SeqCst), 1);

        source.stop();
        source.stop();
        assert!(!source.is_started());
        assert_eq!(stream.stops.load(Ordering::SeqCst), 1);

        source.disconnect();
        assert!(!source.is_connected());

        let later = source.streams();
        assert!(Arc::ptr_eq(&streams[0], &later[0]));
        assert_eq!(harness.created.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn disconnect_while_started_stops_stream() {
        let (mut source, harness) = source_with(Some(locator()), false);
        source.connect();
        source.streams();
        source.start().expect("start");

        source.disconnect();
        assert!(!source.is_connected());
        assert!(!source.is_started());
        let stream = harness.stream();
        assert_eq!(stream.stops.load(Ordering::SeqCst), 1);
        assert!(!stream.is_started());
    }

    #[test]
    fn stream_start_failure_propagates() {
        let (mut source, _) = source_with(Some(locator()), true);
        source.connect();
        source.streams();

        let err = source.start().unwrap_err();
        assert_eq!(
            err,
            CaptureError::Stream(StreamError::Grabber("display unavailable".to_string()))
        );
        assert!(!source.is_started());
    }

    #[test]
    fn explicit_format_wins_over_stream_default() {
        let (mut source, _) = source_with(Some(locator()), false);
        source
            .format_control()
            .set_format(&FormatDescriptor::xrgb32(352, 288))
            .expect("supported");

        let streams = source.streams();
        assert_eq!(streams[0].format().dimensions(), (352, 288));
    }

    #[test]
    fn format_change_after_streams_reaches_stream() {
        let (mut source, harness) = source_with(Some(locator()), false);
        let streams = source.streams();

        let adopted = source
            .format_control()
            .set_format(&FormatDescriptor::xrgb32(176, 144))
            .expect("supported");
        assert_eq!(streams[0].format(), adopted);
        assert_eq!(harness.stream().set_format_calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn unsupported_format_keeps_previous() {
        let (source, _) = source_with(Some(locator()), false);
        let control = source.format_control();
        let before = control.format();

        let err: CaptureError = control
            .set_format(&FormatDescriptor::xrgb32(640, 480))
            .unwrap_err()
            .into();
        assert!(matches!(err, CaptureError::UnsupportedFormat(f) if f.dimensions() == (640, 480)));
        assert_eq!(control.format(), before);
    }

    #[test]
    fn configured_stream_format_index() {
        let (source, _) = source_with(Some(locator()), false);
        let mut source = source.with_stream_format_index(2);
        let streams = source.streams();
        assert_eq!(streams[0].format().dimensions(), (320, 240));
    }

    #[test]
    fn controls_are_copies() {
        let (source, _) = source_with(None, false);
        let mut controls = source.controls();
        assert_eq!(controls.len(), 1);
        assert_eq!(controls[0].kind(), ControlKind::Format);
        controls.clear();
        assert_eq!(source.controls().len(), 1);

        let control = source.control(ControlKind::Format).expect("format control");
        let negotiator = control.as_format().expect("format facet");
        assert!(Arc::ptr_eq(negotiator, &source.format_control()));
    }

    #[test]
    fn capture_info_requires_locator() {
        let (source, _) = source_with(None, false);
        assert_eq!(source.capture_info().unwrap_err(), CaptureError::NoLocator);

        let (source, _) = source_with(Some(locator()), false);
        let info = source.capture_info().expect("info");
        assert_eq!(info.name, "0");
        assert_eq!(info.locator, locator());
        assert_eq!(info.formats.len(), 6);
    }

    #[test]
    fn constant_answers() {
        let (source, _) = source_with(None, false);
        assert_eq!(source.content_type(), ContentType::Raw);
        assert_eq!(source.content_type().as_str(), "raw");
        assert_eq!(source.duration(), MediaDuration::Unknown);
    }
}
