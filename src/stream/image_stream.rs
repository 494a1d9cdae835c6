//! Desktop image stream
//!
//! Grabs the screen on a dedicated thread, scales each image to the
//! negotiated resolution and pushes the result to every subscriber.

use super::{DesktopGrabber, GrabberSource, ProducerStream, StreamError, StreamFactory, StreamStats, VideoBuffer};
use crate::format::{FormatCatalog, FormatDescriptor};
use crate::locator::Locator;
use crossbeam::channel::{bounded, Receiver, RecvTimeoutError, Sender, TryRecvError, TrySendError};
use image::imageops::{self, FilterType};
use image::RgbaImage;
use log::{debug, info, warn};
use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Lowest frame rate accepted when deriving the capture interval
const MIN_FRAME_RATE: f32 = 0.1;

/// Tuning for image streams
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Frame rate used when the format leaves it unspecified
    pub default_frame_rate: f32,

    /// Buffers queued per subscriber before frames are dropped
    pub buffer_depth: usize,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            default_frame_rate: 10.0,
            buffer_depth: 2,
        }
    }
}

impl StreamSettings {
    fn frame_interval(&self, format: &FormatDescriptor) -> Duration {
        let rate = format.frame_rate.unwrap_or(self.default_frame_rate);
        Duration::from_secs_f64(1.0 / f64::from(rate.max(MIN_FRAME_RATE)))
    }
}

struct Worker {
    stop_tx: Sender<()>,
    handle: JoinHandle<()>,
}

/// Push stream of scaled desktop images
pub struct ImageStream {
    locator: Option<Locator>,
    grabbers: Arc<dyn GrabberSource>,
    settings: StreamSettings,
    format: Arc<RwLock<FormatDescriptor>>,
    subscribers: Arc<Mutex<Vec<Sender<VideoBuffer>>>>,
    stats: Arc<Mutex<StreamStats>>,
    worker: Mutex<Option<Worker>>,
}

impl ImageStream {
    /// Create a stream; the grabber is opened on [`start`](ProducerStream::start).
    pub fn new(locator: Option<Locator>, grabbers: Arc<dyn GrabberSource>, settings: StreamSettings) -> Self {
        Self {
            locator,
            grabbers,
            settings,
            format: Arc::new(RwLock::new(*FormatCatalog::default_format())),
            subscribers: Arc::new(Mutex::new(Vec::new())),
            stats: Arc::new(Mutex::new(StreamStats::default())),
            worker: Mutex::new(None),
        }
    }

    fn thread_name(&self) -> String {
        match &self.locator {
            Some(locator) => format!("imgstream-{}", locator.remainder()),
            None => "imgstream".to_string(),
        }
    }
}

impl ProducerStream for ImageStream {
    fn format(&self) -> FormatDescriptor {
        *self.format.read()
    }

    fn set_format(&self, format: FormatDescriptor) {
        debug!("Image stream format set to {}", format);
        *self.format.write() = format;
    }

    fn start(&self) -> Result<(), StreamError> {
        let mut worker = self.worker.lock();
        if worker.is_some() {
            return Ok(());
        }

        let grabber = self.grabbers.open(self.locator.as_ref())?;
        let (stop_tx, stop_rx) = bounded(1);
        let capture = CaptureLoop {
            settings: self.settings.clone(),
            format: self.format.clone(),
            subscribers: self.subscribers.clone(),
            stats: self.stats.clone(),
            stop_rx,
        };

        let handle = thread::Builder::new()
            .name(self.thread_name())
            .spawn(move || capture.run(grabber))
            .map_err(|e| StreamError::Thread(e.to_string()))?;

        info!("Image stream started ({})", self.format());
        *worker = Some(Worker { stop_tx, handle });
        Ok(())
    }

    fn stop(&self) {
        let Some(worker) = self.worker.lock().take() else {
            return;
        };
        let _ = worker.stop_tx.send(());
        if worker.handle.join().is_err() {
            warn!("Image stream capture thread panicked");
        }
        info!("Image stream stopped");
    }

    fn is_started(&self) -> bool {
        self.worker.lock().is_some()
    }

    fn subscribe(&self) -> Receiver<VideoBuffer> {
        let (tx, rx) = bounded(self.settings.buffer_depth.max(1));
        self.subscribers.lock().push(tx);
        rx
    }

    fn stats(&self) -> StreamStats {
        self.stats.lock().clone()
    }
}

impl Drop for ImageStream {
    fn drop(&mut self) {
        self.stop();
    }
}

struct CaptureLoop {
    settings: StreamSettings,
    format: Arc<RwLock<FormatDescriptor>>,
    subscribers: Arc<Mutex<Vec<Sender<VideoBuffer>>>>,
    stats: Arc<Mutex<StreamStats>>,
    stop_rx: Receiver<()>,
}

impl CaptureLoop {
    fn run(self, mut grabber: Box<dyn DesktopGrabber>) {
        let started_at = Instant::now();
        let mut sequence = 0u64;

        loop {
            match self.stop_rx.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break,
            }

            let tick = Instant::now();
            let format = *self.format.read();

            match grabber.grab() {
                Ok(image) => {
                    let buffer = VideoBuffer {
                        data: scale_to_format(&image, &format),
                        format,
                        timestamp_ns: started_at.elapsed().as_nanos() as u64,
                        sequence,
                    };
                    sequence += 1;
                    let capture_us = tick.elapsed().as_micros() as u64;
                    let bytes = buffer.data.len();
                    let dropped = self.deliver(buffer);

                    let mut stats = self.stats.lock();
                    stats.record_capture(bytes, capture_us);
                    stats.record_drops(dropped);
                }
                Err(e) => {
                    warn!("Desktop grab failed: {}", e);
                    self.stats.lock().record_error();
                }
            }

            let remaining = self
                .settings
                .frame_interval(&format)
                .saturating_sub(tick.elapsed());
            match self.stop_rx.recv_timeout(remaining) {
                Err(RecvTimeoutError::Timeout) => {}
                _ => break,
            }
        }

        debug!("Capture loop exited after {} frames", sequence);
    }

    /// Push to every subscriber, returning how many were full.
    fn deliver(&self, buffer: VideoBuffer) -> u64 {
        let mut dropped = 0;
        self.subscribers.lock().retain(|tx| match tx.try_send(buffer.clone()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                dropped += 1;
                true
            }
            Err(TrySendError::Disconnected(_)) => false,
        });
        dropped
    }
}

/// Scale a grabbed image to the resolution of `format`.
pub fn scale_to_format(image: &RgbaImage, format: &FormatDescriptor) -> Vec<u8> {
    if image.dimensions() == format.dimensions() {
        return image.as_raw().clone();
    }
    imageops::resize(image, format.width, format.height, FilterType::Nearest).into_raw()
}

/// Builds [`ImageStream`]s over a shared grabber source
pub struct DesktopStreamFactory {
    grabbers: Arc<dyn GrabberSource>,
    settings: StreamSettings,
}

impl DesktopStreamFactory {
    pub fn new(grabbers: Arc<dyn GrabberSource>, settings: StreamSettings) -> Self {
        Self { grabbers, settings }
    }
}

impl StreamFactory for DesktopStreamFactory {
    fn create(&self, locator: Option<&Locator>) -> Arc<dyn ProducerStream> {
        Arc::new(ImageStream::new(
            locator.cloned(),
            self.grabbers.clone(),
            self.settings.clone(),
        ))
    }
}
