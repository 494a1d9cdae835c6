//! Video buffers and stream statistics

use crate::format::FormatDescriptor;
use serde::Serialize;
use std::fmt;

/// One raw frame pushed by a producer stream
#[derive(Debug, Clone)]
pub struct VideoBuffer {
    /// Raw pixel data laid out as `format` describes
    pub data: Vec<u8>,

    /// Format of `data`
    pub format: FormatDescriptor,

    /// Nanoseconds since the stream started
    pub timestamp_ns: u64,

    /// Frame sequence number, starting at 0 on each start
    pub sequence: u64,
}

impl fmt::Display for VideoBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "VideoBuffer({}x{}, {} bytes, seq={}, ts={}ns)",
            self.format.width,
            self.format.height,
            self.data.len(),
            self.sequence,
            self.timestamp_ns
        )
    }
}

/// Frame statistics for monitoring
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct StreamStats {
    /// Total frames produced
    pub total_frames: u64,

    /// Total bytes produced
    pub total_bytes: u64,

    /// Deliveries skipped because a subscriber was full
    pub dropped_frames: u64,

    /// Grab attempts that failed
    pub grab_errors: u64,

    /// Total capture time in microseconds
    pub total_capture_time_us: u64,

    /// Last capture time in microseconds
    pub last_capture_time_us: u64,
}

impl StreamStats {
    /// Record a frame capture
    pub fn record_capture(&mut self, bytes: usize, time_us: u64) {
        self.total_frames += 1;
        self.total_bytes += bytes as u64;
        self.last_capture_time_us = time_us;
        self.total_capture_time_us += time_us;
    }

    pub fn record_drops(&mut self, count: u64) {
        self.dropped_frames += count;
    }

    pub fn record_error(&mut self) {
        self.grab_errors += 1;
    }

    /// Mean capture time in microseconds
    pub fn average_capture_time_us(&self) -> u64 {
        if self.total_frames == 0 {
            0
        } else {
            self.total_capture_time_us / self.total_frames
        }
    }
}
