//! SK9822 / APA102-style chain framing
//!
//! ```text
//! ┌──────────────┬──────────────────────────────┬──────────────────────────┐
//! │ 4 x 0x00     │ N x [0xE0|br, B, G, R]       │ 0xFF + (5 + ceil(N/16))  │
//! │ start marker │ pixel records, chain order   │ zero bytes (end marker)  │
//! └──────────────┴──────────────────────────────┴──────────────────────────┘
//! ```
//!
//! The end marker only exists to clock the data through the chain, so its
//! length grows with the number of LEDs.

use crate::error::{Error, Result};
use crate::pixel::PixelRecord;

/// Length of the all-zero start marker
pub const START_MARKER_LEN: usize = 4;

/// Bytes per LED record
pub const RECORD_LEN: usize = 4;

/// End marker length for a chain of `led_count` LEDs
pub const fn end_marker_len(led_count: usize) -> usize {
    6 + led_count.div_ceil(16)
}

/// Total frame length for a chain of `led_count` LEDs
pub const fn frame_len(led_count: usize) -> usize {
    START_MARKER_LEN + RECORD_LEN * led_count + end_marker_len(led_count)
}

/// Frame builder for one fixed-length chain.
///
/// The LED count (and so the end marker length) is captured once at
/// construction, so every frame produced for the same chain has the same size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCodec {
    led_count: usize,
    end_marker_len: usize,
}

impl FrameCodec {
    pub fn new(led_count: usize) -> Self {
        FrameCodec {
            led_count,
            end_marker_len: end_marker_len(led_count),
        }
    }

    pub fn led_count(&self) -> usize {
        self.led_count
    }

    pub fn end_marker_len(&self) -> usize {
        self.end_marker_len
    }

    pub fn frame_len(&self) -> usize {
        START_MARKER_LEN + self.records_len() + self.end_marker_len
    }

    /// Length of the record section
    pub fn records_len(&self) -> usize {
        RECORD_LEN * self.led_count
    }

    /// Byte offset of the first record within a frame
    pub fn records_offset(&self) -> usize {
        START_MARKER_LEN
    }

    /// Encode one record per LED into a complete frame
    pub fn encode(&self, pixels: &[PixelRecord]) -> Result<Vec<u8>> {
        if pixels.len() != self.led_count {
            return Err(Error::RecordCount {
                expected: self.led_count,
                actual: pixels.len(),
            });
        }

        let records: Vec<u8> = pixels.iter().flat_map(|pixel| pixel.to_bytes()).collect();
        Ok(self.frame_from_records(&records))
    }

    /// Frame the record section of a chain, already in wire order.
    ///
    /// `records` must be exactly [`records_len`](Self::records_len) bytes;
    /// callers own buffers sized by this codec.
    pub(crate) fn frame_from_records(&self, records: &[u8]) -> Vec<u8> {
        debug_assert_eq!(records.len(), self.records_len());
        let mut frame = self.start_frame();
        frame.extend_from_slice(records);
        self.finish_frame(&mut frame);
        frame
    }

    /// A frame with every LED off
    pub fn blank_frame(&self) -> Vec<u8> {
        let mut frame = self.start_frame();
        for _ in 0..self.led_count {
            frame.extend_from_slice(&PixelRecord::OFF.to_bytes());
        }
        self.finish_frame(&mut frame);
        frame
    }

    fn start_frame(&self) -> Vec<u8> {
        let mut frame = Vec::with_capacity(self.frame_len());
        frame.extend_from_slice(&[0x00; START_MARKER_LEN]);
        frame
    }

    fn finish_frame(&self, frame: &mut Vec<u8>) {
        frame.push(0xFF);
        frame.resize(frame.len() + self.end_marker_len - 1, 0x00);
    }
}
