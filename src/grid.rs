//! 2D pixel grid over a serpentine-wired SK9822 chain
//!
//! The grid owns one complete frame buffer (start marker, records, end
//! marker) sized once at construction. Row `y` runs left-to-right when `y`
//! is even and right-to-left when `y` is odd:
//!
//! ```text
//!   LED0  LED1  LED2
//!   LED5  LED4  LED3
//!   LED6  LED7  LED8
//! ```

use crate::error::{Error, Result};
use crate::pixel::PixelRecord;
use crate::protocol::sk9822::RECORD_LEN;
use crate::protocol::FrameCodec;

/// Offset within the frame buffer where raw writes land
pub const RAW_WRITE_OFFSET: usize = 0;

#[derive(Debug, Clone)]
pub struct PixelGrid {
    width: usize,
    height: usize,
    codec: FrameCodec,
    buffer: Vec<u8>,
}

impl PixelGrid {
    /// Allocate a grid with every LED off
    pub fn new(width: usize, height: usize) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::InvalidConfig(format!(
                "grid must be at least 1x1, got {}x{}",
                width, height
            )));
        }
        let led_count = width.checked_mul(height).ok_or_else(|| {
            Error::InvalidConfig(format!("grid {}x{} is too large", width, height))
        })?;

        let codec = FrameCodec::new(led_count);
        let buffer = codec.blank_frame();

        Ok(PixelGrid {
            width,
            height,
            codec,
            buffer,
        })
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn led_count(&self) -> usize {
        self.codec.led_count()
    }

    /// Size in bytes of the frame buffer, which is also the raw-write capacity
    pub fn frame_len(&self) -> usize {
        self.buffer.len()
    }

    /// Map a grid coordinate to its position in the chain
    pub fn linear_index(&self, x: usize, y: usize) -> Result<usize> {
        if x >= self.width || y >= self.height {
            return Err(Error::OutOfBounds {
                x,
                y,
                width: self.width,
                height: self.height,
            });
        }
        let column = if y % 2 == 1 { self.width - 1 - x } else { x };
        Ok(self.width * y + column)
    }

    pub fn set_pixel(&mut self, x: usize, y: usize, color: PixelRecord) -> Result<()> {
        let index = self.linear_index(x, y)?;
        self.set_by_linear_index(index, color)
    }

    pub fn set_by_linear_index(&mut self, index: usize, color: PixelRecord) -> Result<()> {
        let start = self.record_offset(index)?;
        self.buffer[start..start + RECORD_LEN].copy_from_slice(&color.to_bytes());
        Ok(())
    }

    /// Raw record bytes at a chain position
    pub fn record_bytes(&self, index: usize) -> Result<[u8; 4]> {
        let start = self.record_offset(index)?;
        let mut record = [0u8; RECORD_LEN];
        record.copy_from_slice(&self.buffer[start..start + RECORD_LEN]);
        Ok(record)
    }

    pub fn fill(&mut self, color: PixelRecord) {
        let bytes = color.to_bytes();
        let records = self.codec.records_offset()..self.codec.records_offset() + self.codec.records_len();
        for record in self.buffer[records].chunks_exact_mut(RECORD_LEN) {
            record.copy_from_slice(&bytes);
        }
    }

    /// Copy sender bytes over the frame buffer starting at [`RAW_WRITE_OFFSET`].
    ///
    /// The stream server does not call this: a session keeps its own cursor
    /// and continues through [`write_raw_at`](Self::write_raw_at), which this
    /// is the offset-0 case of.
    ///
    /// Returns how many bytes were stored; anything past the buffer is dropped.
    pub fn write_raw(&mut self, bytes: &[u8]) -> usize {
        self.write_raw_at(RAW_WRITE_OFFSET, bytes)
    }

    /// Copy sender bytes over the frame buffer starting at `offset`.
    ///
    /// Bytes outside the supplied range keep their previous value.
    pub fn write_raw_at(&mut self, offset: usize, bytes: &[u8]) -> usize {
        let Some(space) = self.buffer.len().checked_sub(offset) else {
            return 0;
        };
        let count = bytes.len().min(space);
        self.buffer[offset..offset + count].copy_from_slice(&bytes[..count]);
        count
    }

    /// Current buffer as a transmittable frame.
    ///
    /// Markers are regenerated, so a raw write that landed on them cannot
    /// desync the chain.
    pub fn encoded_frame(&self) -> Vec<u8> {
        let start = self.codec.records_offset();
        self.codec
            .frame_from_records(&self.buffer[start..start + self.codec.records_len()])
    }

    fn record_offset(&self, index: usize) -> Result<usize> {
        if index >= self.led_count() {
            return Err(Error::IndexOutOfRange {
                index,
                len: self.led_count(),
            });
        }
        Ok(self.codec.records_offset() + RECORD_LEN * index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn red() -> PixelRecord {
        PixelRecord::new(255, 0, 0, 31).unwrap()
    }

    #[test]
    fn test_serpentine_mapping() {
        let grid = PixelGrid::new(3, 3).unwrap();
        assert_eq!(grid.linear_index(0, 0).unwrap(), 0);
        assert_eq!(grid.linear_index(2, 0).unwrap(), 2);
        assert_eq!(grid.linear_index(0, 1).unwrap(), 5);
        assert_eq!(grid.linear_index(2, 1).unwrap(), 3);
        assert_eq!(grid.linear_index(0, 2).unwrap(), 6);
    }

    #[test]
    fn test_serpentine_formula_and_bijection() {
        let (w, h) = (7, 5);
        let grid = PixelGrid::new(w, h).unwrap();
        let mut seen = HashSet::new();
        for y in 0..h {
            for x in 0..w {
                let index = grid.linear_index(x, y).unwrap();
                let expected = if y % 2 == 0 { w * y + x } else { w * y + (w - 1 - x) };
                assert_eq!(index, expected);
                assert!(seen.insert(index));
            }
        }
        assert_eq!(seen.len(), w * h);
        assert!(seen.iter().all(|&i| i < w * h));
    }

    #[test]
    fn test_set_pixel_writes_record_in_place() {
        let mut grid = PixelGrid::new(4, 2).unwrap();
        grid.set_pixel(0, 1, red()).unwrap();
        // (0, 1) is the last LED of the chain
        assert_eq!(grid.record_bytes(7).unwrap(), [0xFF, 0, 0, 255]);
        let frame = grid.encoded_frame();
        assert_eq!(&frame[4 + 28..4 + 32], &[0xFF, 0, 0, 255]);
    }

    #[test]
    fn test_set_pixel_out_of_bounds() {
        let mut grid = PixelGrid::new(4, 2).unwrap();
        assert!(matches!(
            grid.set_pixel(4, 0, red()),
            Err(Error::OutOfBounds { x: 4, y: 0, width: 4, height: 2 })
        ));
        assert!(grid.set_pixel(0, 2, red()).is_err());
        assert!(matches!(
            grid.set_by_linear_index(8, red()),
            Err(Error::IndexOutOfRange { index: 8, len: 8 })
        ));
    }

    #[test]
    fn test_fill_sets_every_record() {
        let mut grid = PixelGrid::new(5, 3).unwrap();
        grid.fill(red());
        for i in 0..grid.led_count() {
            assert_eq!(grid.record_bytes(i).unwrap(), red().to_bytes());
        }
        let frame = grid.encoded_frame();
        assert_eq!(&frame[..4], &[0, 0, 0, 0]);
        assert_eq!(frame[4 + 60], 0xFF);
    }

    #[test]
    fn test_60x16_blank_frame_length() {
        let mut grid = PixelGrid::new(60, 16).unwrap();
        grid.fill(PixelRecord::new(10, 20, 30, 0).unwrap());
        assert_eq!(grid.encoded_frame().len(), 3910);
        assert_eq!(grid.frame_len(), 3910);
    }

    #[test]
    fn test_short_raw_write_updates_prefix_only() {
        let mut grid = PixelGrid::new(4, 4).unwrap();
        grid.fill(red());
        let before = grid.encoded_frame();

        let written = grid.write_raw(&[0, 0, 0, 0, 0xE1, 9, 9, 9]);
        assert_eq!(written, 8);

        let after = grid.encoded_frame();
        assert_eq!(after.len(), before.len());
        assert_eq!(&after[4..8], &[0xE1, 9, 9, 9]);
        assert_eq!(&after[8..], &before[8..]);
    }

    #[test]
    fn test_raw_write_drops_overflow() {
        let mut grid = PixelGrid::new(2, 1).unwrap();
        let len = grid.frame_len();
        let data = vec![0xEE; len + 100];
        assert_eq!(grid.write_raw(&data), len);
        assert_eq!(grid.frame_len(), len);
        assert_eq!(grid.led_count(), 2);
        assert_eq!(grid.write_raw_at(len, &[1, 2, 3]), 0);
        assert_eq!(grid.write_raw_at(len - 1, &[1, 2, 3]), 1);
    }

    #[test]
    fn test_encoded_frame_regenerates_markers() {
        let mut grid = PixelGrid::new(2, 1).unwrap();
        let len = grid.frame_len();
        grid.write_raw(&vec![0xEE; len]);
        let frame = grid.encoded_frame();
        assert_eq!(&frame[..4], &[0, 0, 0, 0]);
        assert_eq!(&frame[4..12], &[0xEE; 8]);
        assert_eq!(frame[12], 0xFF);
        assert!(frame[13..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encoded_frame_matches_codec_encode() {
        let mut grid = PixelGrid::new(3, 2).unwrap();
        grid.fill(PixelRecord::clamped(1, 2, 3, 4));
        grid.set_pixel(2, 1, red()).unwrap();
        let records: Vec<PixelRecord> = (0..grid.led_count())
            .map(|i| PixelRecord::from_bytes(grid.record_bytes(i).unwrap()).unwrap())
            .collect();
        assert_eq!(grid.encoded_frame(), grid.codec.encode(&records).unwrap());
    }

    #[test]
    fn test_zero_sized_grid_rejected() {
        assert!(PixelGrid::new(0, 16).is_err());
        assert!(PixelGrid::new(60, 0).is_err());
    }
}
