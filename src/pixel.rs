//! Per-LED record format for the SK9822 chain

use crate::error::{Error, Result};

/// High bits that mark a valid record. Anything else desyncs the chain downstream.
pub const RECORD_MARKER: u8 = 0xE0;

/// Largest value that fits in the 5 brightness bits
pub const MAX_BRIGHTNESS: u8 = 0x1F;

/// One LED's state as it travels on the wire: `[0xE0 | brightness, blue, green, red]`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRecord([u8; 4]);

impl PixelRecord {
    /// All channels and brightness at zero
    pub const OFF: PixelRecord = PixelRecord([RECORD_MARKER, 0, 0, 0]);

    /// Build a record, rejecting brightness values above 31
    pub fn new(red: u8, green: u8, blue: u8, brightness: u8) -> Result<Self> {
        if brightness > MAX_BRIGHTNESS {
            return Err(Error::InvalidBrightness(brightness));
        }
        Ok(PixelRecord([RECORD_MARKER | brightness, blue, green, red]))
    }

    /// Build a record, clamping brightness into 0..=31
    pub fn clamped(red: u8, green: u8, blue: u8, brightness: u8) -> Self {
        PixelRecord([RECORD_MARKER | brightness.min(MAX_BRIGHTNESS), blue, green, red])
    }

    /// Parse a record as it appears on the wire
    pub fn from_bytes(bytes: [u8; 4]) -> Result<Self> {
        if bytes[0] & RECORD_MARKER != RECORD_MARKER {
            return Err(Error::InvalidRecord(bytes));
        }
        Ok(PixelRecord(bytes))
    }

    pub fn to_bytes(self) -> [u8; 4] {
        self.0
    }

    pub fn brightness(self) -> u8 {
        self.0[0] & MAX_BRIGHTNESS
    }

    pub fn blue(self) -> u8 {
        self.0[1]
    }

    pub fn green(self) -> u8 {
        self.0[2]
    }

    pub fn red(self) -> u8 {
        self.0[3]
    }
}

impl Default for PixelRecord {
    fn default() -> Self {
        Self::OFF
    }
}
