//! Error types for the grid server

use std::net::SocketAddr;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Grid server error types
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Pixel coordinate outside the grid extent
    #[error("pixel ({x}, {y}) is outside the {width}x{height} grid")]
    OutOfBounds {
        x: usize,
        y: usize,
        width: usize,
        height: usize,
    },

    /// Linear LED index outside the chain
    #[error("LED index {index} is outside a chain of {len} LEDs")]
    IndexOutOfRange { index: usize, len: usize },

    /// Brightness does not fit in 5 bits
    #[error("brightness {0} is outside 0..=31")]
    InvalidBrightness(u8),

    /// A 4-byte record without the 0xE0 marker bits
    #[error("invalid pixel record {0:02x?}")]
    InvalidRecord([u8; 4]),

    /// Pixel sequence does not match the chain length
    #[error("expected {expected} pixel records, got {actual}")]
    RecordCount { expected: usize, actual: usize },

    /// The listening socket could not be set up
    #[error("failed to bind listener on {addr}: {source}")]
    ListenerBind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port error
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// Configuration or credential file could not be parsed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Configuration parsed but is unusable
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
