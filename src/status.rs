//! Status display updates
//!
//! The display itself is an external collaborator behind [`StatusSink`].
//! Updates are best-effort: a failing display is logged and otherwise ignored.

use std::collections::BTreeMap;
use std::net::{IpAddr, Ipv4Addr};

use log::{debug, info, warn};

use crate::error::Result;

/// Pixel width of the status display
pub const DISPLAY_WIDTH: usize = 128;

/// Characters per text line with the 8px font
pub const LINE_CHARS: usize = 16;

/// Vertical spacing between text lines
pub const LINE_HEIGHT: i32 = 10;

/// Row used for the throughput figure
pub const THROUGHPUT_ROW: i32 = 50;

/// Banner shown while the network comes up
pub const STARTUP_BANNER: &str = "SK9822 Grid WIFI controller initializing...";

/// Text and pixel sink for a small monochrome display
pub trait StatusSink {
    fn clear(&mut self) -> Result<()>;

    fn write_text(&mut self, text: &str, x: i32, y: i32) -> Result<()>;

    fn write_pixel(&mut self, x: i32, y: i32, on: bool) -> Result<()>;

    /// Push pending changes to the panel
    fn present(&mut self) -> Result<()>;
}

/// Display that renders to the log, for hosts without a panel
#[derive(Debug, Default)]
pub struct LogDisplay {
    lines: BTreeMap<i32, String>,
    lit_pixels: usize,
}

impl LogDisplay {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StatusSink for LogDisplay {
    fn clear(&mut self) -> Result<()> {
        self.lines.clear();
        self.lit_pixels = 0;
        Ok(())
    }

    fn write_text(&mut self, text: &str, _x: i32, y: i32) -> Result<()> {
        self.lines.insert(y, text.trim_end().to_string());
        Ok(())
    }

    fn write_pixel(&mut self, _x: i32, _y: i32, on: bool) -> Result<()> {
        if on {
            self.lit_pixels += 1;
        }
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        let text: Vec<&str> = self.lines.values().map(String::as_str).collect();
        if !text.is_empty() {
            info!("[display] {}", text.join(" | "));
        }
        if self.lit_pixels > 0 {
            debug!("[display] bitmap with {} lit pixels", self.lit_pixels);
        }
        Ok(())
    }
}

/// Formats the server's status screens onto a [`StatusSink`]
pub struct StatusReporter<S: StatusSink> {
    sink: S,
}

impl<S: StatusSink> StatusReporter<S> {
    pub fn new(sink: S) -> Self {
        StatusReporter { sink }
    }

    /// Show a message wrapped to the display width
    pub fn banner(&mut self, message: &str) {
        self.best_effort("banner", |sink| {
            sink.clear()?;
            let chars: Vec<char> = message.chars().collect();
            for (row, line) in chars.chunks(LINE_CHARS).enumerate() {
                let line: String = line.iter().collect();
                sink.write_text(&line, 0, LINE_HEIGHT * row as i32)?;
            }
            sink.present()
        });
    }

    pub fn ready(&mut self, addr: Ipv4Addr, port: u16) {
        self.best_effort("ready screen", |sink| {
            sink.clear()?;
            sink.write_text("ready to accept:", 0, 0)?;
            sink.write_text(&addr.to_string(), 0, LINE_HEIGHT)?;
            sink.write_text(&format!(" on port: {}", port), 0, 2 * LINE_HEIGHT)?;
            sink.present()
        });
    }

    pub fn connected(&mut self, peer: IpAddr) {
        self.best_effort("connected screen", |sink| {
            sink.clear()?;
            sink.write_text("client connected", 0, 0)?;
            sink.write_text(&peer.to_string(), 0, LINE_HEIGHT)?;
            sink.present()
        });
    }

    /// Replace the throughput line with a new chunks-per-second figure
    pub fn throughput(&mut self, chunks_per_sec: f64) {
        self.best_effort("throughput", |sink| {
            let text = format!("FPS: {}", chunks_per_sec.round() as u64);
            sink.write_text(&format!("{:<width$}", text, width = LINE_CHARS), 0, THROUGHPUT_ROW)?;
            sink.present()
        });
    }

    /// Draw a 1-bit bitmap, least significant bit first, rows of [`DISPLAY_WIDTH`] pixels
    pub fn bitmap(&mut self, bytes: &[u8]) {
        self.best_effort("bitmap", |sink| {
            sink.clear()?;
            for (i, byte) in bytes.iter().enumerate() {
                for bit in 0..8 {
                    let n = 8 * i + bit;
                    let x = (n % DISPLAY_WIDTH) as i32;
                    let y = (n / DISPLAY_WIDTH) as i32;
                    sink.write_pixel(x, y, byte & (1 << bit) != 0)?;
                }
            }
            sink.present()
        });
    }

    fn best_effort(&mut self, what: &str, update: impl FnOnce(&mut S) -> Result<()>) {
        if let Err(e) = update(&mut self.sink) {
            warn!("Status display {} failed: {}", what, e);
        }
    }
}
