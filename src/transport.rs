//! Byte transport to the physical LED bus

use log::{info, trace, warn};
use serialport::SerialPort;
use std::io::Write;
use std::thread;
use std::time::Duration;

use crate::config::TransportConfig;
use crate::error::Result;

/// Sink for bytes headed to the LED chain
pub trait LedTransport {
    /// Write arbitrary bytes to the bus as-is
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Write a complete frame (start marker, records, end marker) in one go
    fn show(&mut self, frame: &[u8]) -> Result<()> {
        self.write(frame)
    }
}

impl<T: LedTransport + ?Sized> LedTransport for Box<T> {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        (**self).write(bytes)
    }

    fn show(&mut self, frame: &[u8]) -> Result<()> {
        (**self).show(frame)
    }
}

/// LED bus reached through a serial bridge (e.g. a USB-to-SPI adapter)
pub struct SerialTransport {
    name: String,
    port: Box<dyn SerialPort>,
}

impl SerialTransport {
    pub fn open(config: &TransportConfig) -> Result<Self> {
        let mut port = serialport::new(&config.port, config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .open()?;

        // Bounded write timeout so a stalled bus cannot hang a session forever
        port.set_timeout(Duration::from_millis(1000))?;

        if let Err(e) = port.write_data_terminal_ready(true) {
            warn!("Failed to set DTR on {}: {}", config.port, e);
        }

        // Allow device to initialize
        thread::sleep(Duration::from_millis(100));

        info!("Opened {} @ {} baud", config.port, config.baud_rate);

        Ok(SerialTransport {
            name: config.port.clone(),
            port,
        })
    }
}

impl LedTransport for SerialTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        trace!("{}: writing {} bytes", self.name, bytes.len());
        self.port.write_all(bytes)?;
        Ok(())
    }

    fn show(&mut self, frame: &[u8]) -> Result<()> {
        self.write(frame)?;
        self.port.flush()?;
        Ok(())
    }
}

/// Transport that discards everything, for running without LED hardware
#[derive(Debug, Default)]
pub struct NullTransport {
    bytes_discarded: u64,
}

impl NullTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bytes_discarded(&self) -> u64 {
        self.bytes_discarded
    }
}

impl LedTransport for NullTransport {
    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        self.bytes_discarded += bytes.len() as u64;
        trace!("Discarded {} bytes ({} total)", bytes.len(), self.bytes_discarded);
        Ok(())
    }
}
