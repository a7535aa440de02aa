//! SK9822 LED grid network controller
//!
//! Brings the network up ([`connectivity`]), then accepts one TCP client at a
//! time ([`stream_server`]) and forwards its bytes into a serpentine-wired
//! pixel grid ([`grid`]) framed for the SK9822 chain ([`protocol`]).

pub mod clock;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod grid;
pub mod pixel;
pub mod protocol;
pub mod radio;
pub mod status;
pub mod stream_server;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{Error, Result};
