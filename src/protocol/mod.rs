//! Wire framing for LED driver chains

pub mod sk9822;

pub use sk9822::FrameCodec;
