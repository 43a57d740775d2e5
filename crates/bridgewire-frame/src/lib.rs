//! Decimal length-prefixed message framing for the bridgewire relay protocol.
//!
//! Every message on the wire is:
//! - the payload byte count as ASCII decimal digits
//! - a single `\n`
//! - exactly that many payload bytes (by convention a JSON value)
//!
//! The next frame starts immediately after the last payload byte. No partial
//! reads, no buffer management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

#[cfg(feature = "async")]
pub mod async_codec;

#[cfg(feature = "async")]
pub use async_codec::BridgeCodec;
pub use codec::{
    decode_frame, encode_frame, encode_header, Frame, FrameConfig, DEFAULT_MAX_PAYLOAD,
    LENGTH_DELIMITER, MAX_LENGTH_DIGITS,
};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
