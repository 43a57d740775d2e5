use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};

/// Delimiter between the decimal length field and the payload.
pub const LENGTH_DELIMITER: u8 = b'\n';

/// Maximum number of digits accepted in the length field.
pub const MAX_LENGTH_DIGITS: usize = 10;

/// Default maximum payload size: 16 MiB.
pub const DEFAULT_MAX_PAYLOAD: usize = 16 * 1024 * 1024;

/// One framed message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The message payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The total wire size of this frame (length field + delimiter + payload).
    pub fn wire_size(&self) -> usize {
        decimal_digits(self.payload.len()) + 1 + self.payload.len()
    }

    /// The payload as text, if it is valid UTF-8.
    pub fn as_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }
}

/// Encode only the length header for a payload of `payload_len` bytes.
pub fn encode_header(payload_len: usize, dst: &mut BytesMut) -> Result<()> {
    if payload_len == 0 {
        return Err(FrameError::EmptyPayload);
    }
    let digits = payload_len.to_string();
    dst.reserve(digits.len() + 1);
    dst.put_slice(digits.as_bytes());
    dst.put_u8(LENGTH_DELIMITER);
    Ok(())
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌──────────────────────┬──────┬──────────────────┐
/// │ Length (ASCII digits)│ "\n" │ Payload          │
/// │ e.g. "25"            │      │ (Length bytes)   │
/// └──────────────────────┴──────┴──────────────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) -> Result<()> {
    encode_header(payload.len(), dst)?;
    dst.reserve(payload.len());
    dst.put_slice(payload);
    Ok(())
}

/// Decode a frame from a buffer.
///
/// Returns `Ok(None)` if the buffer doesn't contain a complete frame yet.
/// On success, consumes exactly the frame bytes from the buffer. Length-field
/// violations are reported as soon as the offending byte is buffered, without
/// waiting for the delimiter.
pub fn decode_frame(src: &mut BytesMut, max_payload: usize) -> Result<Option<Frame>> {
    let scan_limit = src.len().min(MAX_LENGTH_DIGITS + 1);

    let mut delimiter = None;
    for (idx, &byte) in src[..scan_limit].iter().enumerate() {
        if byte == LENGTH_DELIMITER {
            delimiter = Some(idx);
            break;
        }
        if !byte.is_ascii_digit() {
            return Err(FrameError::InvalidLengthByte { byte });
        }
    }

    let Some(digits) = delimiter else {
        if src.len() > MAX_LENGTH_DIGITS {
            return Err(FrameError::LengthFieldTooLong {
                max: MAX_LENGTH_DIGITS,
            });
        }
        return Ok(None); // Need more data
    };

    let payload_len = parse_length(&src[..digits])?;
    if payload_len > max_payload {
        return Err(FrameError::PayloadTooLarge {
            size: payload_len,
            max: max_payload,
        });
    }

    let total = digits + 1 + payload_len;
    if src.len() < total {
        src.reserve(total - src.len());
        return Ok(None); // Need more data
    }

    src.advance(digits + 1);
    let payload = src.split_to(payload_len).freeze();

    Ok(Some(Frame { payload }))
}

fn parse_length(field: &[u8]) -> Result<usize> {
    let invalid = || FrameError::InvalidLength {
        field: String::from_utf8_lossy(field).into_owned(),
    };

    let text = std::str::from_utf8(field).map_err(|_| invalid())?;
    let value: u64 = text.parse().map_err(|_| invalid())?;
    if value == 0 {
        return Err(invalid());
    }
    usize::try_from(value).map_err(|_| invalid())
}

fn decimal_digits(mut n: usize) -> usize {
    let mut digits = 1;
    while n >= 10 {
        n /= 10;
        digits += 1;
    }
    digits
}

/// Configuration for the frame codec.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum payload size in bytes. Default: 16 MiB.
    pub max_payload_size: usize,
    /// Read timeout for blocking operations.
    pub read_timeout: Option<std::time::Duration>,
    /// Write timeout for blocking operations.
    pub write_timeout: Option<std::time::Duration>,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_payload_size: DEFAULT_MAX_PAYLOAD,
            read_timeout: None,
            write_timeout: None,
        }
    }
}
