use std::io::{ErrorKind, Read};

use bridgewire_transport::BridgeStream;
use bytes::BytesMut;
use tracing::{debug, trace};

use crate::codec::{decode_frame, Frame, FrameConfig};
use crate::error::{FrameError, Result};

const INITIAL_BUFFER_CAPACITY: usize = 8 * 1024;
const READ_CHUNK_SIZE: usize = 8 * 1024;

/// Reads complete frames from any `Read` stream.
///
/// Reads the stream in chunks and keeps any bytes past the current frame for
/// the next call, so callers always get exactly one complete frame and the
/// logical stream position is the first byte of the following frame.
pub struct FrameReader<T> {
    inner: T,
    buf: BytesMut,
    config: FrameConfig,
}

impl<T: Read> FrameReader<T> {
    /// Create a new frame reader with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame reader with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(INITIAL_BUFFER_CAPACITY),
            config,
        }
    }

    /// Read the next complete frame (blocking).
    ///
    /// Returns `Err(FrameError::ConnectionClosed)` when EOF is reached before a
    /// full frame has arrived.
    pub fn read_frame(&mut self) -> Result<Frame> {
        loop {
            match decode_frame(&mut self.buf, self.config.max_payload_size) {
                Ok(Some(frame)) => {
                    trace!(size = frame.payload.len(), "decoded frame");
                    return Ok(frame);
                }
                Ok(None) => {}
                Err(err) => {
                    debug!(error = %err, buffered = self.buf.len(), "malformed frame header");
                    return Err(err);
                }
            }

            let mut chunk = [0u8; READ_CHUNK_SIZE];
            let read = match self.inner.read(&mut chunk) {
                Ok(n) => n,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            };

            if read == 0 {
                return Err(FrameError::ConnectionClosed {
                    buffered: self.buf.len(),
                });
            }

            self.buf.extend_from_slice(&chunk[..read]);
        }
    }

    /// Number of bytes already read from the stream but not yet consumed.
    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// True when bytes are buffered, so the next read starts without waiting.
    pub fn has_buffered_data(&self) -> bool {
        !self.buf.is_empty()
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the reader and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame decoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame reader configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameReader<BridgeStream> {
    /// Create a frame reader for `BridgeStream` and apply read timeout from config.
    pub fn with_config_stream(inner: BridgeStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_read_timeout(config.read_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

pub(crate) fn transport_to_frame_error(err: bridgewire_transport::TransportError) -> FrameError {
    match err {
        bridgewire_transport::TransportError::Io(io)
        | bridgewire_transport::TransportError::Accept(io)
        | bridgewire_transport::TransportError::Poll(io)
        | bridgewire_transport::TransportError::Shutdown(io) => FrameError::Io(io),
        bridgewire_transport::TransportError::Bind { source, .. }
        | bridgewire_transport::TransportError::Connect { source, .. }
        | bridgewire_transport::TransportError::Resolve { source, .. } => FrameError::Io(source),
    }
}
