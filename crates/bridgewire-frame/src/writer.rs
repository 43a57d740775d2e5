use std::io::{ErrorKind, Write};

use bridgewire_transport::BridgeStream;
use bytes::BytesMut;

use crate::codec::{encode_header, Frame, FrameConfig};
use crate::error::{FrameError, Result};
use crate::reader::transport_to_frame_error;

const HEADER_BUFFER_CAPACITY: usize = 16;

/// Writes complete frames to any `Write` stream.
///
/// Each frame goes out as two writes: the length header, then the payload.
/// Short writes are resumed until every byte has been accepted. Only
/// `Interrupted` is retried; an expired write timeout is reported as
/// [`FrameError::Io`].
pub struct FrameWriter<T> {
    inner: T,
    header: BytesMut,
    config: FrameConfig,
}

impl<T: Write> FrameWriter<T> {
    /// Create a new frame writer with default configuration.
    pub fn new(inner: T) -> Self {
        Self::with_config(inner, FrameConfig::default())
    }

    /// Create a new frame writer with explicit configuration.
    pub fn with_config(inner: T, config: FrameConfig) -> Self {
        Self {
            inner,
            header: BytesMut::with_capacity(HEADER_BUFFER_CAPACITY),
            config,
        }
    }

    /// Write a complete frame (blocking).
    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.send(frame.payload.as_ref())
    }

    /// Frame and send a payload.
    pub fn send(&mut self, payload: &[u8]) -> Result<()> {
        if payload.len() > self.config.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.config.max_payload_size,
            });
        }

        self.header.clear();
        encode_header(payload.len(), &mut self.header)?;

        write_fully(&mut self.inner, &self.header)?;
        write_fully(&mut self.inner, payload)?;

        self.flush()
    }

    /// Flush the underlying stream.
    pub fn flush(&mut self) -> Result<()> {
        loop {
            match self.inner.flush() {
                Ok(()) => return Ok(()),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(FrameError::Io(err)),
            }
        }
    }

    /// Borrow the underlying stream.
    pub fn get_ref(&self) -> &T {
        &self.inner
    }

    /// Mutably borrow the underlying stream.
    pub fn get_mut(&mut self) -> &mut T {
        &mut self.inner
    }

    /// Consume the writer and return the inner stream.
    pub fn into_inner(self) -> T {
        self.inner
    }

    /// Update maximum payload size for subsequent frame encoding.
    pub fn set_max_payload_size(&mut self, max_payload_size: usize) {
        self.config.max_payload_size = max_payload_size;
    }

    /// Current frame writer configuration.
    pub fn config(&self) -> &FrameConfig {
        &self.config
    }
}

impl FrameWriter<BridgeStream> {
    /// Create a frame writer for `BridgeStream` and apply write timeout from config.
    pub fn with_config_stream(inner: BridgeStream, config: FrameConfig) -> Result<Self> {
        inner
            .set_write_timeout(config.write_timeout)
            .map_err(transport_to_frame_error)?;
        Ok(Self::with_config(inner, config))
    }
}

fn write_fully<T: Write>(inner: &mut T, buf: &[u8]) -> Result<()> {
    let mut offset = 0usize;
    while offset < buf.len() {
        match inner.write(&buf[offset..]) {
            Ok(0) => {
                return Err(FrameError::Io(std::io::Error::from(ErrorKind::WriteZero)));
            }
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            // A write timeout surfaces as WouldBlock (or TimedOut) and must fail the frame.
            Err(err) => return Err(FrameError::Io(err)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;
    use crate::codec::decode_frame;

    #[test]
    fn write_single_frame() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(br#"["SHOUT","A","B",{"x":1}]"#).unwrap();

        let wire = writer.into_inner().into_inner();
        assert_eq!(wire, b"25\n[\"SHOUT\",\"A\",\"B\",{\"x\":1}]");
    }

    #[test]
    fn write_multiple_frames() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"[1]").unwrap();
        writer.send(b"[22]").unwrap();
        writer.send(b"[333]").unwrap();

        let inner = writer.into_inner();
        let mut wire = BytesMut::from(inner.into_inner().as_slice());

        let f1 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f2 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        let f3 = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();

        assert_eq!(f1.payload.as_ref(), b"[1]");
        assert_eq!(f2.payload.as_ref(), b"[22]");
        assert_eq!(f3.payload.as_ref(), b"[333]");
        assert!(wire.is_empty());
    }

    #[test]
    fn header_and_payload_are_separate_writes() {
        let mut writer = FrameWriter::new(RecordingWriter::default());
        writer.send(b"[\"JOIN\",\"Agent7\"]").unwrap();

        let writes = writer.into_inner().writes;
        assert_eq!(writes.len(), 2);
        assert_eq!(writes[0], b"17\n");
        assert_eq!(writes[1], b"[\"JOIN\",\"Agent7\"]");
    }

    #[test]
    fn short_writes_are_resumed() {
        let mut writer = FrameWriter::new(TrickleWriter {
            max_per_call: 3,
            data: Vec::new(),
        });
        let payload = br#"["SHOUT","A","B",{"x":1}]"#;
        writer.send(payload).unwrap();

        let data = writer.into_inner().data;
        let mut wire = BytesMut::from(data.as_slice());
        let frame = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();
        assert_eq!(frame.payload.as_ref(), payload);
    }

    #[test]
    fn payload_too_large_rejected() {
        let cfg = FrameConfig {
            max_payload_size: 4,
            ..FrameConfig::default()
        };
        let mut writer = FrameWriter::with_config(Cursor::new(Vec::<u8>::new()), cfg);

        let err = writer.send(b"oversized").unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { .. }));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn empty_payload_rejected_without_writing() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let err = writer.send(b"").unwrap_err();
        assert!(matches!(err, FrameError::EmptyPayload));
        assert!(writer.into_inner().into_inner().is_empty());
    }

    #[test]
    fn each_frame_is_flushed_once() {
        let mut writer = FrameWriter::new(RecordingWriter::default());

        writer.send(b"[0]").unwrap();
        writer.send(b"[1]").unwrap();

        assert_eq!(writer.get_ref().flushes, 2);
    }

    #[test]
    fn write_frame_method() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));
        let frame = Frame::new("[\"abc\"]");

        writer.write_frame(&frame).unwrap();

        let inner = writer.into_inner();
        let mut wire = BytesMut::from(inner.into_inner().as_slice());
        let decoded = decode_frame(&mut wire, usize::MAX).unwrap().unwrap();

        assert_eq!(decoded, frame);
    }

    #[test]
    fn accessors_and_into_inner() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        let _ = writer.get_ref();
        let _ = writer.get_mut();
        assert_eq!(writer.config().max_payload_size, crate::DEFAULT_MAX_PAYLOAD);
        writer.set_max_payload_size(8);
        assert_eq!(writer.config().max_payload_size, 8);
        let _inner = writer.into_inner();
    }

    #[test]
    fn interrupted_write_and_flush_are_retried() {
        let mut writer = FrameWriter::new(HiccupWriter::new(ErrorKind::Interrupted));
        writer.send(b"retry").unwrap();

        let inner = writer.into_inner();
        assert_eq!(inner.data, b"5\nretry");
        assert!(inner.write_hiccuped && inner.flush_hiccuped);
    }

    #[test]
    fn expired_write_timeout_is_reported() {
        for kind in [ErrorKind::WouldBlock, ErrorKind::TimedOut] {
            let mut writer = FrameWriter::new(HiccupWriter::new(kind));
            let err = writer.send(b"[1]").unwrap_err();
            assert!(matches!(err, FrameError::Io(ref e) if e.kind() == kind), "{kind:?}");
            assert!(writer.get_ref().data.is_empty());
        }
    }

    #[test]
    fn expired_flush_timeout_is_reported() {
        let mut writer = FrameWriter::new(FlushTimeoutWriter);
        let err = writer.send(b"[1]").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WouldBlock));
    }

    #[test]
    fn stalled_peer_fails_write_after_timeout() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        // Accepted but never read, so the socket buffers fill up.
        let _server = listener.accept().unwrap();

        let cfg = FrameConfig {
            max_payload_size: usize::MAX,
            write_timeout: Some(std::time::Duration::from_millis(200)),
            ..FrameConfig::default()
        };
        let mut writer =
            FrameWriter::with_config_stream(BridgeStream::from_tcp(client), cfg).unwrap();

        let payload = vec![b'x'; 64 * 1024 * 1024];
        let start = std::time::Instant::now();
        let err = writer.send(&payload).unwrap_err();
        assert!(matches!(
            err,
            FrameError::Io(ref e) if matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut)
        ));
        assert!(start.elapsed() < std::time::Duration::from_secs(10));
    }

    #[test]
    fn hard_write_error_is_reported() {
        let mut writer = FrameWriter::new(HiccupWriter::new(ErrorKind::BrokenPipe));
        let err = writer.send(b"[1]").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::BrokenPipe));
    }

    #[test]
    fn write_zero_is_an_io_error() {
        let mut writer = FrameWriter::new(ZeroWriter);
        let err = writer.send(b"x").unwrap_err();
        assert!(matches!(err, FrameError::Io(e) if e.kind() == ErrorKind::WriteZero));
    }

    #[test]
    fn applies_write_timeout_for_bridge_stream() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let client = std::net::TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let _server = listener.accept().unwrap();

        let cfg = FrameConfig {
            write_timeout: Some(std::time::Duration::from_millis(10)),
            ..FrameConfig::default()
        };

        let writer = FrameWriter::with_config_stream(BridgeStream::from_tcp(client), cfg);
        assert!(writer.is_ok());
    }

    /// Keeps every `write` call separate.
    #[derive(Default)]
    struct RecordingWriter {
        writes: Vec<Vec<u8>>,
        flushes: usize,
    }

    impl Write for RecordingWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.writes.push(buf.to_vec());
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            self.flushes += 1;
            Ok(())
        }
    }

    struct TrickleWriter {
        max_per_call: usize,
        data: Vec<u8>,
    }

    impl Write for TrickleWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let n = buf.len().min(self.max_per_call);
            self.data.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    /// Fails the first write and the first flush with `hiccup`.
    struct HiccupWriter {
        hiccup: ErrorKind,
        write_hiccuped: bool,
        flush_hiccuped: bool,
        data: Vec<u8>,
    }

    impl HiccupWriter {
        fn new(hiccup: ErrorKind) -> Self {
            Self {
                hiccup,
                write_hiccuped: false,
                flush_hiccuped: false,
                data: Vec::new(),
            }
        }
    }

    impl Write for HiccupWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if !self.write_hiccuped {
                self.write_hiccuped = true;
                return Err(std::io::Error::from(self.hiccup));
            }
            self.data.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            if !self.flush_hiccuped {
                self.flush_hiccuped = true;
                return Err(std::io::Error::from(self.hiccup));
            }
            Ok(())
        }
    }

    struct FlushTimeoutWriter;

    impl Write for FlushTimeoutWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Err(std::io::Error::from(ErrorKind::WouldBlock))
        }
    }

    struct ZeroWriter;

    impl Write for ZeroWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Ok(0)
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn written_bytes_decode() {
        let mut writer = FrameWriter::new(Cursor::new(Vec::<u8>::new()));

        writer.send(b"[\"z\"]").unwrap();

        let mut wire = writer.into_inner().into_inner();
        let mut framed = crate::reader::FrameReader::new(Cursor::new(std::mem::take(&mut wire)));
        let frame = framed.read_frame().unwrap();
        assert_eq!(frame.payload.as_ref(), b"[\"z\"]");
    }
}
