use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::codec::{decode_frame, encode_frame, Frame, DEFAULT_MAX_PAYLOAD};
use crate::error::FrameError;

/// `tokio_util` codec for the decimal length-prefixed wire format.
///
/// Applies exactly the same length-field rules as the blocking
/// [`FrameReader`](crate::FrameReader).
#[derive(Debug, Clone)]
pub struct BridgeCodec {
    max_payload_size: usize,
}

impl BridgeCodec {
    pub fn new() -> Self {
        Self::with_max_payload(DEFAULT_MAX_PAYLOAD)
    }

    pub fn with_max_payload(max_payload_size: usize) -> Self {
        Self { max_payload_size }
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }
}

impl Default for BridgeCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for BridgeCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        decode_frame(src, self.max_payload_size)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(FrameError::ConnectionClosed {
                buffered: buf.len(),
            }),
        }
    }
}

impl Encoder<Bytes> for BridgeCodec {
    type Error = FrameError;

    fn encode(&mut self, payload: Bytes, dst: &mut BytesMut) -> Result<(), FrameError> {
        if payload.len() > self.max_payload_size {
            return Err(FrameError::PayloadTooLarge {
                size: payload.len(),
                max: self.max_payload_size,
            });
        }
        encode_frame(&payload, dst)
    }
}

impl Encoder<Frame> for BridgeCodec {
    type Error = FrameError;

    fn encode(&mut self, frame: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        Encoder::<Bytes>::encode(self, frame.payload, dst)
    }
}

#[cfg(test)]
mod tests {
    use futures_util::{SinkExt, StreamExt};
    use tokio::io::AsyncWriteExt;
    use tokio_util::codec::{FramedRead, FramedWrite};

    use super::*;

    #[tokio::test]
    async fn framed_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(64);
        let mut sink = FramedWrite::new(client, BridgeCodec::new());
        let mut stream = FramedRead::new(server, BridgeCodec::new());

        sink.send(Bytes::from_static(br#"["JOIN","Agent7"]"#))
            .await
            .unwrap();
        sink.send(Frame::new(Bytes::from_static(br#"["SHOUT","A","B",{"x":1}]"#)))
            .await
            .unwrap();

        let first = stream.next().await.unwrap().unwrap();
        let second = stream.next().await.unwrap().unwrap();
        assert_eq!(first.payload.as_ref(), br#"["JOIN","Agent7"]"#);
        assert_eq!(second.payload.as_ref(), br#"["SHOUT","A","B",{"x":1}]"#);
    }

    #[tokio::test]
    async fn eof_mid_frame_is_connection_closed() {
        let (mut client, server) = tokio::io::duplex(64);
        client.write_all(b"27\n[\"SH").await.unwrap();
        drop(client);

        let mut stream = FramedRead::new(server, BridgeCodec::new());
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(err, FrameError::ConnectionClosed { .. }));
    }

    #[tokio::test]
    async fn clean_eof_ends_stream() {
        let (client, server) = tokio::io::duplex(64);
        drop(client);

        let mut stream = FramedRead::new(server, BridgeCodec::new());
        assert!(stream.next().await.is_none());
    }

    #[test]
    fn encoder_rejects_oversized_payload() {
        let mut codec = BridgeCodec::with_max_payload(2);
        let mut dst = BytesMut::new();
        let err = Encoder::<Bytes>::encode(&mut codec, Bytes::from_static(b"[1,2]"), &mut dst)
            .unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 5, max: 2 }));
    }

    #[test]
    fn decoder_rejects_non_digit_length() {
        let mut codec = BridgeCodec::default();
        let mut src = BytesMut::from(&b"x\n"[..]);
        assert!(matches!(
            codec.decode(&mut src),
            Err(FrameError::InvalidLengthByte { byte: b'x' })
        ));
    }
}
