use std::fmt;

use bridgewire_frame::FrameError;
use bridgewire_transport::TransportError;

/// Failure category of a [`ClientError`].
///
/// Callers branch on the kind to decide between reconnecting, skipping the
/// message, or aborting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No address could be resolved for the bridge.
    ResolutionFailure,
    /// Every candidate address refused or failed the connect.
    ConnectFailure,
    /// Writing to the stream failed.
    TransportWriteFailure,
    /// Reading from the stream failed.
    TransportReadFailure,
    /// The peer closed the stream (orderly or abrupt) mid-frame.
    PeerClosed,
    /// The peer sent a malformed length field.
    ProtocolViolation,
    /// A payload was not valid JSON.
    DecodeFailure,
    /// The readiness wait itself failed.
    ReadinessCheckFailure,
    /// Shutting down the send direction failed.
    ShutdownFailure,
    /// A value handed to the client could not be serialized or framed.
    EncodeFailure,
    /// The connection was already closed.
    ConnectionClosed,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::ResolutionFailure => "resolution-failure",
            ErrorKind::ConnectFailure => "connect-failure",
            ErrorKind::TransportWriteFailure => "transport-write-failure",
            ErrorKind::TransportReadFailure => "transport-read-failure",
            ErrorKind::PeerClosed => "peer-closed",
            ErrorKind::ProtocolViolation => "protocol-violation",
            ErrorKind::DecodeFailure => "decode-failure",
            ErrorKind::ReadinessCheckFailure => "readiness-check-failure",
            ErrorKind::ShutdownFailure => "shutdown-failure",
            ErrorKind::EncodeFailure => "encode-failure",
            ErrorKind::ConnectionClosed => "connection-closed",
        };
        f.write_str(name)
    }
}

/// Errors that can occur in client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Address resolution failed.
    #[error(transparent)]
    Resolution(TransportError),

    /// Connecting to every candidate address failed.
    #[error(transparent)]
    Connect(TransportError),

    /// Writing a frame failed at the transport level.
    #[error("write failed: {0}")]
    Write(#[source] std::io::Error),

    /// Reading a frame failed at the transport level.
    #[error("read failed: {0}")]
    Read(#[source] std::io::Error),

    /// The bridge closed the stream before a complete frame arrived.
    #[error("bridge closed the connection ({buffered} byte(s) of an incomplete frame pending)")]
    PeerClosed { buffered: usize },

    /// The bridge violated the framing protocol.
    #[error("protocol violation: {0}")]
    Protocol(#[source] FrameError),

    /// A received payload was not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    Decode(#[source] serde_json::Error),

    /// The readiness wait failed.
    #[error(transparent)]
    Readiness(TransportError),

    /// Half-closing the connection failed.
    #[error(transparent)]
    Shutdown(TransportError),

    /// An outgoing value could not be serialized.
    #[error("cannot encode message: {0}")]
    Encode(#[source] serde_json::Error),

    /// An outgoing payload cannot be framed (empty or over the size limit).
    #[error("cannot frame message: {0}")]
    Unframeable(#[source] FrameError),

    /// The connection is closed; no further operations are possible.
    #[error("connection is closed")]
    Closed,
}

impl ClientError {
    /// The taxonomy kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ClientError::Resolution(_) => ErrorKind::ResolutionFailure,
            ClientError::Connect(_) => ErrorKind::ConnectFailure,
            ClientError::Write(_) => ErrorKind::TransportWriteFailure,
            ClientError::Read(_) => ErrorKind::TransportReadFailure,
            ClientError::PeerClosed { .. } => ErrorKind::PeerClosed,
            ClientError::Protocol(_) => ErrorKind::ProtocolViolation,
            ClientError::Decode(_) => ErrorKind::DecodeFailure,
            ClientError::Readiness(_) => ErrorKind::ReadinessCheckFailure,
            ClientError::Shutdown(_) => ErrorKind::ShutdownFailure,
            ClientError::Encode(_) | ClientError::Unframeable(_) => ErrorKind::EncodeFailure,
            ClientError::Closed => ErrorKind::ConnectionClosed,
        }
    }

    /// Whether this error leaves the connection unusable.
    ///
    /// Decode and encode failures are confined to a single message: the frame
    /// boundary is intact and the stream is positioned at the next frame.
    pub fn closes_connection(&self) -> bool {
        !matches!(
            self.kind(),
            ErrorKind::DecodeFailure | ErrorKind::EncodeFailure | ErrorKind::ConnectionClosed
        )
    }

    /// Classify a frame error raised while receiving.
    pub(crate) fn from_read(err: FrameError) -> Self {
        match err {
            FrameError::Io(io) => ClientError::Read(io),
            FrameError::ConnectionClosed { buffered } => ClientError::PeerClosed { buffered },
            other => ClientError::Protocol(other),
        }
    }

    /// Classify a frame error raised while sending.
    pub(crate) fn from_write(err: FrameError) -> Self {
        match err {
            FrameError::Io(io) => ClientError::Write(io),
            FrameError::ConnectionClosed { .. } => {
                ClientError::Write(std::io::Error::from(std::io::ErrorKind::BrokenPipe))
            }
            other => ClientError::Unframeable(other),
        }
    }

    /// Classify a transport error raised while establishing the connection.
    pub(crate) fn from_connect(err: TransportError) -> Self {
        match err {
            TransportError::Resolve { .. } => ClientError::Resolution(err),
            other => ClientError::Connect(other),
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
