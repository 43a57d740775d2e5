/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// A byte other than an ASCII digit appeared before the length delimiter.
    #[error("non-digit byte {byte:#04x} in length field")]
    InvalidLengthByte { byte: u8 },

    /// The length field grew past the accepted digit count.
    #[error("length field longer than {max} digits")]
    LengthFieldTooLong { max: usize },

    /// The length field did not describe a positive payload size.
    #[error("illegal length field {field:?}")]
    InvalidLength { field: String },

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// Frames must carry at least one payload byte.
    #[error("empty payload cannot be framed")]
    EmptyPayload,

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection was closed before a complete frame was received.
    #[error("connection closed (incomplete frame, {buffered} byte(s) pending)")]
    ConnectionClosed { buffered: usize },
}

impl FrameError {
    /// True for violations of the wire format itself (as opposed to I/O).
    pub fn is_protocol_violation(&self) -> bool {
        matches!(
            self,
            FrameError::InvalidLengthByte { .. }
                | FrameError::LengthFieldTooLong { .. }
                | FrameError::InvalidLength { .. }
                | FrameError::PayloadTooLarge { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FrameError>;
