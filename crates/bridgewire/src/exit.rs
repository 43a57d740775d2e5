use std::fmt;
use std::io;

use bridgewire_client::{ClientError, ErrorKind};
use bridgewire_transport::TransportError;

// Exit codes follow the sysexits / coreutils conventions.
pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

pub fn io_error(context: &str, err: io::Error) -> CliError {
    let code = match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::AddrInUse | io::ErrorKind::AddrNotAvailable => TRANSPORT_ERROR,
        _ => INTERNAL,
    };
    CliError::new(code, format!("{context}: {err}"))
}

pub fn transport_error(context: &str, err: TransportError) -> CliError {
    match err {
        TransportError::Bind { source, .. } | TransportError::Io(source) => {
            io_error(context, source)
        }
        other => CliError::new(TRANSPORT_ERROR, format!("{context}: {other}")),
    }
}

pub fn client_error(context: &str, err: ClientError) -> CliError {
    let code = match err.kind() {
        ErrorKind::ResolutionFailure | ErrorKind::ConnectFailure => TRANSPORT_ERROR,
        ErrorKind::TransportWriteFailure
        | ErrorKind::TransportReadFailure
        | ErrorKind::ReadinessCheckFailure
        | ErrorKind::ShutdownFailure => TRANSPORT_ERROR,
        ErrorKind::PeerClosed | ErrorKind::ConnectionClosed => FAILURE,
        ErrorKind::ProtocolViolation | ErrorKind::DecodeFailure => DATA_INVALID,
        ErrorKind::EncodeFailure => USAGE,
    };
    CliError::new(code, format!("{context}: {err} [{}]", err.kind()))
}

#[cfg(test)]
mod tests {
    use bridgewire_frame::FrameError;

    use super::*;

    #[test]
    fn peer_closed_is_plain_failure() {
        let err = client_error("receive failed", ClientError::PeerClosed { buffered: 0 });
        assert_eq!(err.code, FAILURE);
        assert!(err.message.contains("peer-closed"));
    }

    #[test]
    fn malformed_traffic_is_data_invalid() {
        let err = client_error(
            "receive failed",
            ClientError::Protocol(FrameError::EmptyPayload),
        );
        assert_eq!(err.code, DATA_INVALID);
    }

    #[test]
    fn connect_failures_are_transport_errors() {
        let err = client_error(
            "connect failed",
            ClientError::Connect(TransportError::Io(io::Error::from(
                io::ErrorKind::ConnectionRefused,
            ))),
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }

    #[test]
    fn bind_conflict_maps_through_io_kind() {
        let err = transport_error(
            "bind failed",
            TransportError::Bind {
                addr: "127.0.0.1:1".to_string(),
                source: io::Error::from(io::ErrorKind::AddrInUse),
            },
        );
        assert_eq!(err.code, TRANSPORT_ERROR);
    }
}
