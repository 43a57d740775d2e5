/// Errors that can occur in TCP transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The target could not be resolved to any socket address.
    #[error("failed to resolve {target}: {source}")]
    Resolve {
        target: String,
        source: std::io::Error,
    },

    /// Every resolved candidate address refused or failed the connect.
    #[error("failed to connect to {target} ({attempts} candidate(s) tried): {source}")]
    Connect {
        target: String,
        attempts: usize,
        source: std::io::Error,
    },

    /// Failed to bind a listening socket.
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        source: std::io::Error,
    },

    /// Failed to accept an incoming connection.
    #[error("failed to accept connection: {0}")]
    Accept(std::io::Error),

    /// The readiness mechanism itself reported an error.
    #[error("readiness check failed: {0}")]
    Poll(std::io::Error),

    /// Shutting down the send direction failed.
    #[error("shutdown failed: {0}")]
    Shutdown(std::io::Error),

    /// An I/O error occurred on the transport stream.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
