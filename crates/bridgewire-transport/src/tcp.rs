use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::stream::BridgeStream;

/// TCP transport to a bridge relay.
///
/// Resolution may yield several candidate addresses (for example one per
/// address family). Candidates are tried strictly in resolution order and the
/// first successful connect wins; there is no retry or backoff.
pub struct TcpTransport;

impl TcpTransport {
    /// Resolve `host:port` into candidate addresses, in resolution order.
    pub fn resolve(host: &str, port: u16) -> Result<Vec<SocketAddr>> {
        let target = format!("{host}:{port}");
        let candidates: Vec<SocketAddr> = (host, port)
            .to_socket_addrs()
            .map_err(|source| TransportError::Resolve {
                target: target.clone(),
                source,
            })?
            .collect();

        if candidates.is_empty() {
            return Err(TransportError::Resolve {
                target,
                source: io::Error::new(io::ErrorKind::NotFound, "no addresses returned"),
            });
        }

        debug!(%target, count = candidates.len(), "resolved bridge address");
        Ok(candidates)
    }

    /// Connect to a bridge (blocking).
    pub fn connect(host: &str, port: u16) -> Result<BridgeStream> {
        Self::connect_with_timeout(host, port, None)
    }

    /// Connect to a bridge, bounding each candidate attempt by `timeout`.
    pub fn connect_with_timeout(
        host: &str,
        port: u16,
        timeout: Option<Duration>,
    ) -> Result<BridgeStream> {
        let candidates = Self::resolve(host, port)?;
        Self::connect_candidates(&format!("{host}:{port}"), &candidates, timeout)
    }

    /// Try each candidate address in order until one connects.
    pub fn connect_candidates(
        target: &str,
        candidates: &[SocketAddr],
        timeout: Option<Duration>,
    ) -> Result<BridgeStream> {
        let mut last_err = None;

        for addr in candidates {
            let attempt = match timeout {
                Some(timeout) => TcpStream::connect_timeout(addr, timeout),
                None => TcpStream::connect(addr),
            };
            match attempt {
                Ok(stream) => {
                    info!(%target, %addr, "connected to bridge");
                    return Ok(low_latency(BridgeStream::from_tcp(stream)));
                }
                Err(err) => {
                    debug!(%target, %addr, error = %err, "connect attempt failed");
                    last_err = Some(err);
                }
            }
        }

        Err(TransportError::Connect {
            target: target.to_string(),
            attempts: candidates.len(),
            source: last_err.unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::NotFound, "no candidate addresses")
            }),
        })
    }

    /// Bind a listening socket for relay-side use.
    pub fn bind(addr: &str) -> Result<BridgeListener> {
        let listener = TcpListener::bind(addr).map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;
        let local_addr = listener.local_addr().map_err(|source| TransportError::Bind {
            addr: addr.to_string(),
            source,
        })?;

        info!(%local_addr, "listening for bridge clients");
        Ok(BridgeListener {
            listener,
            local_addr,
        })
    }

    /// Transport name for diagnostics.
    pub fn transport_name() -> &'static str {
        "tcp"
    }
}

/// Disable Nagle so the header and payload writes of a frame leave together.
fn low_latency(stream: BridgeStream) -> BridgeStream {
    if let Err(err) = stream.set_nodelay(true) {
        debug!(error = %err, "cannot disable Nagle's algorithm");
    }
    stream
}

/// A bound TCP listener accepting bridge clients.
pub struct BridgeListener {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl BridgeListener {
    /// Accept an incoming connection.
    ///
    /// The accepted stream is always in blocking mode, even when the listener
    /// itself is non-blocking.
    pub fn accept(&self) -> Result<(BridgeStream, SocketAddr)> {
        let (stream, addr) = self.listener.accept().map_err(TransportError::Accept)?;
        stream.set_nonblocking(false).map_err(TransportError::Accept)?;
        debug!(%addr, "accepted connection");
        Ok((low_latency(BridgeStream::from_tcp(stream)), addr))
    }

    /// Toggle non-blocking accept.
    pub fn set_nonblocking(&self, nonblocking: bool) -> Result<()> {
        self.listener
            .set_nonblocking(nonblocking)
            .map_err(Into::into)
    }

    /// The address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}
