use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::time::Duration;

use crate::error::{Result, TransportError};

/// A connected, full-duplex TCP stream to the bridge. Implements Read + Write.
///
/// This is the fundamental I/O type returned by transport operations. On top
/// of plain byte I/O it offers a readiness wait that does not consume data and
/// a half-close of the send direction.
pub struct BridgeStream {
    inner: TcpStream,
}

impl Read for BridgeStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.inner.read(buf)
    }
}

impl Write for BridgeStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

impl BridgeStream {
    /// Wrap an already connected TCP stream.
    pub fn from_tcp(inner: TcpStream) -> Self {
        Self { inner }
    }

    /// Wait until at least one byte can be read without blocking.
    ///
    /// `None` waits forever, `Some(Duration::ZERO)` checks and returns at
    /// once. A close or reset by the peer counts as readable because the next
    /// read returns immediately with end-of-stream or the socket error. Only a
    /// failure of the readiness mechanism itself is an error.
    pub fn wait_readable(&self, timeout: Option<Duration>) -> Result<bool> {
        poll_readable(&self.inner, timeout)
    }

    /// Signal end-of-output to the peer. Incoming data can still be read.
    pub fn shutdown_write(&self) -> Result<()> {
        self.inner
            .shutdown(Shutdown::Write)
            .map_err(TransportError::Shutdown)
    }

    /// Close both directions.
    pub fn shutdown_both(&self) -> Result<()> {
        self.inner
            .shutdown(Shutdown::Both)
            .map_err(TransportError::Shutdown)
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_read_timeout(timeout).map_err(Into::into)
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        self.inner.set_write_timeout(timeout).map_err(Into::into)
    }

    /// Disable Nagle's algorithm so small frames go out immediately.
    pub fn set_nodelay(&self, nodelay: bool) -> Result<()> {
        self.inner.set_nodelay(nodelay).map_err(Into::into)
    }

    /// Whether Nagle's algorithm is disabled.
    pub fn nodelay(&self) -> Result<bool> {
        self.inner.nodelay().map_err(Into::into)
    }

    /// Try to clone this stream (creates a new socket handle).
    pub fn try_clone(&self) -> Result<Self> {
        let cloned = self.inner.try_clone()?;
        Ok(Self::from_tcp(cloned))
    }

    /// Address of the remote end.
    pub fn peer_addr(&self) -> Result<SocketAddr> {
        self.inner.peer_addr().map_err(Into::into)
    }

    /// Address of the local end.
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.inner.local_addr().map_err(Into::into)
    }
}

impl std::fmt::Debug for BridgeStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut dbg = f.debug_struct("BridgeStream");
        if let Ok(addr) = self.inner.peer_addr() {
            dbg.field("peer", &addr);
        }
        dbg.finish()
    }
}

#[cfg(unix)]
fn poll_readable(stream: &TcpStream, timeout: Option<Duration>) -> Result<bool> {
    use std::os::fd::AsRawFd;
    use std::time::Instant;

    let deadline = timeout.map(|t| Instant::now() + t);
    loop {
        let timeout_ms = match deadline {
            None => -1,
            Some(deadline) => millis_rounded_up(deadline.saturating_duration_since(Instant::now())),
        };

        let mut pfd = libc::pollfd {
            fd: stream.as_raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };

        // SAFETY: `pfd` is a valid, writable pollfd and the count is 1. The fd
        // belongs to `stream`, which is borrowed for the duration of the call.
        let rc = unsafe { libc::poll(&mut pfd, 1, timeout_ms) };

        if rc < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                continue;
            }
            return Err(TransportError::Poll(err));
        }
        if rc == 0 {
            return Ok(false);
        }
        if pfd.revents & libc::POLLNVAL != 0 {
            return Err(TransportError::Poll(io::Error::new(
                io::ErrorKind::InvalidInput,
                "socket descriptor is not open",
            )));
        }
        // A pending socket error (e.g. a reset) is left for the next read to report.
        if pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0 {
            return Ok(true);
        }
        return Err(TransportError::Poll(io::Error::other(format!(
            "unexpected poll events {:#x}",
            pfd.revents
        ))));
    }
}

#[cfg(unix)]
fn millis_rounded_up(remaining: Duration) -> libc::c_int {
    let millis = remaining.as_millis() + u128::from(remaining.subsec_nanos() % 1_000_000 != 0);
    millis.min(libc::c_int::MAX as u128) as libc::c_int
}

#[cfg(not(unix))]
fn poll_readable(stream: &TcpStream, timeout: Option<Duration>) -> Result<bool> {
    let mut probe = [0u8; 1];
    let outcome = match timeout {
        Some(t) if t.is_zero() => {
            stream.set_nonblocking(true)?;
            let outcome = stream.peek(&mut probe);
            stream.set_nonblocking(false)?;
            outcome
        }
        other => {
            let previous = stream.read_timeout()?;
            stream.set_read_timeout(other)?;
            let outcome = stream.peek(&mut probe);
            stream.set_read_timeout(previous)?;
            outcome
        }
    };

    match outcome {
        Ok(_) => Ok(true),
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
            ) =>
        {
            Ok(false)
        }
        Err(err)
            if matches!(
                err.kind(),
                io::ErrorKind::ConnectionReset | io::ErrorKind::ConnectionAborted
            ) =>
        {
            Ok(true)
        }
        Err(err) => Err(TransportError::Poll(err)),
    }
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;
    use std::time::Instant;

    use super::*;

    fn loopback_pair() -> (BridgeStream, BridgeStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        (BridgeStream::from_tcp(client), BridgeStream::from_tcp(server))
    }

    #[test]
    fn zero_timeout_reports_not_ready_immediately() {
        let (client, _server) = loopback_pair();

        let start = Instant::now();
        assert!(!client.wait_readable(Some(Duration::ZERO)).unwrap());
        assert!(start.elapsed() < Duration::from_millis(200));
    }

    #[test]
    fn bounded_timeout_waits_before_reporting_not_ready() {
        let (client, _server) = loopback_pair();

        let start = Instant::now();
        assert!(!client.wait_readable(Some(Duration::from_millis(150))).unwrap());
        assert!(start.elapsed() >= Duration::from_millis(140));
    }

    #[test]
    fn pending_bytes_report_ready_without_consuming() {
        let (mut client, mut server) = loopback_pair();
        server.write_all(b"x").unwrap();

        assert!(client.wait_readable(Some(Duration::from_secs(5))).unwrap());
        assert!(client.wait_readable(Some(Duration::ZERO)).unwrap());

        let mut buf = [0u8; 1];
        client.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"x");
    }

    #[test]
    fn unbounded_wait_returns_when_data_arrives() {
        let (client, mut server) = loopback_pair();
        let writer = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            server.write_all(b"late").unwrap();
            server
        });

        assert!(client.wait_readable(None).unwrap());
        let _server = writer.join().unwrap();
    }

    #[test]
    fn peer_close_counts_as_readable() {
        let (mut client, server) = loopback_pair();
        server.shutdown_write().unwrap();

        assert!(client.wait_readable(Some(Duration::from_secs(5))).unwrap());
        let mut buf = [0u8; 4];
        assert_eq!(client.read(&mut buf).unwrap(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn peer_reset_counts_as_readable_and_read_reports_it() {
        use std::os::fd::AsRawFd;

        let (mut client, server) = loopback_pair();
        let linger = libc::linger {
            l_onoff: 1,
            l_linger: 0,
        };
        // SAFETY: `linger` outlives the call and the length matches its type.
        let rc = unsafe {
            libc::setsockopt(
                server.inner.as_raw_fd(),
                libc::SOL_SOCKET,
                libc::SO_LINGER,
                (&linger as *const libc::linger).cast(),
                std::mem::size_of::<libc::linger>() as libc::socklen_t,
            )
        };
        assert_eq!(rc, 0);
        drop(server);

        assert!(client.wait_readable(Some(Duration::from_secs(5))).unwrap());
        let mut buf = [0u8; 4];
        let err = client.read(&mut buf).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionReset);
    }

    #[test]
    fn shutdown_write_still_allows_reading() {
        let (mut client, mut server) = loopback_pair();
        client.shutdown_write().unwrap();

        let mut buf = Vec::new();
        server.read_to_end(&mut buf).unwrap();
        assert!(buf.is_empty());

        server.write_all(b"after").unwrap();
        let mut reply = [0u8; 5];
        client.read_exact(&mut reply).unwrap();
        assert_eq!(&reply, b"after");
    }

    #[test]
    fn clone_shares_connection() {
        let (client, mut server) = loopback_pair();
        let mut clone = client.try_clone().unwrap();
        clone.write_all(b"dup").unwrap();

        let mut buf = [0u8; 3];
        server.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"dup");
        assert_eq!(client.peer_addr().unwrap(), server.local_addr().unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn millis_round_up_sub_millisecond_remainders() {
        assert_eq!(millis_rounded_up(Duration::ZERO), 0);
        assert_eq!(millis_rounded_up(Duration::from_micros(1)), 1);
        assert_eq!(millis_rounded_up(Duration::from_micros(1500)), 2);
        assert_eq!(millis_rounded_up(Duration::from_secs(2)), 2000);
        assert_eq!(
            millis_rounded_up(Duration::from_secs(u64::MAX)),
            libc::c_int::MAX
        );
    }
}
