use std::net::SocketAddr;
use std::time::Duration;

use bridgewire_frame::{Frame, FrameConfig, FrameReader, FrameWriter};
use bridgewire_transport::{BridgeStream, NetworkSession};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::ClientConfig;
use crate::error::{ClientError, Result};
use crate::message::join_message;

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Handshake done; all operations available.
    Open,
    /// Closed by the caller or by an error. Every operation fails with
    /// [`ClientError::Closed`].
    Closed,
}

/// A registered client connection to the bridge.
///
/// Owns one TCP stream split into a frame reader and a frame writer. A value
/// of this type only exists after the `JOIN` handshake has been sent.
///
/// Not safe for interleaved use: one caller drives receive and one drives
/// send. Any transport, framing or readiness failure closes the connection;
/// a payload that is not valid JSON only fails that one receive.
pub struct Connection {
    identity: String,
    host: String,
    port: u16,
    peer_addr: Option<SocketAddr>,
    reader: FrameReader<BridgeStream>,
    writer: FrameWriter<BridgeStream>,
    state: ConnectionState,
    session: NetworkSession,
}

impl Connection {
    /// Adopt a connected stream and announce `config.identity` with `JOIN`.
    ///
    /// No reply is awaited. On failure the stream is dropped and nothing is
    /// returned.
    pub fn from_stream(
        session: &NetworkSession,
        stream: BridgeStream,
        config: ClientConfig,
    ) -> Result<Self> {
        let reader_stream = stream.try_clone().map_err(ClientError::Connect)?;
        let peer_addr = stream.peer_addr().ok();

        let frame_config = FrameConfig {
            max_payload_size: config.max_payload_size,
            read_timeout: None,
            write_timeout: config.write_timeout,
        };
        let reader = FrameReader::with_config_stream(reader_stream, frame_config.clone())
            .map_err(ClientError::from_read)?;
        let writer =
            FrameWriter::with_config_stream(stream, frame_config).map_err(ClientError::from_write)?;

        let mut connection = Self {
            identity: config.identity,
            host: config.host,
            port: config.port,
            peer_addr,
            reader,
            writer,
            state: ConnectionState::Open,
            session: session.clone(),
        };

        let join = join_message(&connection.identity);
        connection.send_json(&join)?;
        info!(
            identity = %connection.identity,
            target = %connection.target(),
            "joined bridge"
        );

        Ok(connection)
    }

    /// Check whether the next receive would start without waiting.
    ///
    /// `None` waits until data arrives, `Some(Duration::ZERO)` checks once and
    /// returns. Bytes already buffered from an earlier read count as ready.
    pub fn poll(&mut self, timeout: Option<Duration>) -> Result<bool> {
        self.ensure_open()?;
        if self.reader.has_buffered_data() {
            return Ok(true);
        }
        match self.reader.get_ref().wait_readable(timeout) {
            Ok(ready) => Ok(ready),
            Err(err) => Err(self.fail(ClientError::Readiness(err))),
        }
    }

    /// [`poll`](Self::poll) with a timeout in seconds; negative waits forever.
    pub fn poll_seconds(&mut self, seconds: f64) -> Result<bool> {
        self.poll(timeout_from_seconds(seconds))
    }

    /// Send a pre-encoded message as one frame.
    pub fn send(&mut self, raw: &str) -> Result<()> {
        self.send_bytes(raw.as_bytes())
    }

    /// Send raw payload bytes as one frame.
    pub fn send_bytes(&mut self, payload: &[u8]) -> Result<()> {
        self.ensure_open()?;
        match self.writer.send(payload) {
            Ok(()) => {
                debug!(identity = %self.identity, size = payload.len(), "sent frame");
                Ok(())
            }
            Err(err) => Err(self.fail(ClientError::from_write(err))),
        }
    }

    /// Serialize `document` as compact JSON and send it as one frame.
    pub fn send_json<T: Serialize + ?Sized>(&mut self, document: &T) -> Result<()> {
        self.ensure_open()?;
        let text = serde_json::to_string(document).map_err(ClientError::Encode)?;
        self.send(&text)
    }

    /// Block until the next complete frame arrives and return its payload.
    pub fn receive_frame(&mut self) -> Result<Frame> {
        self.ensure_open()?;
        match self.reader.read_frame() {
            Ok(frame) => {
                debug!(identity = %self.identity, size = frame.payload.len(), "received frame");
                Ok(frame)
            }
            Err(err) => Err(self.fail(ClientError::from_read(err))),
        }
    }

    /// Block until the next message arrives and parse it as JSON.
    pub fn receive(&mut self) -> Result<Value> {
        self.receive_as()
    }

    /// Block until the next message arrives and deserialize it into `T`.
    pub fn receive_as<T: DeserializeOwned>(&mut self) -> Result<T> {
        let frame = self.receive_frame()?;
        serde_json::from_slice(&frame.payload).map_err(|err| {
            warn!(
                identity = %self.identity,
                size = frame.payload.len(),
                error = %err,
                "discarding undecodable message"
            );
            ClientError::Decode(err)
        })
    }

    /// Wait up to `timeout` for a message. `Ok(None)` means nothing arrived.
    pub fn receive_timeout(&mut self, timeout: Duration) -> Result<Option<Value>> {
        if !self.poll(Some(timeout))? {
            return Ok(None);
        }
        self.receive().map(Some)
    }

    /// Half-close: signal end-of-output to the bridge and release the connection.
    ///
    /// Closing an already failed connection is a no-op.
    pub fn close(mut self) -> Result<()> {
        if self.state == ConnectionState::Closed {
            return Ok(());
        }
        self.state = ConnectionState::Closed;
        self.writer
            .get_ref()
            .shutdown_write()
            .map_err(ClientError::Shutdown)?;
        info!(identity = %self.identity, "left bridge");
        Ok(())
    }

    /// Identity announced at connect time.
    pub fn identity(&self) -> &str {
        &self.identity
    }

    /// Bridge host as configured.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Bridge port as configured.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// `host:port` as configured.
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Resolved address actually connected to.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }

    /// The networking session this connection keeps alive.
    pub fn session(&self) -> &NetworkSession {
        &self.session
    }

    fn ensure_open(&self) -> Result<()> {
        match self.state {
            ConnectionState::Open => Ok(()),
            ConnectionState::Closed => Err(ClientError::Closed),
        }
    }

    /// Record `err`; close the connection if the error leaves it unusable.
    fn fail(&mut self, err: ClientError) -> ClientError {
        if err.closes_connection() && self.state == ConnectionState::Open {
            self.state = ConnectionState::Closed;
            warn!(
                identity = %self.identity,
                kind = %err.kind(),
                error = %err,
                "closing bridge connection"
            );
            if let Err(shutdown_err) = self.writer.get_ref().shutdown_both() {
                debug!(error = %shutdown_err, "socket already shut down");
            }
        }
        err
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state == ConnectionState::Open {
            self.state = ConnectionState::Closed;
            if let Err(err) = self.writer.get_ref().shutdown_write() {
                debug!(identity = %self.identity, error = %err, "shutdown on drop failed");
            }
        }
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("identity", &self.identity)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("peer_addr", &self.peer_addr)
            .field("state", &self.state)
            .finish()
    }
}

/// Map a seconds value to a readiness timeout. Negative or NaN means forever.
pub(crate) fn timeout_from_seconds(seconds: f64) -> Option<Duration> {
    if seconds.is_nan() || seconds < 0.0 {
        return None;
    }
    Duration::try_from_secs_f64(seconds).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seconds_map_to_timeouts() {
        assert_eq!(timeout_from_seconds(0.0), Some(Duration::ZERO));
        assert_eq!(timeout_from_seconds(1.5), Some(Duration::from_millis(1500)));
        assert_eq!(timeout_from_seconds(30.0), Some(Duration::from_secs(30)));
    }

    #[test]
    fn negative_and_unbounded_seconds_wait_forever() {
        assert_eq!(timeout_from_seconds(-1.0), None);
        assert_eq!(timeout_from_seconds(f64::NAN), None);
        assert_eq!(timeout_from_seconds(f64::INFINITY), None);
    }
}
