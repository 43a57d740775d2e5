use bridgewire_transport::{NetworkSession, TcpTransport};

use crate::config::ClientConfig;
use crate::connection::Connection;
use crate::error::{ClientError, Result};

/// Connect to the bridge at `host:port` and register as `identity`.
pub fn connect(
    session: &NetworkSession,
    identity: &str,
    host: &str,
    port: u16,
) -> Result<Connection> {
    connect_with_config(session, ClientConfig::new(identity).with_endpoint(host, port))
}

/// Connect with explicit configuration.
///
/// Resolves the host, tries each candidate address in order, then sends the
/// `JOIN` handshake. Either a registered [`Connection`] is returned or
/// nothing is.
pub fn connect_with_config(session: &NetworkSession, config: ClientConfig) -> Result<Connection> {
    let stream = TcpTransport::connect_with_timeout(&config.host, config.port, config.connect_timeout)
        .map_err(ClientError::from_connect)?;
    Connection::from_stream(session, stream, config)
}
