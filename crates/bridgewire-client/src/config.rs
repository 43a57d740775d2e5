use std::time::Duration;

use bridgewire_frame::DEFAULT_MAX_PAYLOAD;

/// Bridge port used for debugging deployments.
pub const DEBUG_PORT: u16 = 8856;

/// Bridge port used for production deployments.
pub const PRODUCTION_PORT: u16 = 7417;

/// Host used when none is given.
pub const DEFAULT_HOST: &str = "localhost";

/// Construction-time settings for a [`Connection`](crate::Connection).
///
/// None of these can change once the connection is open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Identity announced to the bridge with `JOIN`.
    pub identity: String,
    /// Bridge host name or address literal.
    pub host: String,
    /// Bridge TCP port.
    pub port: u16,
    /// Upper bound for each candidate connect attempt. `None` uses the OS default.
    pub connect_timeout: Option<Duration>,
    /// Upper bound for a single blocking write. `None` waits forever.
    pub write_timeout: Option<Duration>,
    /// Largest payload accepted in either direction.
    pub max_payload_size: usize,
}

impl ClientConfig {
    /// Settings for `identity` against the default host on the debug port.
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            host: DEFAULT_HOST.to_string(),
            port: DEBUG_PORT,
            connect_timeout: None,
            write_timeout: None,
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }

    /// Point at a specific bridge.
    pub fn with_endpoint(mut self, host: impl Into<String>, port: u16) -> Self {
        self.host = host.into();
        self.port = port;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    pub fn with_max_payload_size(mut self, max_payload_size: usize) -> Self {
        self.max_payload_size = max_payload_size;
        self
    }

    /// `host:port` as used in diagnostics.
    pub fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
