//! Blocking client endpoint for the bridgewire JSON messaging bridge.
//!
//! This is the "just works" layer. Connect to a bridge, announce an identity,
//! then exchange JSON messages framed as `<decimal length>\n<payload>`.
//!
//! ```no_run
//! use bridgewire_client::{connect, NetworkSession};
//! use serde_json::json;
//!
//! let session = NetworkSession::start();
//! let mut conn = connect(&session, "Agent7", "localhost", 8856)?;
//! conn.send_json(&json!(["SHOUT", "Agent7", "StarCraft", "hello"]))?;
//! if conn.poll(Some(std::time::Duration::from_secs(1)))? {
//!     let reply = conn.receive()?;
//!     println!("{reply}");
//! }
//! conn.close()?;
//! # Ok::<(), bridgewire_client::ClientError>(())
//! ```

pub mod config;
pub mod connection;
pub mod connector;
pub mod error;
pub mod message;
pub mod relay;

pub use bridgewire_transport::NetworkSession;
pub use config::{ClientConfig, DEBUG_PORT, DEFAULT_HOST, PRODUCTION_PORT};
pub use connection::{Connection, ConnectionState};
pub use connector::{connect, connect_with_config};
pub use error::{ClientError, ErrorKind, Result};
pub use message::{join_message, BridgeMessage, VERB_JOIN, VERB_LEAVE, VERB_SHOUT};
pub use relay::{BridgeRelay, RelayConfig, RelayExit, RelayHandle};
