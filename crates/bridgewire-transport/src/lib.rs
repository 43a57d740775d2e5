//! TCP transport for the bridgewire relay client.
//!
//! Provides the socket half of a bridge connection:
//! - host/port resolution and connect-with-fallback across candidates
//! - a connected [`BridgeStream`] with readiness polling and half-close
//! - a [`BridgeListener`] for relay-side accept loops
//! - the [`NetworkSession`] lifecycle object
//!
//! This is the lowest layer of bridgewire. Everything else builds on top of
//! the [`BridgeStream`] type provided here.

pub mod error;
pub mod session;
pub mod stream;
pub mod tcp;

pub use error::{Result, TransportError};
pub use session::NetworkSession;
pub use stream::BridgeStream;
pub use tcp::{BridgeListener, TcpTransport};
