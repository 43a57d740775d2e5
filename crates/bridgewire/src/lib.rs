//! Client endpoint for a length-framed JSON messaging bridge.
//!
//! A client connects to a relay over TCP, announces itself with
//! `["JOIN", identity]`, then exchanges JSON messages framed as
//! `<decimal length>\n<payload>`.
//!
//! # Crate Structure
//!
//! - [`transport`]: TCP resolution, connect fallback, readiness wait, half-close
//! - [`frame`]: decimal length-prefixed framing (plus a tokio codec behind `async`)
//! - [`client`]: connection lifecycle, error taxonomy, message vocabulary, relay (behind `client`)

/// Re-export transport types.
pub mod transport {
    pub use bridgewire_transport::*;
}

/// Re-export frame types.
pub mod frame {
    pub use bridgewire_frame::*;
}

/// Re-export client types (requires `client` feature).
#[cfg(feature = "client")]
pub mod client {
    pub use bridgewire_client::*;
}
