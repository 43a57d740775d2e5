//! Agent that acknowledges every SHOUT addressed to it.
//!
//! Run a local relay first:
//!   cargo run --features cli -- relay
//!
//! Then the agent:
//!   cargo run --example ack-agent -- StarCraft
//!
//! And poke it from another terminal:
//!   cargo run --features cli -- shout --identity Agent7 --to StarCraft hello --wait

use std::time::Duration;

use bridgewire::client::{connect, BridgeMessage, NetworkSession, DEBUG_PORT, DEFAULT_HOST};
use serde_json::json;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let identity = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "StarCraft".to_string());

    let session = NetworkSession::start();
    let mut conn = connect(&session, &identity, DEFAULT_HOST, DEBUG_PORT)?;
    eprintln!("Joined {} as {identity}", conn.target());

    loop {
        eprintln!("waiting for data");
        let Some(value) = conn.receive_timeout(Duration::from_secs(30))? else {
            eprintln!("timed out");
            continue;
        };

        if let BridgeMessage::Shout { from, to, payload } = BridgeMessage::from_value(value) {
            if to != identity {
                continue;
            }
            println!("Got message from {from}: {payload}");
            conn.send_json(&json!(["SHOUT", identity, from, "Ack ack"]))?;
        }
    }
}
