//! Join a bridge from tokio and print every frame received.
//!
//! Run with:
//!   cargo run --example async-listen --features async -- 127.0.0.1:8856 Agent7

use bridgewire::frame::BridgeCodec;
use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_util::codec::{FramedRead, FramedWrite};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let addr = args.next().unwrap_or_else(|| "127.0.0.1:8856".to_string());
    let identity = args.next().unwrap_or_else(|| "Agent7".to_string());

    let stream = TcpStream::connect(&addr).await?;
    let (read_half, write_half) = stream.into_split();
    let mut frames = FramedRead::new(read_half, BridgeCodec::new());
    let mut sink = FramedWrite::new(write_half, BridgeCodec::new());

    let join = serde_json::to_vec(&serde_json::json!(["JOIN", identity]))?;
    sink.send(Bytes::from(join)).await?;
    eprintln!("Joined {addr} as {identity}");

    while let Some(frame) = frames.next().await {
        let frame = frame?;
        match frame.as_str() {
            Some(text) => println!("{text}"),
            None => println!("<binary {} bytes>", frame.payload.len()),
        }
    }

    eprintln!("Bridge closed the connection");
    Ok(())
}
