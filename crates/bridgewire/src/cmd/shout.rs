use bridgewire_client::{connect_with_config, BridgeMessage, NetworkSession};
use serde_json::Value;

use crate::cmd::send::wait_for_message;
use crate::cmd::{parse_duration, ShoutArgs};
use crate::exit::{client_error, CliResult, SUCCESS};
use crate::output::{print_message, OutputFormat};

pub fn run(args: ShoutArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connect.config()?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let message = BridgeMessage::shout(
        config.identity.as_str(),
        args.to.as_str(),
        parse_payload(&args.message),
    );

    let session = NetworkSession::start();
    let mut conn =
        connect_with_config(&session, config).map_err(|err| client_error("connect failed", err))?;

    conn.send_json(&message)
        .map_err(|err| client_error("send failed", err))?;

    if args.wait {
        let identity = conn.identity().to_string();
        let reply = wait_for_message(&mut conn, wait_timeout, |value| {
            BridgeMessage::from_value(value.clone()).is_addressed_to(&identity)
        })?;
        print_message(&reply, &identity, format);
    }

    conn.close()
        .map_err(|err| client_error("close failed", err))?;
    Ok(SUCCESS)
}

/// JSON text becomes a JSON value; anything else is sent as a string.
fn parse_payload(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}
