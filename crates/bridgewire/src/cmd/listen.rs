use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bridgewire_client::{connect_with_config, BridgeMessage, ErrorKind, NetworkSession};
use serde_json::Value;

use crate::cmd::{install_ctrlc_handler, parse_duration, ListenArgs};
use crate::exit::{client_error, CliError, CliResult, SUCCESS, TIMEOUT};
use crate::output::{print_message, OutputFormat};

// Upper bound on how long Ctrl-C can go unnoticed.
const POLL_INTERVAL: Duration = Duration::from_millis(200);

pub fn run(args: ListenArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connect.config()?;
    let idle_timeout = args.timeout.as_deref().map(parse_duration).transpose()?;

    let session = NetworkSession::start();
    let mut conn =
        connect_with_config(&session, config).map_err(|err| client_error("connect failed", err))?;
    let identity = conn.identity().to_string();

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let mut printed = 0usize;
    let mut last_message = Instant::now();

    while running.load(Ordering::SeqCst) {
        let ready = conn
            .poll(Some(POLL_INTERVAL))
            .map_err(|err| client_error("poll failed", err))?;
        if !ready {
            if let Some(limit) = idle_timeout {
                if last_message.elapsed() >= limit {
                    return Err(CliError::new(
                        TIMEOUT,
                        format!("no message within {}ms", limit.as_millis()),
                    ));
                }
            }
            continue;
        }

        let message = match conn.receive() {
            Ok(message) => message,
            Err(err) if err.kind() == ErrorKind::DecodeFailure => {
                tracing::warn!(error = %err, "skipping undecodable message");
                continue;
            }
            Err(err) => return Err(client_error("receive failed", err)),
        };
        last_message = Instant::now();

        let parsed = BridgeMessage::from_value(message.clone());
        let mine = parsed.is_addressed_to(&identity);
        if args.mine && !mine {
            continue;
        }

        print_message(&message, &identity, format);

        if let (true, Some(reply), BridgeMessage::Shout { from, .. }) =
            (mine, &args.reply, &parsed)
        {
            let answer = BridgeMessage::shout(
                identity.as_str(),
                from.as_str(),
                Value::String(reply.clone()),
            );
            conn.send_json(&answer)
                .map_err(|err| client_error("reply failed", err))?;
        }

        printed = printed.saturating_add(1);
        if let Some(count) = args.count {
            if printed >= count {
                break;
            }
        }
    }

    conn.close()
        .map_err(|err| client_error("close failed", err))?;
    Ok(SUCCESS)
}
