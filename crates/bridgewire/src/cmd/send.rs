use std::fs;
use std::time::{Duration, Instant};

use bridgewire_client::{connect_with_config, ClientError, Connection, ErrorKind, NetworkSession};
use serde_json::Value;

use crate::cmd::{parse_duration, SendArgs};
use crate::exit::{client_error, io_error, CliError, CliResult, SUCCESS, TIMEOUT, USAGE};
use crate::output::{print_message, OutputFormat};

pub fn run(args: SendArgs, format: OutputFormat) -> CliResult<i32> {
    let config = args.connect.config()?;
    let wait_timeout = parse_duration(&args.wait_timeout)?;
    let payload = resolve_payload(&args)?;

    let session = NetworkSession::start();
    let mut conn =
        connect_with_config(&session, config).map_err(|err| client_error("connect failed", err))?;

    conn.send_bytes(&payload)
        .map_err(|err| client_error("send failed", err))?;

    if args.wait {
        let message = wait_for_message(&mut conn, wait_timeout, |_| true)?;
        print_message(&message, conn.identity(), format);
    }

    conn.close()
        .map_err(|err| client_error("close failed", err))?;
    Ok(SUCCESS)
}

fn resolve_payload(args: &SendArgs) -> CliResult<Vec<u8>> {
    let payload = if let Some(json) = &args.json {
        serde_json::from_str::<Value>(json)
            .map_err(|err| CliError::new(USAGE, format!("message is not valid JSON: {err}")))?;
        json.as_bytes().to_vec()
    } else if let Some(data) = &args.data {
        data.as_bytes().to_vec()
    } else if let Some(path) = &args.file {
        fs::read(path)
            .map_err(|err| io_error(&format!("failed reading {}", path.display()), err))?
    } else {
        Vec::new()
    };

    if payload.is_empty() {
        return Err(CliError::new(USAGE, "nothing to send"));
    }
    Ok(payload)
}

/// Anything that yields received messages with a bounded wait.
pub(crate) trait MessageSource {
    fn next_message(&mut self, timeout: Duration) -> Result<Option<Value>, ClientError>;
}

impl MessageSource for Connection {
    fn next_message(&mut self, timeout: Duration) -> Result<Option<Value>, ClientError> {
        self.receive_timeout(timeout)
    }
}

/// Wait up to `timeout` for the first message `accept` takes.
///
/// Messages that are not valid JSON are skipped; the connection stays usable.
pub(crate) fn wait_for_message<S, F>(source: &mut S, timeout: Duration, accept: F) -> CliResult<Value>
where
    S: MessageSource,
    F: Fn(&Value) -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(CliError::new(
                TIMEOUT,
                format!("no message within {}ms", timeout.as_millis()),
            ));
        }

        match source.next_message(remaining) {
            Ok(Some(message)) if accept(&message) => return Ok(message),
            Ok(Some(message)) => {
                tracing::debug!(%message, "skipping message");
            }
            Ok(None) => {}
            Err(err) if err.kind() == ErrorKind::DecodeFailure => {
                tracing::warn!(error = %err, "skipping undecodable message");
            }
            Err(err) => return Err(client_error("receive failed", err)),
        }
    }
}
