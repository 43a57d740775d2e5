use std::io::{IsTerminal, Write};
use std::time::{SystemTime, UNIX_EPOCH};

use bridgewire_client::BridgeMessage;
use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;
use serde_json::Value;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
    Raw,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct MessageOutput<'a> {
    identity: &'a str,
    verb: Option<&'a str>,
    from: Option<&'a str>,
    to: Option<&'a str>,
    addressed_to_me: bool,
    message: &'a Value,
    timestamp: String,
}

/// Print one received message as seen by `identity`.
pub fn print_message(message: &Value, identity: &str, format: OutputFormat) {
    let parsed = BridgeMessage::from_value(message.clone());
    let (from, to) = endpoints(&parsed);

    match format {
        OutputFormat::Json => {
            let out = MessageOutput {
                identity,
                verb: parsed.verb(),
                from,
                to,
                addressed_to_me: parsed.is_addressed_to(identity),
                message,
                timestamp: now_unix_seconds(),
            };
            println!(
                "{}",
                serde_json::to_string(&out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["VERB", "FROM", "TO", "PAYLOAD"])
                .add_row(vec![
                    parsed.verb().unwrap_or("-").to_string(),
                    from.unwrap_or("-").to_string(),
                    to.unwrap_or("-").to_string(),
                    payload_preview(&parsed),
                ]);
            println!("{table}");
        }
        OutputFormat::Pretty => match parsed.verb() {
            Some(verb) => println!(
                "{verb} from={} to={} payload={}",
                from.unwrap_or("-"),
                to.unwrap_or("-"),
                payload_preview(&parsed)
            ),
            None => println!("{message}"),
        },
        OutputFormat::Raw => {
            let mut line = message.to_string().into_bytes();
            line.push(b'\n');
            print_raw(&line);
        }
    }
}

pub fn print_raw(data: &[u8]) {
    let mut out = std::io::stdout();
    let _ = out.write_all(data);
    let _ = out.flush();
}

fn endpoints(message: &BridgeMessage) -> (Option<&str>, Option<&str>) {
    match message {
        BridgeMessage::Join { identity } | BridgeMessage::Leave { identity } => {
            (Some(identity.as_str()), None)
        }
        BridgeMessage::Shout { from, to, .. } => (Some(from.as_str()), Some(to.as_str())),
        BridgeMessage::Other(_) => (None, None),
    }
}

fn payload_preview(message: &BridgeMessage) -> String {
    match message {
        BridgeMessage::Shout {
            payload: Value::String(text),
            ..
        } => text.clone(),
        BridgeMessage::Shout { payload, .. } => payload.to_string(),
        BridgeMessage::Join { .. } | BridgeMessage::Leave { .. } => String::new(),
        BridgeMessage::Other(value) => value.to_string(),
    }
}

fn now_unix_seconds() -> String {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs().to_string())
        .unwrap_or_else(|_| "0".to_string())
}
