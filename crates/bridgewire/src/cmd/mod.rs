use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridgewire_client::{ClientConfig, DEBUG_PORT, DEFAULT_HOST, PRODUCTION_PORT};
use clap::{Args, Subcommand};

use crate::exit::{CliError, CliResult, INTERNAL, USAGE};
use crate::output::OutputFormat;

pub mod listen;
pub mod relay;
pub mod send;
pub mod shout;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Send one pre-encoded JSON message.
    Send(SendArgs),
    /// Send a SHOUT to another identity.
    Shout(ShoutArgs),
    /// Join the bridge and print received messages.
    Listen(ListenArgs),
    /// Run a local relay that forwards frames between clients.
    Relay(RelayArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Send(args) => send::run(args, format),
        Command::Shout(args) => shout::run(args, format),
        Command::Listen(args) => listen::run(args, format),
        Command::Relay(args) => relay::run(args),
        Command::Version(args) => version::run(args),
    }
}

/// Where to connect and who to be.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// Identity announced to the bridge.
    #[arg(long, short = 'i', env = "BRIDGE_IDENTITY")]
    pub identity: String,
    /// Bridge host.
    #[arg(long, env = "BRIDGE_HOST", default_value = DEFAULT_HOST)]
    pub host: String,
    /// Bridge port. Default: the debug port (8856).
    #[arg(long, env = "BRIDGE_PORT", conflicts_with = "production")]
    pub port: Option<u16>,
    /// Use the production port (7417).
    #[arg(long)]
    pub production: bool,
    /// Per-address connect timeout (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub connect_timeout: String,
}

impl ConnectArgs {
    pub fn port(&self) -> u16 {
        match (self.port, self.production) {
            (Some(port), _) => port,
            (None, true) => PRODUCTION_PORT,
            (None, false) => DEBUG_PORT,
        }
    }

    pub fn config(&self) -> CliResult<ClientConfig> {
        if self.identity.is_empty() {
            return Err(CliError::new(USAGE, "identity must not be empty"));
        }
        Ok(ClientConfig::new(self.identity.as_str())
            .with_endpoint(self.host.as_str(), self.port())
            .with_connect_timeout(parse_duration(&self.connect_timeout)?))
    }
}

#[derive(Args, Debug)]
pub struct SendArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// JSON message text (validated before sending).
    #[arg(conflicts_with_all = ["data", "file"])]
    pub json: Option<String>,
    /// Payload sent verbatim, without JSON validation.
    #[arg(long, conflicts_with_all = ["json", "file"])]
    pub data: Option<String>,
    /// Read the message from a file.
    #[arg(long, conflicts_with_all = ["json", "data"])]
    pub file: Option<PathBuf>,
    /// Wait for one message and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ShoutArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Recipient identity.
    #[arg(long)]
    pub to: String,
    /// Payload. Sent as JSON when it parses, otherwise as a JSON string.
    pub message: String,
    /// Wait for a message addressed to this identity and print it.
    #[arg(long)]
    pub wait: bool,
    /// Maximum time to wait when --wait is set (e.g. 5s, 500ms).
    #[arg(long, default_value = "5s")]
    pub wait_timeout: String,
}

#[derive(Args, Debug)]
pub struct ListenArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Exit after printing N messages.
    #[arg(long)]
    pub count: Option<usize>,
    /// Exit with status 124 after this long without a message (e.g. 30s).
    #[arg(long)]
    pub timeout: Option<String>,
    /// Print only SHOUTs addressed to this identity.
    #[arg(long)]
    pub mine: bool,
    /// Answer every SHOUT addressed to this identity with this payload.
    #[arg(long, value_name = "TEXT")]
    pub reply: Option<String>,
}

#[derive(Args, Debug)]
pub struct RelayArgs {
    /// Address to bind.
    #[arg(long, default_value_t = format!("127.0.0.1:{DEBUG_PORT}"))]
    pub bind: String,
    /// Stop after this long without client activity (e.g. 10m, 30s).
    #[arg(long)]
    pub idle_timeout: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Parse `500ms`, `5s`, `10m` or a bare number of seconds.
pub fn parse_duration(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::new(USAGE, "duration must not be empty"));
    }

    let (number, scale_ms) = if let Some(num) = input.strip_suffix("ms") {
        (num, 1)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, 1_000)
    } else if let Some(num) = input.strip_suffix('m') {
        (num, 60_000)
    } else {
        (input, 1_000)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::new(USAGE, format!("invalid duration value: {input}")))?;

    if value == 0 {
        return Err(CliError::new(USAGE, "duration must be greater than zero"));
    }

    value
        .checked_mul(scale_ms)
        .map(Duration::from_millis)
        .ok_or_else(|| CliError::new(USAGE, format!("duration out of range: {input}")))
}

/// Clear `running` on Ctrl-C.
pub fn install_ctrlc_handler(running: Arc<AtomicBool>) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
    })
    .map_err(|err| CliError::new(INTERNAL, format!("signal handler setup failed: {err}")))
}
