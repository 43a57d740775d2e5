use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use bridgewire_client::{BridgeRelay, RelayConfig, RelayExit};

use crate::cmd::{install_ctrlc_handler, parse_duration, RelayArgs};
use crate::exit::{transport_error, CliResult, SUCCESS};

pub fn run(args: RelayArgs) -> CliResult<i32> {
    let idle_timeout = args
        .idle_timeout
        .as_deref()
        .map(parse_duration)
        .transpose()?;

    let relay = BridgeRelay::bind(&args.bind)
        .map_err(|err| transport_error("bind failed", err))?
        .with_config(RelayConfig {
            idle_timeout,
            ..RelayConfig::default()
        });

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone())?;

    let exit = relay
        .run(&running)
        .map_err(|err| transport_error("relay failed", err))?;
    match exit {
        RelayExit::Stopped => tracing::info!("relay stopped"),
        RelayExit::IdleTimeout => tracing::info!("relay stopped after idle timeout"),
    }

    Ok(SUCCESS)
}
