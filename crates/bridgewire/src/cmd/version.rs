use bridgewire_client::{DEBUG_PORT, PRODUCTION_PORT};
use bridgewire_frame::{DEFAULT_MAX_PAYLOAD, MAX_LENGTH_DIGITS};
use bridgewire_transport::TcpTransport;

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("bridgewire {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: bridgewire");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("BRIDGEWIRE_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("transport: {}", TcpTransport::transport_name());
    println!("ports: debug={DEBUG_PORT}, production={PRODUCTION_PORT}");
    println!("max_payload: {DEFAULT_MAX_PAYLOAD}");
    println!("max_length_digits: {MAX_LENGTH_DIGITS}");
    println!("features: async={}, cli=true", cfg!(feature = "async"));

    Ok(SUCCESS)
}
