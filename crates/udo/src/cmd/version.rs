use udo_frame::{DEFAULT_PORT, MAX_PAYLOAD_LEN};

use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("udo {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: udo");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "build_target: {}",
        option_env!("UDO_BUILD_TARGET").unwrap_or("unknown")
    );
    println!(
        "build_profile: {}",
        option_env!("UDO_BUILD_PROFILE").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!("transports: serial, ip (udp/{DEFAULT_PORT})");
    println!("max_payload: {MAX_PAYLOAD_LEN}");
    println!("features: session={}, cli=true", cfg!(feature = "session"));

    Ok(SUCCESS)
}
