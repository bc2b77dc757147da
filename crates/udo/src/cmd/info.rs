use std::time::Instant;

use serde::Serialize;
use udo_session::DEVICE_MAGIC;
use udo_transport::Protocol;

use crate::cmd::{open_session, InfoArgs, LinkArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::OutputFormat;

#[derive(Serialize)]
struct InfoOutput {
    target: String,
    protocol: &'static str,
    magic: String,
    max_payload_size: usize,
    handshake_ms: f64,
    connected: bool,
}

pub fn run(args: InfoArgs, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    let start = Instant::now();
    let mut session = open_session(&args.target, link)?;
    let handshake_ms = (start.elapsed().as_secs_f64() * 1000.0 * 100.0).round() / 100.0;

    let out = InfoOutput {
        target: args.target,
        protocol: protocol_name(session.protocol()),
        magic: format!("{DEVICE_MAGIC:08X}"),
        max_payload_size: session.max_payload_size(),
        handshake_ms,
        connected: session.is_open(),
    };
    session.close();

    print_info(&out, format);
    Ok(SUCCESS)
}

fn protocol_name(protocol: Protocol) -> &'static str {
    match protocol {
        Protocol::None => "none",
        Protocol::Serial => "serial",
        Protocol::Ip => "ip",
    }
}

fn print_info(out: &InfoOutput, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string(out).unwrap_or_else(|_| "{}".to_string())
            );
        }
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Device Info:");
            println!("  Target:           {}", out.target);
            println!("  Protocol:         {}", out.protocol);
            println!("  Device ID:        {}", out.magic);
            println!("  Max payload:      {} bytes", out.max_payload_size);
            println!("  Handshake:        {:.2}ms", out.handshake_ms);
        }
        OutputFormat::Raw => {
            println!("{}", out.max_payload_size);
        }
    }
}
