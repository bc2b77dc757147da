//! Connect to a device and dump a few objects.
//!
//! Usage: `cargo run --example device-info -- ip:192.168.1.50`
//!        `cargo run --example device-info -- serial:ttyACM0:115200`

use udo::session::{connect_with_config, SessionConfig, Target};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let target: Target = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ip:127.0.0.1".to_string())
        .parse()?;

    let mut session = connect_with_config(&target, &SessionConfig::default())?;
    println!("connected to {target}");
    println!("max payload: {} bytes", session.max_payload_size());

    for index in [0x0000u16, 0x0001, 0x0002] {
        match session.read_blob(index, 0, 16) {
            Ok(data) => println!("{index:04X}: {:02X?}", data.as_ref()),
            Err(err) => println!("{index:04X}: {err}"),
        }
    }

    session.close();
    Ok(())
}
