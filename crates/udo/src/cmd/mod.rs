use std::time::Duration;

use clap::{Args, Subcommand, ValueEnum};
use udo_session::{connect_with_config, Session, SessionConfig, Target};
use udo_transport::DEFAULT_MAX_TRIES;

use crate::exit::{udo_error, CliError, CliResult};
use crate::output::OutputFormat;

pub mod info;
pub mod read;
pub mod version;
pub mod write;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Handshake with a device and print what it reports.
    Info(InfoArgs),
    /// Read an object value.
    Read(ReadArgs),
    /// Write an object value.
    Write(WriteArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, link: &LinkArgs, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Info(args) => info::run(args, link, format),
        Command::Read(args) => read::run(args, link, format),
        Command::Write(args) => write::run(args, link, format),
        Command::Version(args) => version::run(args),
    }
}

/// Link options shared by every device command.
#[derive(Args, Debug, Clone)]
pub struct LinkArgs {
    /// Wait per reply (serial: per byte), e.g. 500ms or 2s.
    #[arg(long, default_value = "500ms", env = "UDO_TIMEOUT", global = true)]
    pub timeout: String,
    /// Attempts per request before giving up.
    #[arg(long, default_value_t = DEFAULT_MAX_TRIES, global = true)]
    pub tries: u32,
}

impl LinkArgs {
    pub fn session_config(&self) -> CliResult<SessionConfig> {
        if self.tries == 0 {
            return Err(CliError::usage("--tries must be at least 1"));
        }
        Ok(SessionConfig {
            timeout: parse_timeout(&self.timeout)?,
            max_tries: self.tries,
        })
    }
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Device: serial:<device[:baud]> or ip:<host[:port]>.
    pub target: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum ValueKind {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    Hex,
}

impl ValueKind {
    pub fn width(self) -> Option<usize> {
        match self {
            Self::U8 | Self::I8 => Some(1),
            Self::U16 | Self::I16 => Some(2),
            Self::U32 | Self::I32 => Some(4),
            Self::Hex => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "u8",
            Self::U16 => "u16",
            Self::U32 => "u32",
            Self::I8 => "i8",
            Self::I16 => "i16",
            Self::I32 => "i32",
            Self::Hex => "hex",
        }
    }

    pub fn is_signed(self) -> bool {
        matches!(self, Self::I8 | Self::I16 | Self::I32)
    }
}

#[derive(Args, Debug)]
pub struct ReadArgs {
    /// Device: serial:<device[:baud]> or ip:<host[:port]>.
    pub target: String,
    /// Object index, hexadecimal (1500 or 0x1500).
    #[arg(value_parser = parse_index)]
    pub index: u16,
    /// Byte offset inside the object.
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    pub offset: u32,
    /// Bytes to read as hex; larger than the device payload limit is chunked.
    #[arg(long, default_value_t = 4)]
    pub len: usize,
    /// Interpretation of the returned bytes.
    #[arg(long = "as", value_name = "KIND", default_value = "hex")]
    pub kind: ValueKind,
}

#[derive(Args, Debug)]
pub struct WriteArgs {
    /// Device: serial:<device[:baud]> or ip:<host[:port]>.
    pub target: String,
    /// Object index, hexadecimal (1500 or 0x1500).
    #[arg(value_parser = parse_index)]
    pub index: u16,
    /// Integer value: decimal, negative or 0x-prefixed hex.
    #[arg(
        required_unless_present = "hex",
        conflicts_with = "hex",
        allow_negative_numbers = true
    )]
    pub value: Option<String>,
    /// Byte offset inside the object.
    #[arg(long, default_value = "0", value_parser = parse_u32)]
    pub offset: u32,
    /// Width of the integer value in bytes.
    #[arg(long, default_value_t = 4, value_parser = parse_width)]
    pub width: usize,
    /// Raw bytes instead of an integer, e.g. "0f f0 0f 0f".
    #[arg(long, value_name = "BYTES")]
    pub hex: Option<String>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

/// Connect to `target` and run the handshake.
pub fn open_session(target: &str, link: &LinkArgs) -> CliResult<Session> {
    let target: Target = target
        .parse()
        .map_err(|err: udo_session::UdoError| CliError::usage(err.to_string()))?;
    let config = link.session_config()?;
    connect_with_config(&target, &config).map_err(|err| udo_error("connect failed", err))
}

pub fn parse_timeout(input: &str) -> CliResult<Duration> {
    let input = input.trim();
    if input.is_empty() {
        return Err(CliError::usage("timeout must not be empty"));
    }

    let (number, millis) = if let Some(num) = input.strip_suffix("ms") {
        (num, true)
    } else if let Some(num) = input.strip_suffix('s') {
        (num, false)
    } else {
        (input, true)
    };

    let value: u64 = number
        .parse()
        .map_err(|_| CliError::usage(format!("invalid timeout value: {input}")))?;
    if value == 0 {
        return Err(CliError::usage("timeout must be greater than zero"));
    }

    Ok(if millis {
        Duration::from_millis(value)
    } else {
        Duration::from_secs(value)
    })
}

pub fn parse_index(input: &str) -> Result<u16, String> {
    let digits = input
        .strip_prefix("0x")
        .or_else(|| input.strip_prefix("0X"))
        .unwrap_or(input);
    u16::from_str_radix(digits, 16).map_err(|_| format!("invalid object index: {input}"))
}

pub fn parse_u32(input: &str) -> Result<u32, String> {
    let parsed = match input.strip_prefix("0x").or_else(|| input.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16),
        None => input.parse(),
    };
    parsed.map_err(|_| format!("invalid number: {input}"))
}

fn parse_width(input: &str) -> Result<usize, String> {
    match input {
        "1" => Ok(1),
        "2" => Ok(2),
        "4" => Ok(4),
        _ => Err(format!("width must be 1, 2 or 4, got {input}")),
    }
}

/// Parse an integer and check that it fits `width` bytes, signed or not.
pub fn parse_int(input: &str, width: usize) -> CliResult<u32> {
    let (negative, digits) = match input.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, input),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16),
        None => digits.parse::<i64>(),
    }
    .map_err(|_| CliError::usage(format!("invalid integer value: {input}")))?;
    let value = if negative { -magnitude } else { magnitude };

    let bits = 8 * width as u32;
    let min = -(1i64 << (bits - 1));
    let max = (1i64 << bits) - 1;
    if value < min || value > max {
        return Err(CliError::usage(format!(
            "value {input} does not fit in {width} byte(s)"
        )));
    }
    Ok(value as u32)
}

/// Parse bytes written as hex pairs, optionally separated by spaces, `:` or `,`.
pub fn parse_hex_bytes(input: &str) -> CliResult<Vec<u8>> {
    let digits: String = input
        .chars()
        .filter(|c| !matches!(c, ' ' | ':' | ','))
        .collect();
    let digits = digits.strip_prefix("0x").unwrap_or(&digits);
    if digits.is_empty() || digits.len() % 2 != 0 {
        return Err(CliError::usage(format!("invalid hex bytes: {input}")));
    }
    (0..digits.len())
        .step_by(2)
        .map(|i| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .map_err(|_| CliError::usage(format!("invalid hex bytes: {input}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_timeout_units() {
        assert_eq!(parse_timeout("2s").unwrap(), Duration::from_secs(2));
        assert_eq!(parse_timeout("150ms").unwrap(), Duration::from_millis(150));
        assert_eq!(parse_timeout("300").unwrap(), Duration::from_millis(300));
        assert!(parse_timeout("0ms").is_err());
        assert!(parse_timeout("soon").is_err());
    }

    #[test]
    fn indexes_are_hex() {
        assert_eq!(parse_index("1500").unwrap(), 0x1500);
        assert_eq!(parse_index("0x00ff").unwrap(), 0x00FF);
        assert!(parse_index("10000").is_err());
        assert!(parse_index("xyz").is_err());
    }

    #[test]
    fn offsets_accept_decimal_and_hex() {
        assert_eq!(parse_u32("300").unwrap(), 300);
        assert_eq!(parse_u32("0x10000").unwrap(), 0x10000);
        assert!(parse_u32("-1").is_err());
    }

    #[test]
    fn integers_are_range_checked() {
        assert_eq!(parse_int("255", 1).unwrap(), 0xFF);
        assert_eq!(parse_int("-1", 1).unwrap(), 0xFFFF_FFFF);
        assert_eq!(parse_int("-128", 1).unwrap() as u8, 0x80);
        assert!(parse_int("256", 1).is_err());
        assert!(parse_int("-129", 1).is_err());
        assert_eq!(parse_int("0x0F0FF00F", 4).unwrap(), 0x0F0F_F00F);
        assert_eq!(parse_int("-2", 2).unwrap() as u16, 0xFFFE);
        assert!(parse_int("0x1_0000", 2).is_err());
    }

    #[test]
    fn hex_bytes_with_separators() {
        assert_eq!(
            parse_hex_bytes("0f f0 0f 0f").unwrap(),
            vec![0x0F, 0xF0, 0x0F, 0x0F]
        );
        assert_eq!(parse_hex_bytes("0xA0:B1").unwrap(), vec![0xA0, 0xB1]);
        assert!(parse_hex_bytes("abc").is_err());
        assert!(parse_hex_bytes("").is_err());
        assert!(parse_hex_bytes("zz").is_err());
    }

    #[test]
    fn value_kinds() {
        assert_eq!(ValueKind::I16.width(), Some(2));
        assert_eq!(ValueKind::Hex.width(), None);
        assert!(ValueKind::I8.is_signed());
        assert_eq!(ValueKind::U32.name(), "u32");
    }

    #[test]
    fn zero_tries_is_rejected() {
        let link = LinkArgs {
            timeout: "500ms".to_string(),
            tries: 0,
        };
        assert!(link.session_config().is_err());
    }
}
