use std::fmt;
use std::io;

use udo_transport::UdoError;

pub const SUCCESS: i32 = 0;
pub const FAILURE: i32 = 1;
pub const TRANSPORT_ERROR: i32 = 3;
pub const PERMISSION_DENIED: i32 = 50;
pub const DATA_INVALID: i32 = 60;
pub const USAGE: i32 = 64;
/// The device rejected the request with an error code.
pub const DEVICE_ERROR: i32 = 70;
pub const TIMEOUT: i32 = 124;
pub const INTERNAL: i32 = 125;

pub type CliResult<T> = Result<T, CliError>;

#[derive(Debug)]
pub struct CliError {
    pub code: i32,
    pub message: String,
}

impl CliError {
    pub fn new(code: i32, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self::new(USAGE, message)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for CliError {}

fn io_exit_code(err: &io::Error) -> i32 {
    match err.kind() {
        io::ErrorKind::PermissionDenied => PERMISSION_DENIED,
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TIMEOUT,
        io::ErrorKind::NotFound | io::ErrorKind::ConnectionRefused => FAILURE,
        _ => TRANSPORT_ERROR,
    }
}

pub fn udo_error(context: &str, err: UdoError) -> CliError {
    let code = match &err {
        UdoError::Io { source, .. } => io_exit_code(source),
        UdoError::Timeout { .. } => TIMEOUT,
        UdoError::Device { .. } => DEVICE_ERROR,
        UdoError::DataTooBig { .. } => DATA_INVALID,
        UdoError::Connection { .. }
        | UdoError::Malformed { .. }
        | UdoError::UnexpectedResponse { .. }
        | UdoError::Crc { .. }
        | UdoError::Handshake { .. } => TRANSPORT_ERROR,
        UdoError::NotImplemented { .. } | UdoError::InvalidHandler { .. } => INTERNAL,
    };
    let detail = match &err {
        UdoError::Device { code, .. } => {
            format!("{err} ({})", udo_transport::codes::code_name(*code))
        }
        _ => err.to_string(),
    };
    CliError::new(code, format!("{context}: {detail}"))
}
