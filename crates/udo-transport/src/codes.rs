//! Numeric fault codes.
//!
//! Codes `0x1xxx` are raised on the host side, `0x2xxx` are reported by the
//! device, `0x9xxx` flag programming errors.

/// Not connected, send or receive failure, malformed response.
pub const CONNECTION: u16 = 0x1001;
pub const CRC: u16 = 0x1002;
pub const TIMEOUT: u16 = 0x1003;
/// Response payload larger than the caller's buffer.
pub const DATA_TOO_BIG: u16 = 0x1004;

/// Index / object does not exist.
pub const WRONG_INDEX: u16 = 0x2000;
/// Offset not accepted (e.g. must be a multiple of 4).
pub const WRONG_OFFSET: u16 = 0x2001;
pub const WRONG_ACCESS: u16 = 0x2002;
pub const READ_ONLY: u16 = 0x2010;
pub const WRITE_ONLY: u16 = 0x2011;
pub const WRITE_BOUNDS: u16 = 0x2012;
pub const WRITE_VALUE: u16 = 0x2020;
/// Configuration mode required.
pub const RUN_MODE: u16 = 0x2030;
/// Referenced unit does not exist.
pub const UNITSEL: u16 = 0x2040;
pub const BUSY: u16 = 0x2050;

pub const NOT_IMPLEMENTED: u16 = 0x9001;
pub const INTERNAL: u16 = 0x9002;
/// Application / interfacing error, e.g. no transport attached.
pub const APPLICATION: u16 = 0x9003;

/// Returns a human-readable name for a fault code.
pub fn code_name(code: u16) -> &'static str {
    match code {
        CONNECTION => "CONNECTION",
        CRC => "CRC",
        TIMEOUT => "TIMEOUT",
        DATA_TOO_BIG => "DATA_TOO_BIG",
        WRONG_INDEX => "WRONG_INDEX",
        WRONG_OFFSET => "WRONG_OFFSET",
        WRONG_ACCESS => "WRONG_ACCESS",
        READ_ONLY => "READ_ONLY",
        WRITE_ONLY => "WRITE_ONLY",
        WRITE_BOUNDS => "WRITE_BOUNDS",
        WRITE_VALUE => "WRITE_VALUE",
        RUN_MODE => "RUN_MODE",
        UNITSEL => "UNITSEL",
        BUSY => "BUSY",
        NOT_IMPLEMENTED => "NOT_IMPLEMENTED",
        INTERNAL => "INTERNAL",
        APPLICATION => "APPLICATION",
        0x2000..=0x2FFF => "DEVICE",
        _ => "UNKNOWN",
    }
}

/// Returns true if the code falls in the device-reported range.
pub fn is_device_code(code: u16) -> bool {
    (0x2000..0x3000).contains(&code)
}
