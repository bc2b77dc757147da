//! Request/response transports for UDO devices.
//!
//! Every transport implements [`Transport`]: blocking `read` and `write` of
//! an object identified by a 16-bit index and a byte offset. Two links are
//! provided:
//! - [`SerialTransport`]: bit-packed frames with CRC-8 over a serial port
//! - [`IpTransport`]: 16-byte header datagrams over UDP
//!
//! [`NullTransport`] stands in when nothing is configured and fails every
//! call. Faults are reported as [`UdoError`] with a numeric code and the
//! descriptor of the operation that failed.

pub mod codes;
pub mod error;
pub mod ip;
pub mod retry;
pub mod serial;
pub mod traits;

pub use error::{FaultKind, Result, UdoError};
pub use ip::{IpConfig, IpTransport};
pub use retry::{with_retries, DEFAULT_MAX_TRIES};
pub use serial::{SerialConfig, SerialLink, SerialTransport};
pub use traits::{NullTransport, Protocol, Transport};
