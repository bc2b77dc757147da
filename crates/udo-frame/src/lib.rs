//! UDO wire formats.
//!
//! Two encodings address the same index/offset/metadata object model:
//! - Serial frames: sync byte `0x55`, a bit-packed command byte,
//!   variable-width little-endian fields and a trailing CRC-8. Responses are
//!   decoded byte by byte by [`Receiver`].
//! - IP datagrams: a fixed 16-byte header ([`DatagramHeader`]) followed by
//!   the payload, one message per UDP datagram.
//!
//! Everything here is pure; I/O lives in `udo-transport`.

pub mod codec;
pub mod crc;
pub mod datagram;
pub mod error;
pub mod receiver;

pub use codec::{
    encode_request, encode_response, Request, Response, Status, DEFAULT_MAX_PAYLOAD,
    MAX_PAYLOAD_LEN, SYNC,
};
pub use crc::{crc8, crc8_update};
pub use datagram::{
    decode_response_datagram, encode_request_datagram, encode_response_datagram,
    DatagramHeader, DEFAULT_PORT, HEADER_SIZE, MAX_DATAGRAM_SIZE,
};
pub use error::{FrameError, Result};
pub use receiver::{Receiver, RxState};
