use udo_frame::{DEFAULT_MAX_PAYLOAD, MAX_PAYLOAD_LEN};
use udo_transport::{Result, Transport, UdoError};

use crate::value::decode_unsigned;

/// Value every UDO device reports in object 0x0000.
pub const DEVICE_MAGIC: u32 = 0x66CC_AA55;

/// Object holding the device identity word.
pub const INDEX_DEVICE_ID: u16 = 0x0000;

/// Object holding the largest payload the device accepts in one request.
pub const INDEX_MAX_PAYLOAD: u16 = 0x0001;

/// Outcome of a successful handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeResult {
    pub magic: u32,
    /// Chunk size for blob transfers, within `64..=1024`.
    pub max_payload_size: usize,
}

/// Verify the device identity and fetch its payload limit.
///
/// Transport faults while reading either object are returned unchanged.
/// Unexpected values yield [`UdoError::Handshake`]. The transport is left
/// open either way; closing it on failure is the caller's decision.
pub fn handshake(transport: &mut dyn Transport) -> Result<HandshakeResult> {
    let magic = decode_unsigned(&transport.read(INDEX_DEVICE_ID, 0, 4)?);
    if magic != DEVICE_MAGIC {
        return Err(UdoError::Handshake {
            op: "Open".to_string(),
            reason: format!("invalid Obj-0000 response: {magic:08X}"),
        });
    }

    let max_payload = decode_unsigned(&transport.read(INDEX_MAX_PAYLOAD, 0, 4)?) as usize;
    if !(DEFAULT_MAX_PAYLOAD..=MAX_PAYLOAD_LEN).contains(&max_payload) {
        return Err(UdoError::Handshake {
            op: "Open".to_string(),
            reason: format!("invalid maximal payload size: {max_payload}"),
        });
    }

    tracing::debug!(max_payload, "handshake complete");
    Ok(HandshakeResult {
        magic,
        max_payload_size: max_payload,
    })
}
