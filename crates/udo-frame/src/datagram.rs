use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::codec::{Request, Response, Status, ERROR_CODE_LEN, MAX_PAYLOAD_LEN};
use crate::error::{FrameError, Result};

/// Datagram header: id (4) + len_cmd (2) + index (2) + offset (4) + metadata (4).
pub const HEADER_SIZE: usize = 16;

/// `len_cmd` bit 15: write request/response.
pub const WRITE_FLAG: u16 = 0x8000;

/// `len_cmd` low 15 bits: payload length.
pub const LEN_MASK: u16 = 0x7FFF;

/// A response whose low 11 length bits are all set carries an error code.
pub const ERROR_MARKER: u16 = 0x7FF;

/// Default UDP port of UDO devices.
pub const DEFAULT_PORT: u16 = 1221;

/// Largest datagram either side sends (1024 byte payload + header).
pub const MAX_DATAGRAM_SIZE: usize = MAX_PAYLOAD_LEN + HEADER_SIZE;

/// Fixed header shared by IP requests and responses.
///
/// ```text
/// ┌──────────┬──────────────┬─────────┬──────────┬──────────┐
/// │ id (4B)  │ len_cmd (2B) │ index   │ offset   │ metadata │
/// │          │ b15 = write  │ (2B)    │ (4B)     │ (4B)     │
/// └──────────┴──────────────┴─────────┴──────────┴──────────┘
/// all fields little-endian
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatagramHeader {
    pub id: u32,
    pub len_cmd: u16,
    pub index: u16,
    pub offset: u32,
    pub metadata: u32,
}

impl DatagramHeader {
    /// Header for `req` tagged with correlation token `id`.
    pub fn for_request(id: u32, req: &Request) -> Self {
        let mut len_cmd = req.len as u16 & LEN_MASK;
        if req.is_write {
            len_cmd |= WRITE_FLAG;
        }
        Self {
            id,
            len_cmd,
            index: req.index,
            offset: req.offset,
            metadata: req.metadata,
        }
    }

    pub fn is_write(&self) -> bool {
        self.len_cmd & WRITE_FLAG != 0
    }

    /// Payload length carried in the low 15 bits.
    pub fn len(&self) -> usize {
        usize::from(self.len_cmd & LEN_MASK)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True when the payload is a device error code.
    pub fn is_error(&self) -> bool {
        self.len_cmd & ERROR_MARKER == ERROR_MARKER
    }

    pub fn encode(&self, dst: &mut BytesMut) {
        dst.reserve(HEADER_SIZE);
        dst.put_u32_le(self.id);
        dst.put_u16_le(self.len_cmd);
        dst.put_u16_le(self.index);
        dst.put_u32_le(self.offset);
        dst.put_u32_le(self.metadata);
    }

    pub fn decode(mut src: &[u8]) -> Result<Self> {
        if src.len() < HEADER_SIZE {
            return Err(FrameError::Truncated {
                len: src.len(),
                need: HEADER_SIZE,
            });
        }
        Ok(Self {
            id: src.get_u32_le(),
            len_cmd: src.get_u16_le(),
            index: src.get_u16_le(),
            offset: src.get_u32_le(),
            metadata: src.get_u32_le(),
        })
    }
}

/// Encode a request datagram (header plus write data).
pub fn encode_request_datagram(id: u32, req: &Request, dst: &mut BytesMut) -> Result<()> {
    if req.len > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: req.len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    DatagramHeader::for_request(id, req).encode(dst);
    if req.is_write {
        dst.put_slice(&req.payload);
    }
    Ok(())
}

/// Encode a response datagram in the device direction.
///
/// Used by loopback fixtures and tests; the host never sends responses.
pub fn encode_response_datagram(
    id: u32,
    is_write: bool,
    resp: &Response,
    dst: &mut BytesMut,
) -> Result<()> {
    let flag = if is_write { WRITE_FLAG } else { 0 };
    let mut header = DatagramHeader {
        id,
        len_cmd: flag,
        index: resp.index,
        offset: resp.offset,
        metadata: resp.metadata,
    };
    match resp.status {
        Status::Error(code) => {
            header.len_cmd |= ERROR_MARKER;
            header.encode(dst);
            dst.put_u16_le(code);
        }
        Status::Ok => {
            if resp.payload.len() > MAX_PAYLOAD_LEN {
                return Err(FrameError::PayloadTooLarge {
                    size: resp.payload.len(),
                    max: MAX_PAYLOAD_LEN,
                });
            }
            header.len_cmd |= resp.payload.len() as u16;
            header.encode(dst);
            dst.put_slice(&resp.payload);
        }
    }
    Ok(())
}

/// Split a received datagram into its header and response.
pub fn decode_response_datagram(src: &[u8]) -> Result<(DatagramHeader, Response)> {
    let header = DatagramHeader::decode(src)?;
    let body = Bytes::copy_from_slice(&src[HEADER_SIZE..]);

    let (status, payload) = if header.is_error() {
        if body.len() < ERROR_CODE_LEN {
            return Err(FrameError::ShortErrorCode { len: body.len() });
        }
        (Status::Error(u16::from_le_bytes([body[0], body[1]])), Bytes::new())
    } else {
        (Status::Ok, body)
    };

    Ok((
        header,
        Response {
            index: header.index,
            offset: header.offset,
            metadata: header.metadata,
            status,
            payload,
        },
    ))
}
