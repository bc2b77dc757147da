use bytes::{BufMut, Bytes, BytesMut};

use crate::crc::crc8;
use crate::error::{FrameError, Result};

/// Sync byte that leads every serial frame.
pub const SYNC: u8 = 0x55;

/// Protocol hard cap on a single request/response payload.
pub const MAX_PAYLOAD_LEN: usize = 1024;

/// Payload size assumed until the device reports its own maximum.
pub const DEFAULT_MAX_PAYLOAD: usize = 64;

/// Command byte bit 7: write request/response.
pub const CMD_WRITE: u8 = 0x80;

/// Payload-length code marking an error response (2-byte error code follows).
pub const LEN_CODE_ERROR: u8 = 6;

/// Payload-length code announcing an explicit 2-byte length field.
pub const LEN_CODE_EXTENDED: u8 = 7;

/// Size of the device error code carried by error responses.
pub const ERROR_CODE_LEN: usize = 2;

/// Outcome reported by the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    /// Device-reported error code.
    Error(u16),
}

/// A host request addressing one object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    /// Correlation token. Only carried by the IP transport.
    pub id: u32,
    pub index: u16,
    pub offset: u32,
    /// Reserved selector word, zero on every current request.
    pub metadata: u32,
    pub is_write: bool,
    /// Requested read length, or the payload length for writes.
    pub len: usize,
    /// Write data; empty for reads.
    pub payload: Bytes,
}

impl Request {
    /// Read up to `max_len` bytes from `index` at `offset`.
    pub fn read(index: u16, offset: u32, max_len: usize) -> Self {
        Self {
            id: 0,
            index,
            offset,
            metadata: 0,
            is_write: false,
            len: max_len,
            payload: Bytes::new(),
        }
    }

    /// Write `payload` to `index` at `offset`.
    pub fn write(index: u16, offset: u32, payload: impl Into<Bytes>) -> Self {
        let payload = payload.into();
        Self {
            id: 0,
            index,
            offset,
            metadata: 0,
            is_write: true,
            len: payload.len(),
            payload,
        }
    }

    /// Human-readable operation descriptor used in fault messages.
    pub fn describe(&self) -> String {
        if self.is_write {
            format!("UdoWrite({:04X}, {})[{}]", self.index, self.offset, self.len)
        } else {
            format!("UdoRead({:04X}, {})", self.index, self.offset)
        }
    }
}

/// A device response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub index: u16,
    pub offset: u32,
    pub metadata: u32,
    pub status: Status,
    /// Read data. Empty for write acknowledgements and error responses.
    pub payload: Bytes,
}

impl Response {
    /// Successful response carrying `payload`.
    pub fn ok(index: u16, offset: u32, payload: impl Into<Bytes>) -> Self {
        Self {
            index,
            offset,
            metadata: 0,
            status: Status::Ok,
            payload: payload.into(),
        }
    }

    /// Error response carrying a device error code.
    pub fn error(index: u16, offset: u32, code: u16) -> Self {
        Self {
            index,
            offset,
            metadata: 0,
            status: Status::Error(code),
            payload: Bytes::new(),
        }
    }
}

/// Number of bytes needed to carry `value`: 0, 1, 2 or 4.
pub fn field_len(value: u32) -> usize {
    match value {
        0 => 0,
        1..=0xFF => 1,
        0x100..=0xFFFF => 2,
        _ => 4,
    }
}

/// Two-bit command code for a field width of 0/1/2/4 bytes.
pub fn field_len_code(len: usize) -> u8 {
    match len {
        0 => 0,
        1 => 1,
        2 => 2,
        _ => 3,
    }
}

/// Field width for a two-bit command code.
pub fn field_len_from_code(code: u8) -> usize {
    match code & 0x03 {
        0 => 0,
        1 => 1,
        2 => 2,
        _ => 4,
    }
}

/// Three-bit payload-length code, or `None` when the explicit extended
/// length field is required.
pub fn payload_len_code(len: usize) -> Option<u8> {
    match len {
        0..=2 => Some(len as u8),
        4 => Some(3),
        8 => Some(4),
        16 => Some(5),
        _ => None,
    }
}

/// Meaning of a received payload-length code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadLen {
    Fixed(usize),
    Error,
    Extended,
}

/// Decode a three-bit payload-length code.
pub fn payload_len_from_code(code: u8) -> PayloadLen {
    match code & 0x07 {
        0..=2 => PayloadLen::Fixed(usize::from(code & 0x07)),
        3 => PayloadLen::Fixed(4),
        4 => PayloadLen::Fixed(8),
        5 => PayloadLen::Fixed(16),
        LEN_CODE_ERROR => PayloadLen::Error,
        _ => PayloadLen::Extended,
    }
}

/// Encode a request into the serial wire format.
///
/// Wire format:
/// ```text
/// ┌──────┬─────┬──────────┬───────┬──────────┬──────────┬─────────┬─────┐
/// │ 0x55 │ CMD │ [EXTLEN] │ INDEX │ [OFFSET] │ [META]   │ [DATA]  │ CRC │
/// │      │     │ (2B LE)  │(2B LE)│ (0/1/2/4)│ (0/1/2/4)│ (write) │     │
/// └──────┴─────┴──────────┴───────┴──────────┴──────────┴─────────┴─────┘
/// CMD: bit7 = write, bits6..4 = length code, bits3..2 = metadata width,
///      bits1..0 = offset width
/// ```
///
/// For reads the length field carries the requested maximum and no data
/// bytes follow.
pub fn encode_request(req: &Request, dst: &mut BytesMut) -> Result<()> {
    if req.len > MAX_PAYLOAD_LEN {
        return Err(FrameError::PayloadTooLarge {
            size: req.len,
            max: MAX_PAYLOAD_LEN,
        });
    }
    if req.is_write && req.payload.len() != req.len {
        return Err(FrameError::Malformed("write length does not match payload"));
    }

    let len_code = payload_len_code(req.len);
    let data: &[u8] = if req.is_write { &req.payload } else { &[] };
    encode_frame(
        FrameHead {
            is_write: req.is_write,
            len_code: len_code.unwrap_or(LEN_CODE_EXTENDED),
            ext_len: len_code.is_none().then_some(req.len as u16),
            index: req.index,
            offset: req.offset,
            metadata: req.metadata,
        },
        data,
        dst,
    );
    Ok(())
}

/// Encode a response in the device direction.
///
/// The host never sends these; they are used by loopback fixtures and tests.
pub fn encode_response(resp: &Response, is_write: bool, dst: &mut BytesMut) -> Result<()> {
    let (len_code, ext_len, data) = match resp.status {
        Status::Error(code) => (LEN_CODE_ERROR, None, code.to_le_bytes().to_vec()),
        Status::Ok => {
            if resp.payload.len() > MAX_PAYLOAD_LEN {
                return Err(FrameError::PayloadTooLarge {
                    size: resp.payload.len(),
                    max: MAX_PAYLOAD_LEN,
                });
            }
            let code = payload_len_code(resp.payload.len());
            (
                code.unwrap_or(LEN_CODE_EXTENDED),
                code.is_none().then_some(resp.payload.len() as u16),
                resp.payload.to_vec(),
            )
        }
    };

    encode_frame(
        FrameHead {
            is_write,
            len_code,
            ext_len,
            index: resp.index,
            offset: resp.offset,
            metadata: resp.metadata,
        },
        &data,
        dst,
    );
    Ok(())
}

struct FrameHead {
    is_write: bool,
    len_code: u8,
    ext_len: Option<u16>,
    index: u16,
    offset: u32,
    metadata: u32,
}

fn encode_frame(head: FrameHead, data: &[u8], dst: &mut BytesMut) {
    let offset_len = field_len(head.offset);
    let meta_len = field_len(head.metadata);

    let mut cmd = field_len_code(offset_len) | (field_len_code(meta_len) << 2);
    cmd |= (head.len_code & 0x07) << 4;
    if head.is_write {
        cmd |= CMD_WRITE;
    }

    let start = dst.len();
    dst.reserve(2 + 2 + 2 + offset_len + meta_len + data.len() + 1);
    dst.put_u8(SYNC);
    dst.put_u8(cmd);
    if let Some(ext_len) = head.ext_len {
        dst.put_u16_le(ext_len);
    }
    dst.put_u16_le(head.index);
    put_field(dst, head.offset, offset_len);
    put_field(dst, head.metadata, meta_len);
    dst.put_slice(data);

    let crc = crc8(&dst[start..]);
    dst.put_u8(crc);
}

fn put_field(dst: &mut BytesMut, value: u32, len: usize) {
    dst.put_slice(&value.to_le_bytes()[..len]);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(req: &Request) -> BytesMut {
        let mut buf = BytesMut::new();
        encode_request(req, &mut buf).unwrap();
        buf
    }

    #[test]
    fn read_request_minimal_layout() {
        let buf = encoded(&Request::read(0x0000, 0, 4));
        // sync, cmd (len code 3 = 4 bytes), index, crc
        assert_eq!(&buf[..4], &[0x55, 0x30, 0x00, 0x00]);
        assert_eq!(buf.len(), 5);
        assert_eq!(buf[4], crc8(&buf[..4]));
    }

    #[test]
    fn offset_width_codes() {
        let zero = encoded(&Request::read(1, 0, 4));
        assert_eq!(zero[1] & 0x03, 0);
        assert_eq!(zero.len(), 5);

        let wide = encoded(&Request::read(1, 300, 4));
        assert_eq!(wide[1] & 0x03, 2);
        assert_eq!(&wide[4..6], &300u16.to_le_bytes());
        assert_eq!(wide.len(), 7);

        let huge = encoded(&Request::read(1, 70_000, 4));
        assert_eq!(huge[1] & 0x03, 3);
        assert_eq!(&huge[4..8], &70_000u32.to_le_bytes());
        assert_eq!(huge.len(), 9);

        let small = encoded(&Request::read(1, 0xFF, 4));
        assert_eq!(small[1] & 0x03, 1);
    }

    #[test]
    fn metadata_width_code() {
        let mut req = Request::read(1, 0, 2);
        req.metadata = 0x1234;
        let buf = encoded(&req);
        assert_eq!((buf[1] >> 2) & 0x03, 2);
        assert_eq!(&buf[4..6], &[0x34, 0x12]);
    }

    #[test]
    fn payload_length_codes() {
        assert_eq!(payload_len_code(0), Some(0));
        assert_eq!(payload_len_code(2), Some(2));
        assert_eq!(payload_len_code(3), None);
        assert_eq!(payload_len_code(4), Some(3));
        assert_eq!(payload_len_code(8), Some(4));
        assert_eq!(payload_len_code(16), Some(5));
        assert_eq!(payload_len_code(64), None);

        assert_eq!(payload_len_from_code(6), PayloadLen::Error);
        assert_eq!(payload_len_from_code(7), PayloadLen::Extended);
        assert_eq!(payload_len_from_code(4), PayloadLen::Fixed(8));
    }

    #[test]
    fn write_request_carries_payload() {
        let buf = encoded(&Request::write(0x1500, 0, vec![0x0F, 0xF0, 0x0F, 0x0F]));
        assert_eq!(buf[1], CMD_WRITE | 0x30);
        assert_eq!(&buf[2..4], &[0x00, 0x15]);
        assert_eq!(&buf[4..8], &[0x0F, 0xF0, 0x0F, 0x0F]);
        assert_eq!(buf.len(), 9);
    }

    #[test]
    fn extended_length_follows_command_byte() {
        let buf = encoded(&Request::write(0x0003, 64, vec![0xAB; 100]));
        assert_eq!((buf[1] >> 4) & 0x07, LEN_CODE_EXTENDED);
        assert_eq!(&buf[2..4], &100u16.to_le_bytes());
        assert_eq!(&buf[4..6], &[0x03, 0x00]);
        assert_eq!(buf[6], 64);
        assert_eq!(buf.len(), 2 + 2 + 2 + 1 + 100 + 1);
    }

    #[test]
    fn read_of_three_bytes_uses_extended_length() {
        let buf = encoded(&Request::read(5, 0, 3));
        assert_eq!((buf[1] >> 4) & 0x07, LEN_CODE_EXTENDED);
        assert_eq!(&buf[2..4], &[3, 0]);
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn rejects_oversized_payload() {
        let mut buf = BytesMut::new();
        let err = encode_request(&Request::write(1, 0, vec![0; 1025]), &mut buf).unwrap_err();
        assert!(matches!(err, FrameError::PayloadTooLarge { size: 1025, .. }));
        assert!(buf.is_empty());
    }

    #[test]
    fn error_response_uses_code_six() {
        let mut buf = BytesMut::new();
        encode_response(&Response::error(0x6666, 0, 0x2000), false, &mut buf).unwrap();
        assert_eq!((buf[1] >> 4) & 0x07, LEN_CODE_ERROR);
        assert_eq!(&buf[4..6], &[0x00, 0x20]);
        assert_eq!(buf.len(), 7);
    }

    #[test]
    fn describe_matches_operation() {
        assert_eq!(Request::read(0x1a, 3, 4).describe(), "UdoRead(001A, 3)");
        assert_eq!(
            Request::write(0x1500, 0, vec![1, 2]).describe(),
            "UdoWrite(1500, 0)[2]"
        );
    }
}
