use bytes::{Bytes, BytesMut};
use udo_frame::DEFAULT_MAX_PAYLOAD;
use udo_transport::{NullTransport, Protocol, Result, Transport};

use crate::handshake::{handshake, HandshakeResult};
use crate::value::{decode_signed, decode_unsigned, encode_le};

/// A conversation with one UDO device over a swappable transport.
///
/// A new session has [`NullTransport`] attached, so every call fails with
/// an invalid-handler fault until a real transport is set. Blob transfers
/// are split into chunks of [`max_payload_size`](Self::max_payload_size),
/// which starts at 64 and is replaced by the device's limit on [`open`](Self::open).
pub struct Session {
    transport: Box<dyn Transport>,
    max_payload_size: usize,
}

impl Default for Session {
    fn default() -> Self {
        Self {
            transport: Box::new(NullTransport),
            max_payload_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

impl Session {
    pub fn new(transport: Box<dyn Transport>) -> Self {
        Self {
            transport,
            ..Self::default()
        }
    }

    /// Replace the active transport, returning the previous one.
    ///
    /// `None` attaches [`NullTransport`]. The previous transport is not closed.
    pub fn set_transport(&mut self, transport: Option<Box<dyn Transport>>) -> Box<dyn Transport> {
        let next = transport.unwrap_or_else(|| Box::new(NullTransport));
        std::mem::replace(&mut self.transport, next)
    }

    /// Detach the active transport, leaving [`NullTransport`] in its place.
    pub fn take_transport(&mut self) -> Box<dyn Transport> {
        self.set_transport(None)
    }

    pub fn protocol(&self) -> Protocol {
        self.transport.protocol()
    }

    pub fn max_payload_size(&self) -> usize {
        self.max_payload_size
    }

    /// Open the transport if needed and run the device handshake.
    ///
    /// On any failure the transport is closed and the chunk size is left
    /// unchanged.
    pub fn open(&mut self) -> Result<HandshakeResult> {
        if !self.transport.is_open() {
            self.transport.open()?;
        }
        match handshake(self.transport.as_mut()) {
            Ok(result) => {
                self.max_payload_size = result.max_payload_size;
                Ok(result)
            }
            Err(err) => {
                tracing::debug!(error = %err, "handshake failed, closing transport");
                self.transport.close();
                Err(err)
            }
        }
    }

    pub fn close(&mut self) {
        self.transport.close();
    }

    pub fn is_open(&self) -> bool {
        self.transport.is_open()
    }

    /// Read at most `max_len` bytes in a single request.
    pub fn read(&mut self, index: u16, offset: u32, max_len: usize) -> Result<Bytes> {
        self.transport.read(index, offset, max_len)
    }

    /// Write `data` in a single request.
    pub fn write(&mut self, index: u16, offset: u32, data: &[u8]) -> Result<()> {
        self.transport.write(index, offset, data)
    }

    pub fn read_u8(&mut self, index: u16, offset: u32) -> Result<u8> {
        Ok(decode_unsigned(&self.read(index, offset, 1)?) as u8)
    }

    pub fn read_u16(&mut self, index: u16, offset: u32) -> Result<u16> {
        Ok(decode_unsigned(&self.read(index, offset, 2)?) as u16)
    }

    pub fn read_u32(&mut self, index: u16, offset: u32) -> Result<u32> {
        Ok(decode_unsigned(&self.read(index, offset, 4)?))
    }

    /// Single-byte values are not sign-extended: `0xFF` reads as 255.
    pub fn read_i8(&mut self, index: u16, offset: u32) -> Result<i32> {
        Ok(decode_signed(&self.read(index, offset, 1)?))
    }

    pub fn read_i16(&mut self, index: u16, offset: u32) -> Result<i16> {
        Ok(decode_signed(&self.read(index, offset, 2)?) as i16)
    }

    pub fn read_i32(&mut self, index: u16, offset: u32) -> Result<i32> {
        Ok(decode_signed(&self.read(index, offset, 4)?))
    }

    pub fn write_u8(&mut self, index: u16, offset: u32, value: u8) -> Result<()> {
        self.write(index, offset, &[value])
    }

    pub fn write_u16(&mut self, index: u16, offset: u32, value: u16) -> Result<()> {
        self.write(index, offset, &value.to_le_bytes())
    }

    pub fn write_u32(&mut self, index: u16, offset: u32, value: u32) -> Result<()> {
        self.write(index, offset, &value.to_le_bytes())
    }

    pub fn write_i8(&mut self, index: u16, offset: u32, value: i8) -> Result<()> {
        self.write(index, offset, &value.to_le_bytes())
    }

    pub fn write_i16(&mut self, index: u16, offset: u32, value: i16) -> Result<()> {
        self.write(index, offset, &value.to_le_bytes())
    }

    pub fn write_i32(&mut self, index: u16, offset: u32, value: i32) -> Result<()> {
        self.write(index, offset, &value.to_le_bytes())
    }

    /// Write the low `width` bytes of `value` (1 to 4).
    pub fn write_scalar(&mut self, index: u16, offset: u32, value: u32, width: usize) -> Result<()> {
        self.write(index, offset, &encode_le(value, width))
    }

    /// Read up to `len` bytes in chunks of at most `max_payload_size`.
    ///
    /// Stops at the first chunk shorter than requested; the result is then
    /// shorter than `len`.
    pub fn read_blob(&mut self, index: u16, offset: u32, len: usize) -> Result<Bytes> {
        let mut out = BytesMut::with_capacity(len);
        let mut offset = offset;
        let mut remaining = len;

        while remaining > 0 {
            let chunk = remaining.min(self.max_payload_size);
            let data = self.transport.read(index, offset, chunk)?;
            if data.is_empty() {
                break;
            }
            out.extend_from_slice(&data);
            offset = offset.wrapping_add(data.len() as u32);
            remaining = remaining.saturating_sub(data.len());
            if data.len() < chunk {
                tracing::trace!(index, offset, got = data.len(), "short chunk ends blob read");
                break;
            }
        }
        Ok(out.freeze())
    }

    /// Write `data` in chunks of at most `max_payload_size`.
    ///
    /// The first failing chunk aborts the transfer; chunks before it have
    /// already been applied by the device.
    pub fn write_blob(&mut self, index: u16, offset: u32, data: &[u8]) -> Result<()> {
        let chunk_size = self.max_payload_size.max(1);
        for (n, chunk) in data.chunks(chunk_size).enumerate() {
            let chunk_offset = offset.wrapping_add((n * chunk_size) as u32);
            self.transport.write(index, chunk_offset, chunk)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("protocol", &self.protocol())
            .field("open", &self.is_open())
            .field("max_payload_size", &self.max_payload_size)
            .finish()
    }
}
