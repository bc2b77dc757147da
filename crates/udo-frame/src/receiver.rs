use bytes::{Bytes, BytesMut};

use crate::codec::{
    field_len_from_code, payload_len_from_code, PayloadLen, Response, Status, CMD_WRITE,
    ERROR_CODE_LEN, MAX_PAYLOAD_LEN, SYNC,
};
use crate::crc::crc8_update;
use crate::error::{FrameError, Result};

/// Position of the receiver inside a serial frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxState {
    WaitSync,
    Cmd,
    ExtLen,
    Index,
    Offset,
    Metadata,
    /// Read data, or the 2-byte code of an error response.
    Data,
    Crc,
    Done,
}

/// Incremental decoder for serial responses.
///
/// Bytes are fed one at a time through [`Receiver::push`], so the decoder is
/// independent of how many bytes each I/O call delivers. Noise in front of a
/// frame is skipped; a command byte whose direction does not match the
/// outstanding request drops the assumed sync byte and scanning resumes.
#[derive(Debug)]
pub struct Receiver {
    state: RxState,
    expect_write: bool,
    crc: u8,
    cnt: usize,
    offset_len: usize,
    meta_len: usize,
    data_len: usize,
    is_error: bool,
    index: u16,
    offset: u32,
    metadata: u32,
    data: BytesMut,
    discarded: usize,
}

impl Receiver {
    /// Create a receiver waiting for the response to a read (`false`) or
    /// write (`true`) request.
    pub fn new(expect_write: bool) -> Self {
        Self {
            state: RxState::WaitSync,
            expect_write,
            crc: 0,
            cnt: 0,
            offset_len: 0,
            meta_len: 0,
            data_len: 0,
            is_error: false,
            index: 0,
            offset: 0,
            metadata: 0,
            data: BytesMut::new(),
            discarded: 0,
        }
    }

    /// Prepare for the response to a new request.
    pub fn reset(&mut self, expect_write: bool) {
        *self = Self {
            data: std::mem::take(&mut self.data),
            ..Self::new(expect_write)
        };
        self.data.clear();
    }

    pub fn state(&self) -> RxState {
        self.state
    }

    /// Bytes skipped while hunting for a frame start.
    pub fn discarded(&self) -> usize {
        self.discarded
    }

    /// Consume one byte.
    ///
    /// Returns `Ok(Some(response))` once the trailing CRC has been validated.
    /// Device error frames are returned as responses with
    /// [`Status::Error`]; a CRC mismatch is reported as
    /// [`FrameError::CrcMismatch`].
    pub fn push(&mut self, byte: u8) -> Result<Option<Response>> {
        match self.state {
            RxState::WaitSync => {
                if byte == SYNC {
                    self.begin_frame();
                } else {
                    self.discarded += 1;
                }
            }
            RxState::Cmd => {
                let is_write = byte & CMD_WRITE != 0;
                if is_write != self.expect_write {
                    // Not a frame start after all: drop the sync byte and
                    // treat this byte as fresh input.
                    tracing::trace!(cmd = byte, "direction mismatch, resynchronizing");
                    self.discarded += 1;
                    self.state = RxState::WaitSync;
                    return self.push(byte);
                }
                self.crc = crc8_update(self.crc, byte);
                self.offset_len = field_len_from_code(byte);
                self.meta_len = field_len_from_code(byte >> 2);
                self.cnt = 0;
                self.state = RxState::Index;
                match payload_len_from_code(byte >> 4) {
                    PayloadLen::Fixed(len) => self.data_len = len,
                    PayloadLen::Error => {
                        self.data_len = ERROR_CODE_LEN;
                        self.is_error = true;
                    }
                    PayloadLen::Extended => self.state = RxState::ExtLen,
                }
            }
            RxState::ExtLen => {
                self.crc = crc8_update(self.crc, byte);
                self.data_len |= usize::from(byte) << (8 * self.cnt);
                self.cnt += 1;
                if self.cnt == 2 {
                    self.cnt = 0;
                    if self.data_len > MAX_PAYLOAD_LEN {
                        self.state = RxState::Done;
                        return Err(FrameError::Malformed("extended length exceeds maximum"));
                    }
                    self.state = RxState::Index;
                }
            }
            RxState::Index => {
                self.crc = crc8_update(self.crc, byte);
                self.index |= u16::from(byte) << (8 * self.cnt);
                self.cnt += 1;
                if self.cnt == 2 {
                    self.next_field(RxState::Index);
                }
            }
            RxState::Offset => {
                self.crc = crc8_update(self.crc, byte);
                self.offset |= u32::from(byte) << (8 * self.cnt);
                self.cnt += 1;
                if self.cnt == self.offset_len {
                    self.next_field(RxState::Offset);
                }
            }
            RxState::Metadata => {
                self.crc = crc8_update(self.crc, byte);
                self.metadata |= u32::from(byte) << (8 * self.cnt);
                self.cnt += 1;
                if self.cnt == self.meta_len {
                    self.next_field(RxState::Metadata);
                }
            }
            RxState::Data => {
                self.crc = crc8_update(self.crc, byte);
                self.data.extend_from_slice(&[byte]);
                if self.data.len() == self.data_len {
                    self.next_field(RxState::Data);
                }
            }
            RxState::Crc => {
                self.state = RxState::Done;
                if byte != self.crc {
                    return Err(FrameError::CrcMismatch {
                        computed: self.crc,
                        received: byte,
                    });
                }
                return Ok(Some(self.finish()));
            }
            RxState::Done => return Err(FrameError::Finished),
        }
        Ok(None)
    }

    fn begin_frame(&mut self) {
        self.state = RxState::Cmd;
        self.crc = crc8_update(0, SYNC);
        self.cnt = 0;
        self.data_len = 0;
        self.is_error = false;
        self.index = 0;
        self.offset = 0;
        self.metadata = 0;
        self.data.clear();
    }

    fn next_field(&mut self, done: RxState) {
        self.cnt = 0;
        let order = [RxState::Offset, RxState::Metadata, RxState::Data];
        let start = match done {
            RxState::Index => 0,
            RxState::Offset => 1,
            RxState::Metadata => 2,
            _ => order.len(),
        };
        self.state = order[start..]
            .iter()
            .copied()
            .find(|state| self.field_width(*state) > 0)
            .unwrap_or(RxState::Crc);
    }

    fn field_width(&self, state: RxState) -> usize {
        match state {
            RxState::Offset => self.offset_len,
            RxState::Metadata => self.meta_len,
            RxState::Data => self.data_len,
            _ => 0,
        }
    }

    fn finish(&mut self) -> Response {
        let data: Bytes = self.data.split().freeze();
        let (status, payload) = if self.is_error {
            (Status::Error(u16::from_le_bytes([data[0], data[1]])), Bytes::new())
        } else {
            (Status::Ok, data)
        };
        Response {
            index: self.index,
            offset: self.offset,
            metadata: self.metadata,
            status,
            payload,
        }
    }
}
