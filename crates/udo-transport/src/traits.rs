use bytes::Bytes;

use crate::error::{Result, UdoError};

/// Link type behind a [`Transport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    None,
    Serial,
    Ip,
}

/// Request/response access to a UDO device.
///
/// A transport is opened once, used for any number of blocking round trips
/// and closed once. Only one request is ever in flight; `&mut self` on every
/// operation keeps it that way.
pub trait Transport: Send {
    /// Acquire the underlying device or socket.
    fn open(&mut self) -> Result<()>;

    /// Release the underlying resource. Closing twice is harmless.
    fn close(&mut self);

    fn is_open(&self) -> bool;

    /// Read at most `max_len` bytes of object `index` starting at `offset`.
    fn read(&mut self, index: u16, offset: u32, max_len: usize) -> Result<Bytes>;

    /// Write `data` into object `index` starting at `offset`.
    fn write(&mut self, index: u16, offset: u32, data: &[u8]) -> Result<()>;

    fn protocol(&self) -> Protocol {
        Protocol::None
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn open(&mut self) -> Result<()> {
        (**self).open()
    }

    fn close(&mut self) {
        (**self).close()
    }

    fn is_open(&self) -> bool {
        (**self).is_open()
    }

    fn read(&mut self, index: u16, offset: u32, max_len: usize) -> Result<Bytes> {
        (**self).read(index, offset, max_len)
    }

    fn write(&mut self, index: u16, offset: u32, data: &[u8]) -> Result<()> {
        (**self).write(index, offset, data)
    }

    fn protocol(&self) -> Protocol {
        (**self).protocol()
    }
}

/// Placeholder transport that rejects every operation.
///
/// Sessions start with this attached so that calls made before a real link
/// is configured fail with a clear fault instead of panicking.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullTransport;

impl Transport for NullTransport {
    fn open(&mut self) -> Result<()> {
        Err(UdoError::InvalidHandler {
            op: "Open".to_string(),
        })
    }

    fn close(&mut self) {}

    fn is_open(&self) -> bool {
        false
    }

    fn read(&mut self, index: u16, offset: u32, _max_len: usize) -> Result<Bytes> {
        Err(UdoError::InvalidHandler {
            op: format!("UdoRead({index:04X}, {offset})"),
        })
    }

    fn write(&mut self, index: u16, offset: u32, data: &[u8]) -> Result<()> {
        Err(UdoError::InvalidHandler {
            op: format!("UdoWrite({index:04X}, {offset})[{}]", data.len()),
        })
    }
}
