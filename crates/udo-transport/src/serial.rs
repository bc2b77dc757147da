use std::io::{ErrorKind, Read, Write};
use std::time::Duration;

use bytes::{Bytes, BytesMut};
use udo_frame::{encode_request, Receiver, Request, Response, Status};

use crate::error::{Result, UdoError};
use crate::retry::{with_retries, DEFAULT_MAX_TRIES};
use crate::traits::{Protocol, Transport};

/// Default serial line speed.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default per-byte receive timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(500);

const READ_CHUNK_SIZE: usize = 64;

/// A byte-stream link to the device.
///
/// Reads must honour the configured timeout and report a stall as
/// `ErrorKind::TimedOut` (or `WouldBlock`).
pub trait SerialLink: Read + Write + Send {
    /// Drop whatever is pending in the input and output buffers.
    fn discard_buffers(&mut self) -> std::io::Result<()>;

    fn set_timeout(&mut self, timeout: Duration) -> std::io::Result<()>;
}

impl SerialLink for Box<dyn serialport::SerialPort> {
    fn discard_buffers(&mut self) -> std::io::Result<()> {
        serialport::SerialPort::clear(&**self, serialport::ClearBuffer::All)
            .map_err(Into::into)
    }

    fn set_timeout(&mut self, timeout: Duration) -> std::io::Result<()> {
        serialport::SerialPort::set_timeout(&mut **self, timeout).map_err(Into::into)
    }
}

/// Configuration for the serial transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    /// Device name (`ttyACM0`, `/dev/ttyUSB1`, `COM3`).
    pub device: String,
    pub baud_rate: u32,
    /// Maximum wait for each received byte.
    pub timeout: Duration,
    /// Full request/response attempts per operation.
    pub max_tries: u32,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            device: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: DEFAULT_TIMEOUT,
            max_tries: DEFAULT_MAX_TRIES,
        }
    }
}

impl SerialConfig {
    /// Parse a `device[:baud]` string.
    pub fn from_target(target: &str) -> Result<Self> {
        let (device, baud) = match target.rsplit_once(':') {
            Some((device, baud)) => (device, Some(baud)),
            None => (target, None),
        };
        if device.is_empty() {
            return Err(UdoError::connection("Open", "empty serial device name"));
        }
        let baud_rate = match baud {
            Some(baud) => baud.parse().map_err(|_| {
                UdoError::connection("Open", format!("invalid baud rate '{baud}'"))
            })?,
            None => DEFAULT_BAUD_RATE,
        };
        Ok(Self {
            device: device.to_string(),
            baud_rate,
            ..Self::default()
        })
    }

    /// Path handed to the OS. Bare names get `/dev/` prepended on Unix.
    pub fn device_path(&self) -> String {
        if cfg!(unix) && !self.device.contains('/') {
            format!("/dev/{}", self.device)
        } else {
            self.device.clone()
        }
    }
}

/// UDO over a byte-stream serial link (UART, USB CDC).
pub struct SerialTransport {
    config: SerialConfig,
    link: Option<Box<dyn SerialLink>>,
    tx: BytesMut,
    rx: Receiver,
}

impl SerialTransport {
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            link: None,
            tx: BytesMut::with_capacity(64),
            rx: Receiver::new(false),
        }
    }

    /// Create a transport around an already opened link.
    pub fn with_link(config: SerialConfig, link: impl SerialLink + 'static) -> Self {
        let mut transport = Self::new(config);
        transport.link = Some(Box::new(link));
        transport
    }

    pub fn config(&self) -> &SerialConfig {
        &self.config
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.config.timeout = timeout;
        if let Some(link) = self.link.as_mut() {
            link.set_timeout(timeout)
                .map_err(|err| UdoError::io("SetTimeout", err))?;
        }
        Ok(())
    }

    pub fn set_max_tries(&mut self, max_tries: u32) {
        self.config.max_tries = max_tries;
    }

    fn transact(&mut self, req: &Request) -> Result<Response> {
        let op = req.describe();
        let Self {
            config,
            link,
            tx,
            rx,
        } = self;
        let link = link
            .as_mut()
            .ok_or_else(|| UdoError::connection(&op, "not connected"))?;

        tx.clear();
        encode_request(req, tx).map_err(|err| UdoError::from_frame(&op, err))?;
        tracing::trace!(op = %op, frame = ?&tx[..], "serial request");

        let resp = with_retries(config.max_tries, |_| {
            link.discard_buffers()
                .map_err(|err| UdoError::io(&op, err))?;
            send_all(link.as_mut(), &tx[..], &op)?;
            rx.reset(req.is_write);
            receive(link.as_mut(), rx, &op)
        })?;

        match resp.status {
            Status::Error(code) => Err(UdoError::Device { op, code }),
            Status::Ok => Ok(resp),
        }
    }
}

fn send_all(link: &mut dyn SerialLink, data: &[u8], op: &str) -> Result<()> {
    let mut offset = 0usize;
    while offset < data.len() {
        match link.write(&data[offset..]) {
            Ok(0) => return Err(UdoError::connection(op, "serial link closed")),
            Ok(n) => offset += n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(UdoError::io(op, err)),
        }
    }
    link.flush().map_err(|err| UdoError::io(op, err))
}

/// Feed received bytes to `rx` until a whole frame has been validated.
///
/// A stall between bytes is fatal and surfaces as a connection fault, not a
/// retryable timeout.
fn receive(link: &mut dyn SerialLink, rx: &mut Receiver, op: &str) -> Result<Response> {
    let mut chunk = [0u8; READ_CHUNK_SIZE];
    loop {
        let n = match link.read(&mut chunk) {
            Ok(n) => n,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) if matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock) => {
                return Err(UdoError::connection(
                    op,
                    format!("error receiving response (stalled in {:?})", rx.state()),
                ));
            }
            Err(err) => return Err(UdoError::io(op, err)),
        };
        if n == 0 {
            return Err(UdoError::connection(op, "error receiving response"));
        }

        for &byte in &chunk[..n] {
            match rx.push(byte) {
                Ok(Some(resp)) => {
                    if rx.discarded() > 0 {
                        tracing::warn!(op, skipped = rx.discarded(), "discarded noise before response");
                    }
                    return Ok(resp);
                }
                Ok(None) => {}
                Err(err) => return Err(UdoError::from_frame(op, err)),
            }
        }
    }
}

impl Transport for SerialTransport {
    fn open(&mut self) -> Result<()> {
        if self.link.is_some() {
            return Ok(());
        }
        let path = self.config.device_path();
        let port = serialport::new(&path, self.config.baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .timeout(self.config.timeout)
            .open()
            .map_err(|err| UdoError::connection(&format!("Open({path})"), err.to_string()))?;

        tracing::info!(device = %path, baud = self.config.baud_rate, "serial link opened");
        self.link = Some(Box::new(port));
        Ok(())
    }

    fn close(&mut self) {
        if self.link.take().is_some() {
            tracing::info!(device = %self.config.device, "serial link closed");
        }
    }

    fn is_open(&self) -> bool {
        self.link.is_some()
    }

    fn read(&mut self, index: u16, offset: u32, max_len: usize) -> Result<Bytes> {
        let resp = self.transact(&Request::read(index, offset, max_len))?;
        if resp.payload.len() > max_len {
            return Err(UdoError::DataTooBig {
                op: format!("UdoRead({index:04X}, {offset})"),
                len: resp.payload.len(),
                max: max_len,
            });
        }
        Ok(resp.payload)
    }

    fn write(&mut self, index: u16, offset: u32, data: &[u8]) -> Result<()> {
        self.transact(&Request::write(index, offset, data.to_vec()))?;
        Ok(())
    }

    fn protocol(&self) -> Protocol {
        Protocol::Serial
    }
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("config", &self.config)
            .field("open", &self.link.is_some())
            .finish()
    }
}
