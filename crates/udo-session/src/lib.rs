//! Device sessions on top of a UDO transport.
//!
//! A [`Session`] owns one transport, checks the device identity on open and
//! learns its payload limit. Scalars are read and written little-endian;
//! blobs are split into chunks the device accepts.
//!
//! ```no_run
//! use udo_session::{connect_ip, SessionConfig};
//!
//! let mut session = connect_ip("192.168.1.50", &SessionConfig::default())?;
//! let serial = session.read_u32(0x0102, 0)?;
//! session.write_blob(0x2000, 0, &[0u8; 300])?;
//! # Ok::<(), udo_session::UdoError>(())
//! ```

pub mod connector;
pub mod handshake;
pub mod session;
pub mod value;

pub use connector::{connect, connect_ip, connect_serial, connect_with_config, SessionConfig, Target};
pub use handshake::{handshake, HandshakeResult, DEVICE_MAGIC, INDEX_DEVICE_ID, INDEX_MAX_PAYLOAD};
pub use session::Session;
pub use udo_transport::{Result, UdoError};
