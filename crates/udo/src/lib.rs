//! Host-side client for UDO devices.
//!
//! UDO exposes a device as a flat space of objects, each addressed by a
//! 16-bit index and read or written at a byte offset. This crate bundles the
//! layers needed to talk to one over a serial port or UDP.
//!
//! # Crate Structure
//!
//! - [`frame`]: CRC-8 serial frames, the incremental receiver and the IP datagram header
//! - [`transport`]: the blocking request/response [`transport::Transport`] trait with serial and UDP links
//! - [`session`]: handshake, typed scalars and chunked blobs (behind the `session` feature)

/// Re-export frame types.
pub mod frame {
    pub use udo_frame::*;
}

/// Re-export transport types.
pub mod transport {
    pub use udo_transport::*;
}

/// Re-export session types (requires `session` feature).
#[cfg(feature = "session")]
pub mod session {
    pub use udo_session::*;
}
