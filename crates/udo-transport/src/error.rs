use udo_frame::FrameError;

use crate::codes;

/// Broad classification of a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// I/O failure, retries exhausted, malformed or short response.
    Connection,
    /// CRC or correlation mismatch.
    Protocol,
    /// Error code returned by the remote device.
    Device,
    /// Response larger than the caller's buffer.
    Oversize,
    /// Misuse of the API (no transport attached, unimplemented operation).
    Programming,
}

/// Errors raised by UDO transports and sessions.
///
/// Every variant carries the descriptor of the operation that failed, e.g.
/// `UdoRead(0001, 0)` or `UdoWrite(1500, 0)[4]`.
#[derive(Debug, thiserror::Error)]
pub enum UdoError {
    /// The link is not usable or the exchange failed outright.
    #[error("{op}: {reason}")]
    Connection { op: String, reason: String },

    /// An I/O error occurred on the underlying device or socket.
    #[error("{op}: I/O error: {source}")]
    Io {
        op: String,
        #[source]
        source: std::io::Error,
    },

    /// The response could not be parsed.
    #[error("{op}: malformed response: {reason}")]
    Malformed { op: String, reason: String },

    /// The response does not belong to the outstanding request.
    #[error("{op}: unexpected response")]
    UnexpectedResponse { op: String },

    /// The serial frame checksum did not validate.
    #[error("{op}: CRC error")]
    Crc { op: String },

    /// No response arrived in time.
    #[error("{op}: timeout")]
    Timeout { op: String },

    /// The response payload exceeds the requested maximum.
    #[error("{op}: result data is too big: {len} (max {max})")]
    DataTooBig { op: String, len: usize, max: usize },

    /// The device answered with an error code.
    #[error("{op} result: {code:04X}")]
    Device { op: String, code: u16 },

    /// The device failed the identity or payload-size check.
    #[error("{op}: {reason}")]
    Handshake { op: String, reason: String },

    /// The operation is not supported by this transport.
    #[error("{op}: not implemented")]
    NotImplemented { op: String },

    /// No real transport is attached.
    #[error("{op}: invalid comm. handler")]
    InvalidHandler { op: String },
}

impl UdoError {
    pub(crate) fn connection(op: &str, reason: impl Into<String>) -> Self {
        Self::Connection {
            op: op.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn io(op: &str, source: std::io::Error) -> Self {
        Self::Io {
            op: op.to_string(),
            source,
        }
    }

    /// Attach an operation descriptor to a codec error.
    pub fn from_frame(op: &str, err: FrameError) -> Self {
        let op = op.to_string();
        match err {
            FrameError::CrcMismatch { .. } => Self::Crc { op },
            FrameError::PayloadTooLarge { size, max } => Self::DataTooBig { op, len: size, max },
            short @ FrameError::ShortErrorCode { .. } => Self::Connection {
                op,
                reason: short.to_string(),
            },
            other => Self::Malformed {
                op,
                reason: other.to_string(),
            },
        }
    }

    /// Terminal form of a transient fault once the retry budget is spent.
    ///
    /// Timeouts keep their identity; every other transient fault becomes a
    /// connection fault naming the last failure.
    pub(crate) fn into_exhausted(self) -> Self {
        if !self.is_transient() || matches!(self, Self::Timeout { .. }) {
            return self;
        }
        let op = self.op().to_string();
        let text = self.to_string();
        let last = text
            .strip_prefix(op.as_str())
            .map(|rest| rest.trim_start_matches(": "))
            .unwrap_or(&text);
        Self::Connection {
            reason: format!("retries exhausted: {last}"),
            op,
        }
    }

    /// Numeric fault code.
    pub fn code(&self) -> u16 {
        match self {
            Self::Connection { .. }
            | Self::Io { .. }
            | Self::Malformed { .. }
            | Self::UnexpectedResponse { .. }
            | Self::Handshake { .. } => codes::CONNECTION,
            Self::Crc { .. } => codes::CRC,
            Self::Timeout { .. } => codes::TIMEOUT,
            Self::DataTooBig { .. } => codes::DATA_TOO_BIG,
            Self::Device { code, .. } => *code,
            Self::NotImplemented { .. } => codes::NOT_IMPLEMENTED,
            Self::InvalidHandler { .. } => codes::APPLICATION,
        }
    }

    /// Descriptor of the failed operation.
    pub fn op(&self) -> &str {
        match self {
            Self::Connection { op, .. }
            | Self::Io { op, .. }
            | Self::Malformed { op, .. }
            | Self::UnexpectedResponse { op }
            | Self::Crc { op }
            | Self::Timeout { op }
            | Self::DataTooBig { op, .. }
            | Self::Device { op, .. }
            | Self::Handshake { op, .. }
            | Self::NotImplemented { op }
            | Self::InvalidHandler { op } => op,
        }
    }

    pub fn kind(&self) -> FaultKind {
        match self {
            Self::Connection { .. }
            | Self::Io { .. }
            | Self::Malformed { .. }
            | Self::Timeout { .. }
            | Self::Handshake { .. } => FaultKind::Connection,
            Self::UnexpectedResponse { .. } | Self::Crc { .. } => FaultKind::Protocol,
            Self::Device { .. } => FaultKind::Device,
            Self::DataTooBig { .. } => FaultKind::Oversize,
            Self::NotImplemented { .. } | Self::InvalidHandler { .. } => FaultKind::Programming,
        }
    }

    /// True for conditions worth resending the whole request for.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. }
                | Self::Crc { .. }
                | Self::UnexpectedResponse { .. }
                | Self::Malformed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, UdoError>;
