/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the protocol maximum.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// The trailing CRC byte does not match the frame contents.
    #[error("CRC mismatch (computed {computed:#04x}, received {received:#04x})")]
    CrcMismatch { computed: u8, received: u8 },

    /// Fewer bytes than a complete header or error code.
    #[error("truncated message ({len} bytes, need {need})")]
    Truncated { len: usize, need: usize },

    /// An error reply without its two-byte error code.
    #[error("error response length: {len}")]
    ShortErrorCode { len: usize },

    /// The frame is structurally invalid.
    #[error("malformed frame: {0}")]
    Malformed(&'static str),

    /// The receiver already produced a response and must be reset first.
    #[error("receiver finished; reset before reuse")]
    Finished,
}

pub type Result<T> = std::result::Result<T, FrameError>;
