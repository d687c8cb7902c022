use thiserror::Error;

/// Errors raised while encoding or decoding a wire packet.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WireError {
    #[error("buffer too small: need at least {need} bytes, have {have}")]
    BufferTooSmall { need: usize, have: usize },

    #[error("packet length {length} exceeds receive buffer of {max}")]
    Oversized { length: usize, max: usize },

    #[error("crc mismatch")]
    BadCrc,

    #[error("unsupported protocol version {version}")]
    UnsupportedVersion { version: u8 },

    #[error("unknown record type tag {0}")]
    UnknownRecordType(u8),

    #[error("arg exceeds {max} octets")]
    ArgTooLong { max: usize },

    #[error("arg is not valid utf-8")]
    ArgNotUtf8,

    #[error("truncated record payload")]
    TruncatedPayload,
}

pub type Result<T> = std::result::Result<T, WireError>;
