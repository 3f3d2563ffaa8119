// Licensed under the Apache-2.0 license

use thiserror::Error;

/// Errors that can occur while decoding or encoding a firmware container.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FirmwareError {
    /// The blob cannot hold even the signature footer and one chunk header.
    #[error("blob is too small to be firmware: {size} bytes, need at least {min}")]
    TooSmall { size: usize, min: usize },

    /// A fixed-size record or chunk body would be read past the end of the data.
    #[error("{what} at offset 0x{offset:x} needs 0x{size:x} bytes but only 0x{limit:x} are available")]
    OutOfBounds {
        what: &'static str,
        offset: usize,
        size: usize,
        limit: usize,
    },

    #[error("tag 0x{0:04x} is too large")]
    TagTooLarge(u16),

    #[error("tag 0x{0:04x} already present in image")]
    DuplicateTag(u16),

    #[error("empty header for tag 0x{0:04x}")]
    EmptyChunk(u16),

    #[error("maximum number of images exceeded, maximum is 0x{0:02x}")]
    TooManyChunks(usize),

    /// Only reported when parsing with [`crate::ParseFlags::strict_footer`].
    #[error("chunk with tag 0x{tag:04x} ends at 0x{end:x}, past the signature at 0x{limit:x}")]
    ChunkOverlapsFooter { tag: u16, end: usize, limit: usize },

    /// The payload to be written could not be produced.
    #[error("payload unavailable: {0}")]
    PayloadUnavailable(String),

    #[error("invalid version {0:?}, expected major.minor")]
    InvalidVersion(String),

    /// The declarative firmware description could not be read.
    #[error("invalid firmware descriptor: {0}")]
    Descriptor(String),
}

/// Result type for firmware container operations
pub type FirmwareResult<T> = Result<T, FirmwareError>;
