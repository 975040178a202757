//! DCC error types

use std::fmt;

use crate::bits::BitError;
use crate::error::ErrorKind;
use thiserror::Error;

/// DCC operation result type
pub type DccResult<T> = Result<T, DccError>;

/// Pixel sub-streams of a direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    /// One flag per revisited cell
    EqualCell,
    /// One flag per pixel of a revisited cell
    PixelMask,
    /// One flag per fresh pixel, raw or seen
    EncodingType,
    /// 8-bit codes of pixels not seen before
    RawPixel,
    /// Nibble chains selecting a recently seen code
    Displacement,
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EqualCell => "equal-cell",
            Self::PixelMask => "pixel-mask",
            Self::EncodingType => "encoding-type",
            Self::RawPixel => "raw-pixel",
            Self::Displacement => "displacement",
        };
        f.write_str(name)
    }
}

/// Errors raised while decoding DCC animations
#[derive(Debug, Error)]
pub enum DccError {
    /// File header signature or version is wrong
    #[error("invalid DCC header: signature 0x{signature:02X}, version {version}")]
    InvalidSignature {
        /// Signature byte found
        signature: u8,
        /// Version byte found
        version: u8,
    },

    /// Direction index past the direction count
    #[error("direction {index} out of range, file has {count}")]
    DirectionOutOfRange {
        /// Requested direction
        index: usize,
        /// Directions in the file
        count: usize,
    },

    /// Direction offset table points outside the file
    #[error("direction {direction} starts at {offset}, outside {len} bytes")]
    BadDirectionOffset {
        /// Direction index
        direction: usize,
        /// Offset stored in the header
        offset: u32,
        /// File length
        len: usize,
    },

    /// A sub-stream was not consumed exactly as declared
    #[error("{stream} stream declared {declared} bits, decoding consumed {consumed}")]
    StreamDesync {
        /// Stream at fault
        stream: StreamKind,
        /// Declared size in bits
        declared: usize,
        /// Bits the decoder consumed or tried to consume
        consumed: usize,
    },

    /// A pixel code has no palette entry
    #[error("pixel code {code} outside the {palette_len}-entry palette table")]
    InvalidCode {
        /// Code read from the raw-pixel stream or the seen list
        code: u8,
        /// Entries in the direction's palette table
        palette_len: usize,
    },

    /// A displacement selects a slot past the end of the seen list
    #[error("displacement {slot} past the {seen} seen codes")]
    InvalidDisplacement {
        /// Slot selected
        slot: usize,
        /// Codes seen so far
        seen: usize,
    },

    /// Frame boxes that cannot be laid out on a canvas
    #[error("invalid frame geometry: {0}")]
    InvalidGeometry(String),

    /// Bit-level read failure outside the pixel sub-streams
    #[error(transparent)]
    Bits(#[from] BitError),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl DccError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidSignature { .. } => ErrorKind::InvalidSignature,
            Self::DirectionOutOfRange { .. }
            | Self::BadDirectionOffset { .. }
            | Self::InvalidGeometry(_) => ErrorKind::OutOfRange,
            Self::StreamDesync { .. }
            | Self::InvalidCode { .. }
            | Self::InvalidDisplacement { .. } => ErrorKind::StreamDesync,
            Self::Bits(err) => err.kind(),
            Self::BinRw(err) if err.is_eof() => ErrorKind::BufferUnderrun,
            Self::BinRw(binrw::Error::Io(_)) => ErrorKind::Io,
            Self::BinRw(_) => ErrorKind::InvalidSignature,
        }
    }
}
