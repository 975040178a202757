//! Error taxonomy shared by every format module
//!
//! Each module has its own error enum with the details relevant to it. All of
//! them classify into one [`ErrorKind`], so callers that only need to know
//! *what kind* of failure happened (missing file vs. corrupt data vs. bad
//! handle) can match on a single type.

use std::fmt;

/// Classification of decoding failures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The container signature is missing
    NotAnArchive,
    /// Archive tables are inconsistent with each other or with the file
    CorruptTables,
    /// No archive entry resolves for the requested name
    FileNotFound,
    /// A handle was used after close or against the wrong archive
    InvalidHandle,
    /// A sector could not be expanded to its expected size
    DecompressionFailed,
    /// A stored sector checksum disagrees with the data
    ChecksumMismatch,
    /// A bit stream was consumed more or less than its declared size
    StreamDesync,
    /// A read needed more bits than remain
    BufferUnderrun,
    /// A split needed more bits than remain
    InsufficientBits,
    /// A seek, index or width lies outside the valid range
    OutOfRange,
    /// A buffer argument is unusable
    InvalidBuffer,
    /// A resource header carries the wrong signature or version
    InvalidSignature,
    /// The underlying byte source failed
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NotAnArchive => "not an archive",
            Self::CorruptTables => "corrupt tables",
            Self::FileNotFound => "file not found",
            Self::InvalidHandle => "invalid handle",
            Self::DecompressionFailed => "decompression failed",
            Self::ChecksumMismatch => "checksum mismatch",
            Self::StreamDesync => "stream desync",
            Self::BufferUnderrun => "buffer underrun",
            Self::InsufficientBits => "insufficient bits",
            Self::OutOfRange => "out of range",
            Self::InvalidBuffer => "invalid buffer",
            Self::InvalidSignature => "invalid signature",
            Self::Io => "i/o error",
        };
        f.write_str(name)
    }
}

impl ErrorKind {
    /// Whether the failure is caused by the content of the data itself
    ///
    /// Corrupt data does not get better on retry; I/O failures might.
    pub fn is_data_error(self) -> bool {
        !matches!(self, Self::Io | Self::FileNotFound | Self::InvalidHandle)
    }
}
