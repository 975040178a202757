//! MPQ error types

use super::compression::CodecError;
use crate::error::ErrorKind;
use thiserror::Error;

/// MPQ operation result type
pub type MpqResult<T> = Result<T, MpqError>;

/// Errors raised while opening archives or reading their files
#[derive(Debug, Error)]
pub enum MpqError {
    /// No archive header signature was found
    #[error("not an MPQ archive: no header within the first {searched} bytes")]
    NotAnArchive {
        /// Number of bytes scanned
        searched: u64,
    },

    /// Header or tables are inconsistent
    #[error("corrupt archive tables: {0}")]
    CorruptTables(String),

    /// No entry resolves for the name
    #[error("file not found: {0}")]
    FileNotFound(String),

    /// Handle refers to a closed archive, another archive, or a stale slot
    #[error("invalid file handle: {0}")]
    InvalidHandle(String),

    /// A sector could not be expanded
    #[error("decompression of sector {sector} failed: {source}")]
    Decompression {
        /// Sector index within the file
        sector: usize,
        /// Underlying codec failure
        #[source]
        source: CodecError,
    },

    /// A stored sector checksum disagrees with the sector data
    #[error("checksum mismatch in sector {sector}: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Sector index within the file
        sector: usize,
        /// Stored checksum
        expected: u32,
        /// Computed checksum
        actual: u32,
    },

    /// I/O error from the byte source
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Binary parsing error
    #[error("binary parsing error: {0}")]
    BinRw(#[from] binrw::Error),
}

impl MpqError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotAnArchive { .. } => ErrorKind::NotAnArchive,
            Self::CorruptTables(_) => ErrorKind::CorruptTables,
            Self::FileNotFound(_) => ErrorKind::FileNotFound,
            Self::InvalidHandle(_) => ErrorKind::InvalidHandle,
            Self::Decompression { .. } => ErrorKind::DecompressionFailed,
            Self::ChecksumMismatch { .. } => ErrorKind::ChecksumMismatch,
            Self::Io(_) => ErrorKind::Io,
            Self::BinRw(err) => match err {
                binrw::Error::Io(_) => ErrorKind::Io,
                _ => ErrorKind::CorruptTables,
            },
        }
    }

    /// Whether the error means the name simply isn't in the archive
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::FileNotFound
    }
}
