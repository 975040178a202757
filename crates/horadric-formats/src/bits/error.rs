//! Bit cursor error types

use crate::error::ErrorKind;
use thiserror::Error;

/// Bit cursor error type
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BitError {
    /// A read needs more bits than remain
    #[error("buffer underrun: requested {requested} bits, {remaining} remaining")]
    BufferUnderrun {
        /// Bits requested by the read
        requested: usize,
        /// Bits left in the cursor
        remaining: usize,
    },

    /// A split needs more bits than remain
    #[error("cannot split {requested} bits, only {remaining} remaining")]
    InsufficientBits {
        /// Bits requested for the new cursor
        requested: usize,
        /// Bits left in the cursor
        remaining: usize,
    },

    /// A seek target lies outside the cursor's data
    #[error("position byte {byte} bit {bit} is outside {total_bits} bits")]
    OutOfRange {
        /// Requested byte offset
        byte: usize,
        /// Requested bit within the byte
        bit: u8,
        /// Total bits held by the cursor
        total_bits: usize,
    },

    /// The buffer passed to a constructor is unusable
    #[error("invalid buffer: {0}")]
    InvalidBuffer(String),

    /// A read width larger than 32 bits
    #[error("invalid bit width {0}: must be at most 32")]
    InvalidWidth(u32),
}

impl BitError {
    /// Classify the error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::BufferUnderrun { .. } => ErrorKind::BufferUnderrun,
            Self::InsufficientBits { .. } => ErrorKind::InsufficientBits,
            Self::OutOfRange { .. } | Self::InvalidWidth(_) => ErrorKind::OutOfRange,
            Self::InvalidBuffer(_) => ErrorKind::InvalidBuffer,
        }
    }
}

/// Result type for bit cursor operations
pub type BitResult<T> = Result<T, BitError>;
