//! Bit-granular reading over byte buffers
//!
//! [`BitCursor`] reads unsigned and signed integers of 1 to 32 bits,
//! least-significant bit first, from a window of bits inside a byte buffer.
//! A cursor can hand out a sub-cursor over the next N bits with
//! [`BitCursor::split`]; the sub-cursor starts at the parent's position and
//! the parent skips past those bits.
//!
//! # Ownership
//!
//! A cursor either owns its buffer, shares a buffer it was split from, or
//! borrows a caller's slice. The variant is tracked in [`Backing`]. Shared
//! sub-cursors hold a reference count on the parent's buffer, so a split
//! cursor may safely outlive its parent.
//!
//! ```
//! use horadric_formats::bits::BitCursor;
//!
//! let data = [0b1011_0101u8, 0xFF];
//! let mut cursor = BitCursor::new(&data);
//! assert_eq!(cursor.read_bits(3).unwrap(), 0b101);
//! assert_eq!(cursor.read_signed(3).unwrap(), -2);
//! assert_eq!(cursor.remaining_bits(), 10);
//! ```

mod cursor;
mod error;

pub use cursor::{Backing, BitCursor, to_signed};
pub use error::{BitError, BitResult};
