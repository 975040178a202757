//! DCC animation decoding
//!
//! A DCC file holds up to 32 directions of an animated sprite. Each direction
//! is an independent LSB-first bit stream:
//!
//! ```text
//! direction header -> frame headers -> [optional bytes] -> stream sizes
//!   -> palette table -> equal-cell | pixel-mask | encoding-type | raw-pixel | displacement
//! ```
//!
//! Frames are decoded onto a canvas the size of the direction's bounding box,
//! in 4x4 cells. A cell revisited by a later frame can be skipped entirely
//! (equal-cell flag) or refresh only some of its pixels (pixel mask). Fresh
//! pixels are either new 8-bit codes or references into a most-recently-used
//! list of codes seen so far.
//!
//! Each of the first four sub-streams must be consumed exactly; a decode that
//! reads more or less than declared fails with [`DccError::StreamDesync`].
//!
//! ```rust
//! use horadric_formats::dcc::DccFile;
//!
//! let err = DccFile::from_vec(vec![0x74, 5, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0, 0, 0, 0]).unwrap_err();
//! assert_eq!(err.kind(), horadric_formats::ErrorKind::InvalidSignature);
//! ```

mod cells;
mod decode;
mod direction;
mod error;
mod file;
mod pixels;

pub use cells::{CELL_SIZE, Cell, CellGrid};
pub use decode::{DecodedDirection, DecodedFrame, MAX_CANVAS_PIXELS, decode, decode_cursor};
pub use direction::{
    Bounds, DirectionFlags, DirectionHeader, FieldWidths, FrameHeader, PALETTE_TABLE_BITS,
    STREAM_SIZE_BITS, StreamSizes, WIDTH_TABLE, read_palette,
};
pub use error::{DccError, DccResult, StreamKind};
pub use file::{DCC_HEADER_SIZE, DCC_SIGNATURE, DCC_VERSION, DccFile, DccHeader};
pub use pixels::{DISPLACEMENT_PADDING_BITS, MAX_SEEN_CODES, PixelStreams, SeenCodes};
