//! Test fixtures for horadric
//!
//! Builds synthetic MPQ archives and DCC direction streams in memory so the
//! readers can be tested without shipping game data.

#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
#![allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]

mod archive;
mod bits;
mod dcc;

pub use archive::{ArchiveBuilder, FileOptions, Packing, rle_decode, rle_encode, zlib_compress};
pub use bits::BitWriter;
pub use dcc::{DirectionSpec, FrameSpec, WIDTH_TABLE, encode_dcc_file};
