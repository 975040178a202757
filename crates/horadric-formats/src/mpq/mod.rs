//! MPQ archive reading
//!
//! MPQ archives store files by hashed name. A file is found by probing the
//! encrypted hash table, which points into the block table, which locates the
//! file data. File data may be split into sectors, compressed per sector and
//! encrypted with a key derived from the file name.
//!
//! # Layout
//!
//! ```text
//! [user data header] -> archive header -> file data ... -> hash table -> block table
//! ```
//!
//! Positions in the header and block table are relative to the archive header,
//! which may sit at any 512-byte boundary of the containing file.
//!
//! # Usage
//!
//! ```rust
//! use horadric_formats::mpq::{Archive, MemoryProvider};
//!
//! let provider = MemoryProvider::new();
//! assert!(Archive::open(&provider, "missing.mpq").is_err());
//! ```
//!
//! Archives are opened through a [`FileProvider`] and usually registered in
//! an [`ArchiveRegistry`], which searches them in registration order.

mod archive;
mod compression;
mod error;
mod header;
mod provider;
mod registry;
mod tables;

pub use archive::{
    Archive, DEFAULT_HEADER_SEARCH_LIMIT, FileHandle, FileInfo, LISTFILE_NAME, OpenOptions,
    parse_listfile,
};
pub use compression::{
    CodecError, CodecRegistry, CompressionMethod, DecompressionOrder, SectorCodec, ZlibCodec,
};
pub use error::{MpqError, MpqResult};
pub use header::{
    ARCHIVE_SIGNATURE, ArchiveHeader, HEADER_ALIGNMENT, HEADER_SIZE_V1, MAX_SECTOR_SIZE_SHIFT,
    USER_DATA_SIGNATURE, UserDataHeader, find_header,
};
pub use provider::{ArchiveSource, DiskProvider, FileProvider, MemoryProvider};
pub use registry::{ArchiveId, ArchiveRegistry};
pub use tables::{
    BlockEntry, BlockFlags, BlockTable, HASH_ENTRY_DELETED, HASH_ENTRY_EMPTY, HashEntry,
    HashTable, LOCALE_NEUTRAL, PLATFORM_NEUTRAL, Probe, TABLE_ENTRY_SIZE,
};
