//! Readers for Diablo II era asset formats
//!
//! This crate decodes the two binary formats the game reads all of its
//! sprites from:
//!
//! # Supported Formats
//!
//! - **MPQ**: hash-indexed archive with encrypted tables, encrypted and
//!   sector-compressed file data, and per-sector checksums
//! - **DCC**: bit-packed directional animations, decoded cell by cell with
//!   inter-frame deltas and a most-recently-used palette code cache
//!
//! Both rest on [`bits::BitCursor`], a bit-granular reader over owned or
//! borrowed buffers.
//!
//! # Typical Flow
//!
//! ```no_run
//! use horadric_formats::dcc::DccFile;
//! use horadric_formats::mpq::{ArchiveRegistry, DiskProvider};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let provider = DiskProvider::new("/games/diablo2");
//! let mut registry = ArchiveRegistry::new();
//! registry.open(&provider, "d2exp", "d2exp.mpq")?;
//! registry.open(&provider, "d2data", "d2data.mpq")?;
//!
//! let bytes = registry.read_file("data\\global\\monsters\\ba\\tr\\batrlitnuhth.dcc", None)?;
//! let dcc = DccFile::from_vec(bytes)?;
//! let direction = dcc.decode_direction(0)?;
//! println!("{} frames", direction.frames.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Concurrency
//!
//! Nothing in this crate locks. Distinct archives and distinct direction
//! decodes share no mutable state and can run on different threads; access
//! to a single archive must be serialized by the caller.

#![warn(missing_docs)]
#![allow(clippy::cast_possible_truncation)] // Intentional for binary format parsing
#![allow(clippy::cast_possible_wrap)] // Two's-complement conversions
#![allow(clippy::cast_lossless)] // Sometimes clearer than From
#![allow(clippy::uninlined_format_args)] // Backwards compatibility
#![allow(clippy::doc_markdown)] // Many format terms don't need backticks
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::similar_names)] // Domain-specific naming patterns
#![allow(clippy::use_self)] // Type clarity

pub mod bits;
pub mod dcc;
pub mod error;
pub mod mpq;

pub use error::ErrorKind;
