//! Cryptographic primitives for MPQ archives
//!
//! MPQ archives hash file names instead of storing them, and encrypt their
//! hash table, block table and (optionally) file data with a simple
//! table-driven stream cipher. Both the hash and the cipher are driven by the
//! same 1280-entry crypt table.
//!
//! # Components
//!
//! - **Crypt table**: the shared lookup table, generated at compile time
//! - **Hashing**: [`hash_string`] with the four MPQ hash types
//! - **Encryption**: [`decrypt_block`] / [`encrypt_block`] over little-endian
//!   dwords, plus the well-known table keys
//! - **Checksums**: Adler-32 as used for per-sector checksums
//!
//! # Examples
//!
//! ```
//! use horadric_crypto::{hash_string, HashType, HASH_TABLE_KEY};
//!
//! assert_eq!(hash_string("(hash table)", HashType::FileKey), HASH_TABLE_KEY);
//! ```
//!
//! ```
//! use horadric_crypto::{decrypt_block, encrypt_block};
//!
//! let mut data = *b"sixteen byte msg";
//! encrypt_block(&mut data, 0xDEAD_BEEF);
//! decrypt_block(&mut data, 0xDEAD_BEEF);
//! assert_eq!(&data, b"sixteen byte msg");
//! ```

#![warn(missing_docs)]

pub mod adler;
pub mod cipher;
pub mod crypt_table;
pub mod hash;

pub use adler::{adler32, sector_checksum};
pub use cipher::{
    BLOCK_TABLE_KEY, HASH_TABLE_KEY, decrypt_block, decrypt_dwords, encrypt_block,
    encrypt_dwords, file_key,
};
pub use crypt_table::CRYPT_TABLE;
pub use hash::{HashType, NameHashes, hash_string};
