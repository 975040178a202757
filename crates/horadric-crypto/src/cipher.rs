//! MPQ block cipher
//!
//! A dword-oriented stream cipher keyed by a single `u32`. Tables and file
//! sectors are encrypted in place as little-endian dwords; trailing bytes that
//! do not fill a whole dword are left untouched, matching the archive format.

use crate::crypt_table::{CIPHER_BAND, CRYPT_TABLE};
use crate::hash::{HashType, hash_string};

/// Key of the hash table, `hash_string("(hash table)", FileKey)`
pub const HASH_TABLE_KEY: u32 = 0xC3AF_3770;

/// Key of the block table, `hash_string("(block table)", FileKey)`
pub const BLOCK_TABLE_KEY: u32 = 0xEC83_B3A3;

const SEED2_INIT: u32 = 0xEEEE_EEEE;

#[inline]
fn next_key(key: u32) -> u32 {
    ((!key << 0x15).wrapping_add(0x1111_1111)) | (key >> 0x0B)
}

#[inline]
fn next_seed2(plain: u32, seed2: u32) -> u32 {
    plain
        .wrapping_add(seed2)
        .wrapping_add(seed2 << 5)
        .wrapping_add(3)
}

/// Decrypt dwords in place
pub fn decrypt_dwords(data: &mut [u32], mut key: u32) {
    let mut seed2 = SEED2_INIT;
    for word in data.iter_mut() {
        seed2 = seed2.wrapping_add(CRYPT_TABLE[CIPHER_BAND + (key & 0xFF) as usize]);
        let plain = *word ^ key.wrapping_add(seed2);
        key = next_key(key);
        seed2 = next_seed2(plain, seed2);
        *word = plain;
    }
}

/// Encrypt dwords in place
pub fn encrypt_dwords(data: &mut [u32], mut key: u32) {
    let mut seed2 = SEED2_INIT;
    for word in data.iter_mut() {
        seed2 = seed2.wrapping_add(CRYPT_TABLE[CIPHER_BAND + (key & 0xFF) as usize]);
        let plain = *word;
        *word = plain ^ key.wrapping_add(seed2);
        key = next_key(key);
        seed2 = next_seed2(plain, seed2);
    }
}

/// Decrypt a byte buffer in place, treating it as little-endian dwords
///
/// Bytes past the last full dword are not modified.
pub fn decrypt_block(data: &mut [u8], key: u32) {
    transform_bytes(data, key, decrypt_dwords);
}

/// Encrypt a byte buffer in place, treating it as little-endian dwords
///
/// Bytes past the last full dword are not modified.
pub fn encrypt_block(data: &mut [u8], key: u32) {
    transform_bytes(data, key, encrypt_dwords);
}

fn transform_bytes(data: &mut [u8], key: u32, op: fn(&mut [u32], u32)) {
    let whole = data.len() / 4 * 4;
    let mut words: Vec<u32> = data[..whole]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    op(&mut words, key);

    for (chunk, word) in data[..whole].chunks_exact_mut(4).zip(words) {
        chunk.copy_from_slice(&word.to_le_bytes());
    }
}

/// Derive the encryption key of a stored file
///
/// The key is the `FileKey` hash of the file's base name (the part after the
/// last path separator). With `fix_key` the key is additionally adjusted by
/// the block's position and size, so identical names at different offsets
/// encrypt differently.
pub fn file_key(name: &str, file_pos: u32, file_size: u32, fix_key: bool) -> u32 {
    let base = name.rsplit(['\\', '/']).next().unwrap_or(name);
    let key = hash_string(base, HashType::FileKey);

    if fix_key {
        key.wrapping_add(file_pos) ^ file_size
    } else {
        key
    }
}
