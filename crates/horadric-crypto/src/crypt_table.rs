//! The MPQ crypt table
//!
//! 0x500 dwords, split into five 0x100-entry bands. Bands 0-3 feed
//! [`hash_string`](crate::hash_string) (one per hash type), band 4 feeds the
//! block cipher.

/// Number of entries in the crypt table
pub const CRYPT_TABLE_LEN: usize = 0x500;

/// Offset of the band used by the block cipher
pub const CIPHER_BAND: usize = 0x400;

/// The crypt table shared by hashing and encryption
pub static CRYPT_TABLE: [u32; CRYPT_TABLE_LEN] = build_crypt_table();

const fn build_crypt_table() -> [u32; CRYPT_TABLE_LEN] {
    let mut table = [0u32; CRYPT_TABLE_LEN];
    let mut seed: u32 = 0x0010_0001;

    let mut index1 = 0;
    while index1 < 0x100 {
        let mut index2 = index1;
        let mut i = 0;
        while i < 5 {
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let high = (seed & 0xFFFF) << 0x10;
            seed = (seed * 125 + 3) % 0x002A_AAAB;
            let low = seed & 0xFFFF;

            table[index2] = high | low;
            index2 += 0x100;
            i += 1;
        }
        index1 += 1;
    }

    table
}
