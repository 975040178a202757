//! Adler-32 checksums for archive sectors
//!
//! Sector checksum tables store one Adler-32 value per sector, computed over
//! the stored (decrypted, still compressed) sector bytes with a zero seed.

use adler2::Adler32;

/// Compute Adler-32 over `data`, continuing from `seed`
///
/// The standard initial value is `1`.
pub fn adler32(seed: u32, data: &[u8]) -> u32 {
    let mut hasher = Adler32::from_checksum(seed);
    hasher.write_slice(data);
    hasher.checksum()
}

/// Checksum of one stored sector
pub fn sector_checksum(data: &[u8]) -> u32 {
    adler32(0, data)
}
