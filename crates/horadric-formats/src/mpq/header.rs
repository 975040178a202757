//! Archive header location and parsing

use binrw::io::{Read, Seek, SeekFrom};
use binrw::{BinRead, BinWrite};
use tracing::debug;

use super::error::{MpqError, MpqResult};

/// Archive header signature, `MPQ\x1A`
pub const ARCHIVE_SIGNATURE: [u8; 4] = *b"MPQ\x1A";

/// User data header signature, `MPQ\x1B`
pub const USER_DATA_SIGNATURE: [u8; 4] = *b"MPQ\x1B";

/// Headers are only searched for at multiples of this offset
pub const HEADER_ALIGNMENT: u64 = 0x200;

/// Size of the version 1 header
pub const HEADER_SIZE_V1: u32 = 0x20;

/// Largest accepted sector size shift (sector size 16 MiB)
pub const MAX_SECTOR_SIZE_SHIFT: u16 = 15;

/// Version 1 archive header
///
/// Table positions are relative to the start of the header.
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct ArchiveHeader {
    /// Always `MPQ\x1A`
    #[br(assert(signature == ARCHIVE_SIGNATURE, "invalid archive signature {:02X?}", signature))]
    pub signature: [u8; 4],
    /// Header length in bytes, at least 32
    pub header_size: u32,
    /// Archive length in bytes
    pub archive_size: u32,
    /// Format version, 0 for the original layout
    pub format_version: u16,
    /// Sector size as a power of two above 512
    pub sector_size_shift: u16,
    /// Offset of the hash table
    pub hash_table_pos: u32,
    /// Offset of the block table
    pub block_table_pos: u32,
    /// Number of hash table entries
    pub hash_table_count: u32,
    /// Number of block table entries
    pub block_table_count: u32,
}

impl ArchiveHeader {
    /// Header for a fresh version 1 archive
    pub fn new(sector_size_shift: u16, hash_table_count: u32, block_table_count: u32) -> Self {
        Self {
            signature: ARCHIVE_SIGNATURE,
            header_size: HEADER_SIZE_V1,
            archive_size: 0,
            format_version: 0,
            sector_size_shift,
            hash_table_pos: 0,
            block_table_pos: 0,
            hash_table_count,
            block_table_count,
        }
    }

    /// Sector size in bytes, `512 << shift`
    pub fn sector_size(&self) -> u32 {
        512 << u32::from(self.sector_size_shift.min(MAX_SECTOR_SIZE_SHIFT))
    }

    /// Check the fields that do not depend on the rest of the archive
    pub fn validate(&self, strict_block_count: bool) -> MpqResult<()> {
        if self.header_size < HEADER_SIZE_V1 {
            return Err(MpqError::CorruptTables(format!(
                "header size {} is smaller than {}",
                self.header_size, HEADER_SIZE_V1
            )));
        }
        if self.sector_size_shift > MAX_SECTOR_SIZE_SHIFT {
            return Err(MpqError::CorruptTables(format!(
                "sector size shift {} is too large",
                self.sector_size_shift
            )));
        }
        if !self.hash_table_count.is_power_of_two() {
            return Err(MpqError::CorruptTables(format!(
                "hash table count {} is not a power of two",
                self.hash_table_count
            )));
        }
        if strict_block_count && !self.block_table_count.is_power_of_two() {
            return Err(MpqError::CorruptTables(format!(
                "block table count {} is not a power of two",
                self.block_table_count
            )));
        }
        Ok(())
    }
}

/// Header that precedes a relocated archive
#[derive(Debug, Clone, PartialEq, Eq, BinRead, BinWrite)]
#[brw(little)]
pub struct UserDataHeader {
    /// Always `MPQ\x1B`
    #[br(assert(signature == USER_DATA_SIGNATURE, "invalid user data signature {:02X?}", signature))]
    pub signature: [u8; 4],
    /// Bytes of user data
    pub user_data_size: u32,
    /// Offset of the archive header, relative to this header
    pub header_offset: u32,
    /// Bytes of user data stored inside this header
    pub user_data_header_size: u32,
}

/// Find the archive header
///
/// Scans 512-byte boundaries up to `search_limit`, following user data
/// headers to the archive they point at. Returns the absolute offset of the
/// archive and its header.
pub fn find_header<R: Read + Seek>(
    reader: &mut R,
    search_limit: u64,
) -> MpqResult<(u64, ArchiveHeader)> {
    let source_len = reader.seek(SeekFrom::End(0))?;
    let header_len = u64::from(HEADER_SIZE_V1);
    let mut offset = 0u64;

    while offset <= search_limit && offset + header_len <= source_len {
        reader.seek(SeekFrom::Start(offset))?;
        let mut signature = [0u8; 4];
        reader.read_exact(&mut signature)?;

        if signature == ARCHIVE_SIGNATURE {
            reader.seek(SeekFrom::Start(offset))?;
            let header = ArchiveHeader::read(reader)?;
            debug!("Found archive header at offset {:#x}", offset);
            return Ok((offset, header));
        }

        if signature == USER_DATA_SIGNATURE {
            reader.seek(SeekFrom::Start(offset))?;
            let user_data = UserDataHeader::read(reader)?;
            let target = offset + u64::from(user_data.header_offset);
            debug!(
                "User data header at {:#x} points to archive at {:#x}",
                offset, target
            );

            if target > offset && target + header_len <= source_len {
                reader.seek(SeekFrom::Start(target))?;
                reader.read_exact(&mut signature)?;
                if signature == ARCHIVE_SIGNATURE {
                    reader.seek(SeekFrom::Start(target))?;
                    let header = ArchiveHeader::read(reader)?;
                    return Ok((target, header));
                }
            }
        }

        offset += HEADER_ALIGNMENT;
    }

    Err(MpqError::NotAnArchive {
        searched: offset.min(source_len),
    })
}
