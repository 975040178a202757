//! Hash and block tables
//!
//! Both tables are arrays of 16-byte little-endian records, stored encrypted
//! with fixed keys. The hash table is an open-addressed table keyed by three
//! name hashes; the block table describes where each file's data lives.

use binrw::io::{Cursor, Read, Seek, SeekFrom};
use binrw::{BinRead, BinResult, BinWrite};
use bitflags::bitflags;
use horadric_crypto::{NameHashes, decrypt_block};
use tracing::trace;

use super::error::{MpqError, MpqResult};

/// Size of one hash or block table record
pub const TABLE_ENTRY_SIZE: usize = 16;

/// `block_index` of a slot that has never been used
pub const HASH_ENTRY_EMPTY: u32 = 0xFFFF_FFFF;

/// `block_index` of a slot whose file was deleted
pub const HASH_ENTRY_DELETED: u32 = 0xFFFF_FFFE;

/// Language-neutral locale
pub const LOCALE_NEUTRAL: u16 = 0;

/// Platform-neutral platform code
pub const PLATFORM_NEUTRAL: u8 = 0;

/// One slot of the hash table
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[brw(little)]
pub struct HashEntry {
    /// `NameA` hash of the file name
    pub name_a: u32,
    /// `NameB` hash of the file name
    pub name_b: u32,
    /// Windows LANGID of the file, 0 for neutral
    pub locale: u16,
    /// Platform code, 0 for neutral
    pub platform: u8,
    /// Unused
    pub reserved: u8,
    /// Index into the block table, or a sentinel
    pub block_index: u32,
}

impl HashEntry {
    /// A never-used slot
    pub const EMPTY: Self = Self {
        name_a: HASH_ENTRY_EMPTY,
        name_b: HASH_ENTRY_EMPTY,
        locale: 0xFFFF,
        platform: 0xFF,
        reserved: 0xFF,
        block_index: HASH_ENTRY_EMPTY,
    };

    /// Live entry for `hashes` pointing at `block_index`
    pub fn new(hashes: &NameHashes, locale: u16, platform: u8, block_index: u32) -> Self {
        Self {
            name_a: hashes.name_a,
            name_b: hashes.name_b,
            locale,
            platform,
            reserved: 0,
            block_index,
        }
    }

    /// Tombstone left behind by a deleted file
    pub fn deleted(hashes: &NameHashes) -> Self {
        Self {
            block_index: HASH_ENTRY_DELETED,
            ..Self::new(hashes, LOCALE_NEUTRAL, PLATFORM_NEUTRAL, 0)
        }
    }

    /// Slot was never used; probing stops here
    pub fn is_empty(&self) -> bool {
        self.block_index == HASH_ENTRY_EMPTY
    }

    /// Slot held a file that was deleted; probing continues past it
    pub fn is_deleted(&self) -> bool {
        self.block_index == HASH_ENTRY_DELETED
    }

    /// Slot points at a block
    pub fn is_live(&self) -> bool {
        !self.is_empty() && !self.is_deleted()
    }

    /// Whether this live entry is `hashes` at `locale`/`platform`
    pub fn matches(&self, hashes: &NameHashes, locale: u16, platform: u8) -> bool {
        self.is_live()
            && self.name_a == hashes.name_a
            && self.name_b == hashes.name_b
            && self.locale == locale
            && self.platform == platform
    }
}

bitflags! {
    /// Block entry flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct BlockFlags: u32 {
        /// PKWARE implode, no method byte
        const IMPLODE = 0x0000_0100;
        /// Multi-method compression with a method byte per sector
        const COMPRESS = 0x0000_0200;
        /// Data is encrypted
        const ENCRYPTED = 0x0001_0000;
        /// Key is adjusted by block position and size
        const FIX_KEY = 0x0002_0000;
        /// Patch file
        const PATCH_FILE = 0x0010_0000;
        /// Stored as one unit instead of sectors
        const SINGLE_UNIT = 0x0100_0000;
        /// Deletion marker in a patch archive
        const DELETE_MARKER = 0x0200_0000;
        /// Adler-32 checksum per sector
        const SECTOR_CRC = 0x0400_0000;
        /// Archive signature
        const SIGNATURE = 0x1000_0000;
        /// Entry is in use
        const EXISTS = 0x8000_0000;
    }
}

impl BlockFlags {
    /// Any compression flag is set
    pub fn is_compressed(self) -> bool {
        self.intersects(Self::COMPRESS | Self::IMPLODE)
    }
}

/// One entry of the block table
#[derive(BinRead, BinWrite, Debug, Clone, Copy, PartialEq, Eq)]
#[brw(little)]
pub struct BlockEntry {
    /// Offset of the file data relative to the archive header
    pub file_pos: u32,
    /// Stored size, including sector tables
    pub compressed_size: u32,
    /// Uncompressed size
    pub file_size: u32,
    /// Storage flags
    #[br(map = |raw: u32| BlockFlags::from_bits_retain(raw))]
    #[bw(map = |flags: &BlockFlags| flags.bits())]
    pub flags: BlockFlags,
}

impl BlockEntry {
    /// Entry holds readable data
    pub fn is_present(&self) -> bool {
        self.file_size != 0 && self.flags.contains(BlockFlags::EXISTS)
    }
}

/// Outcome of a hash table lookup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Probe {
    /// Slot of the matching entry
    pub index: Option<usize>,
    /// Number of slots inspected
    pub probes: usize,
}

/// The decrypted hash table
#[derive(Debug, Clone)]
pub struct HashTable {
    entries: Vec<HashEntry>,
}

impl HashTable {
    /// Wrap decoded entries; the count must be a non-zero power of two
    pub fn from_entries(entries: Vec<HashEntry>) -> MpqResult<Self> {
        if !entries.len().is_power_of_two() {
            return Err(MpqError::CorruptTables(format!(
                "hash table count {} is not a power of two",
                entries.len()
            )));
        }
        Ok(Self { entries })
    }

    /// Read and decrypt `count` entries at `offset`
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        offset: u64,
        count: u32,
        key: u32,
    ) -> MpqResult<Self> {
        Self::from_entries(read_encrypted_entries(reader, offset, count, key)?)
    }

    /// Number of slots
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Always false for a validated table
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Slot at `index`
    pub fn get(&self, index: usize) -> Option<&HashEntry> {
        self.entries.get(index)
    }

    /// All slots
    pub fn entries(&self) -> &[HashEntry] {
        &self.entries
    }

    /// Look up `hashes` at `locale`/`platform`
    ///
    /// Probing starts at the table-offset hash and walks linearly with
    /// wraparound. It stops on a match, on a never-used slot, or once every
    /// slot has been inspected. Tombstones count as inspected slots.
    pub fn probe(&self, hashes: &NameHashes, locale: u16, platform: u8) -> Probe {
        let count = self.entries.len();
        let mask = count - 1;
        let start = hashes.offset as usize & mask;

        for step in 0..count {
            let index = (start + step) & mask;
            let entry = &self.entries[index];
            if entry.is_empty() {
                return Probe {
                    index: None,
                    probes: step + 1,
                };
            }
            if entry.matches(hashes, locale, platform) {
                trace!(
                    "Resolved {} at slot {} after {} probes",
                    hashes,
                    index,
                    step + 1
                );
                return Probe {
                    index: Some(index),
                    probes: step + 1,
                };
            }
        }

        Probe {
            index: None,
            probes: count,
        }
    }
}

/// The decrypted block table
#[derive(Debug, Clone)]
pub struct BlockTable {
    entries: Vec<BlockEntry>,
}

impl BlockTable {
    /// Wrap decoded entries
    pub fn from_entries(entries: Vec<BlockEntry>) -> Self {
        Self { entries }
    }

    /// Read and decrypt `count` entries at `offset`
    pub fn read<R: Read + Seek>(
        reader: &mut R,
        offset: u64,
        count: u32,
        key: u32,
    ) -> MpqResult<Self> {
        Ok(Self::from_entries(read_encrypted_entries(
            reader, offset, count, key,
        )?))
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Table has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry at `index`
    pub fn get(&self, index: usize) -> Option<&BlockEntry> {
        self.entries.get(index)
    }

    /// All entries
    pub fn entries(&self) -> &[BlockEntry] {
        &self.entries
    }
}

fn read_encrypted_entries<T, R>(
    reader: &mut R,
    offset: u64,
    count: u32,
    key: u32,
) -> MpqResult<Vec<T>>
where
    T: for<'a> BinRead<Args<'a> = ()> + binrw::meta::ReadEndian,
    R: Read + Seek,
{
    let mut raw = vec![0u8; count as usize * TABLE_ENTRY_SIZE];
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(&mut raw)?;
    decrypt_block(&mut raw, key);

    let mut cursor = Cursor::new(raw);
    let entries = (0..count)
        .map(|_| T::read(&mut cursor))
        .collect::<BinResult<Vec<T>>>()?;
    Ok(entries)
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use horadric_crypto::{HASH_TABLE_KEY, encrypt_block};

    fn table_with(entries: Vec<HashEntry>) -> HashTable {
        HashTable::from_entries(entries).unwrap()
    }

    #[test]
    fn test_entry_sizes() {
        let mut cursor = Cursor::new(Vec::new());
        HashEntry::EMPTY.write(&mut cursor).unwrap();
        assert_eq!(cursor.into_inner().len(), TABLE_ENTRY_SIZE);

        let block = BlockEntry {
            file_pos: 1,
            compressed_size: 2,
            file_size: 3,
            flags: BlockFlags::EXISTS | BlockFlags::COMPRESS,
        };
        let mut cursor = Cursor::new(Vec::new());
        block.write(&mut cursor).unwrap();
        let bytes = cursor.into_inner();
        assert_eq!(bytes.len(), TABLE_ENTRY_SIZE);
        assert_eq!(&bytes[12..16], &0x8000_0200u32.to_le_bytes());
    }

    #[test]
    fn test_unknown_flag_bits_survive() {
        let mut bytes = vec![0u8; 12];
        bytes.extend(0x8000_0001u32.to_le_bytes());
        let entry = BlockEntry::read(&mut Cursor::new(bytes)).unwrap();
        assert_eq!(entry.flags.bits(), 0x8000_0001);
        assert!(entry.flags.contains(BlockFlags::EXISTS));
    }

    #[test]
    fn test_sentinels() {
        assert!(HashEntry::EMPTY.is_empty());
        assert!(!HashEntry::EMPTY.is_live());

        let hashes = NameHashes::of("a.txt");
        let tomb = HashEntry::deleted(&hashes);
        assert!(tomb.is_deleted());
        assert!(!tomb.matches(&hashes, 0, 0));

        let live = HashEntry::new(&hashes, 0, 0, 7);
        assert!(live.is_live());
        assert!(live.matches(&hashes, 0, 0));
        assert!(!live.matches(&hashes, 0x409, 0));
    }

    #[test]
    fn test_probe_finds_at_home_slot() {
        let hashes = NameHashes::of("units\\monster.txt");
        let mut entries = vec![HashEntry::EMPTY; 8];
        let home = hashes.offset as usize & 7;
        entries[home] = HashEntry::new(&hashes, 0, 0, 0);

        let probe = table_with(entries).probe(&hashes, 0, 0);
        assert_eq!(probe.index, Some(home));
        assert_eq!(probe.probes, 1);
    }

    #[test]
    fn test_probe_stops_at_empty() {
        let hashes = NameHashes::of("missing.txt");
        let probe = table_with(vec![HashEntry::EMPTY; 4]).probe(&hashes, 0, 0);
        assert_eq!(probe, Probe { index: None, probes: 1 });
    }

    #[test]
    fn test_probe_bounded_by_table_size() {
        let other = NameHashes::of("other.txt");
        let table = table_with(vec![HashEntry::deleted(&other); 16]);
        let probe = table.probe(&NameHashes::of("wanted.txt"), 0, 0);
        assert_eq!(probe, Probe { index: None, probes: 16 });
    }

    #[test]
    fn test_probe_wraps_around() {
        let hashes = NameHashes::of("x");
        assert_eq!(hashes.offset & 3, 3);

        let tomb = HashEntry::deleted(&NameHashes::of("gone"));
        let entries = vec![tomb, tomb, HashEntry::new(&hashes, 0, 0, 0), tomb];
        let probe = table_with(entries).probe(&hashes, 0, 0);
        assert_eq!(probe, Probe { index: Some(2), probes: 4 });
    }

    #[test]
    fn test_non_power_of_two_rejected() {
        assert!(HashTable::from_entries(vec![HashEntry::EMPTY; 6]).is_err());
        assert!(HashTable::from_entries(Vec::new()).is_err());
    }

    #[test]
    fn test_read_encrypted_table() {
        let hashes = NameHashes::of("data\\global\\excel\\armor.txt");
        let entries = vec![HashEntry::new(&hashes, 0, 0, 3), HashEntry::EMPTY];

        let mut plain = Cursor::new(Vec::new());
        for entry in &entries {
            entry.write(&mut plain).unwrap();
        }
        let mut raw = vec![0xEEu8; 5];
        let mut table = plain.into_inner();
        encrypt_block(&mut table, HASH_TABLE_KEY);
        raw.extend(table);

        let decoded = HashTable::read(&mut Cursor::new(raw), 5, 2, HASH_TABLE_KEY).unwrap();
        assert_eq!(decoded.entries(), entries.as_slice());
    }

    #[test]
    fn test_read_truncated_table() {
        let err = BlockTable::read(&mut Cursor::new(vec![0u8; 20]), 0, 2, 0).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Io);
    }
}
