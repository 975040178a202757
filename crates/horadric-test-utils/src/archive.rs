//! In-memory MPQ archive builder

use std::io::Write;

use flate2::Compression;
use flate2::write::ZlibEncoder;
use horadric_crypto::{
    BLOCK_TABLE_KEY, HASH_TABLE_KEY, NameHashes, encrypt_block, file_key, sector_checksum,
};

const EXISTS: u32 = 0x8000_0000;
const IMPLODE: u32 = 0x0000_0100;
const COMPRESS: u32 = 0x0000_0200;
const ENCRYPTED: u32 = 0x0001_0000;
const FIX_KEY: u32 = 0x0002_0000;
const SINGLE_UNIT: u32 = 0x0100_0000;
const SECTOR_CRC: u32 = 0x0400_0000;

const EMPTY: u32 = 0xFFFF_FFFF;
const DELETED: u32 = 0xFFFF_FFFE;

/// How file data is packed
#[derive(Debug, Clone, Copy, Default)]
pub enum Packing {
    /// zlib behind a `0x02` mask byte
    #[default]
    Zlib,
    /// Uncompressed, no sector offset table
    Stored,
    /// Custom encoder behind an arbitrary mask byte
    Custom {
        /// Mask byte written before each packed sector
        mask: u8,
        /// Encoder for one sector
        encode: fn(&[u8]) -> Vec<u8>,
    },
    /// IMPLODE flag, encoder output written without a mask byte
    Implode(fn(&[u8]) -> Vec<u8>),
}

impl Packing {
    fn flag(self) -> u32 {
        match self {
            Self::Stored => 0,
            Self::Zlib | Self::Custom { .. } => COMPRESS,
            Self::Implode(_) => IMPLODE,
        }
    }

    fn pack(self, data: &[u8]) -> Vec<u8> {
        match self {
            Self::Stored => data.to_vec(),
            Self::Zlib => {
                let mut out = vec![0x02];
                out.extend(zlib_compress(data));
                out
            }
            Self::Custom { mask, encode } => {
                let mut out = vec![mask];
                out.extend(encode(data));
                out
            }
            Self::Implode(encode) => encode(data),
        }
    }

    /// Packed form, or the input when packing does not shrink it
    fn pack_if_smaller(self, data: &[u8]) -> Vec<u8> {
        let packed = self.pack(data);
        if packed.len() < data.len() {
            packed
        } else {
            data.to_vec()
        }
    }
}

/// Per-file storage options
#[derive(Debug, Clone, Copy, Default)]
pub struct FileOptions {
    /// Packing method
    pub packing: Packing,
    /// Encrypt data and sector tables
    pub encrypted: bool,
    /// Adjust the key by block position and size
    pub fix_key: bool,
    /// Store as a single unit
    pub single_unit: bool,
    /// Write per-sector Adler-32 checksums
    pub sector_crc: bool,
    /// Flip a bit in the first stored checksum
    pub corrupt_crc: bool,
    /// Locale of the hash entry
    pub locale: u16,
    /// Platform of the hash entry
    pub platform: u8,
}

impl FileOptions {
    /// Uncompressed, unencrypted
    pub fn stored() -> Self {
        Self {
            packing: Packing::Stored,
            ..Self::default()
        }
    }
}

struct PendingFile {
    name: String,
    data: Vec<u8>,
    options: FileOptions,
}

/// Assembles a version 1 archive
pub struct ArchiveBuilder {
    sector_shift: u16,
    hash_slots: u32,
    prefix: usize,
    user_data: bool,
    exact_blocks: bool,
    files: Vec<PendingFile>,
    tombstones: Vec<usize>,
    dangling: Vec<(String, u32)>,
}

impl Default for ArchiveBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ArchiveBuilder {
    /// Builder with 4096-byte sectors and 16 hash slots
    pub fn new() -> Self {
        Self {
            sector_shift: 3,
            hash_slots: 16,
            prefix: 0,
            user_data: false,
            exact_blocks: false,
            files: Vec::new(),
            tombstones: Vec::new(),
            dangling: Vec::new(),
        }
    }

    /// Sector size shift, sector size is `512 << shift`
    #[must_use]
    pub fn sector_shift(mut self, shift: u16) -> Self {
        self.sector_shift = shift;
        self
    }

    /// Number of hash table slots
    #[must_use]
    pub fn hash_slots(mut self, slots: u32) -> Self {
        self.hash_slots = slots;
        self
    }

    /// Place `len` zero bytes (rounded up to 512) before the header
    #[must_use]
    pub fn leading_bytes(mut self, len: usize) -> Self {
        self.prefix = len.div_ceil(512) * 512;
        self
    }

    /// Start the prefix with a user data header pointing at the archive
    #[must_use]
    pub fn user_data_header(mut self) -> Self {
        self.user_data = true;
        if self.prefix == 0 {
            self.prefix = 512;
        }
        self
    }

    /// Write one block entry per file instead of padding the block table
    /// to a power of two
    #[must_use]
    pub fn exact_block_count(mut self) -> Self {
        self.exact_blocks = true;
        self
    }

    /// Add a zlib-compressed file
    #[must_use]
    pub fn file(self, name: &str, data: &[u8]) -> Self {
        self.file_with(name, data, FileOptions::default())
    }

    /// Add a file with explicit options
    #[must_use]
    pub fn file_with(mut self, name: &str, data: &[u8], options: FileOptions) -> Self {
        self.files.push(PendingFile {
            name: name.to_string(),
            data: data.to_vec(),
            options,
        });
        self
    }

    /// Mark `slot` as a deleted entry before files are placed
    #[must_use]
    pub fn tombstone(mut self, slot: usize) -> Self {
        self.tombstones.push(slot);
        self
    }

    /// Add a live hash entry pointing at an arbitrary block index
    #[must_use]
    pub fn dangling_entry(mut self, name: &str, block_index: u32) -> Self {
        self.dangling.push((name.to_string(), block_index));
        self
    }

    /// Produce the archive bytes
    pub fn build(&self) -> Vec<u8> {
        let sector_size = 512usize << self.sector_shift;
        let slot_count = self.hash_slots as usize;
        let mut slots = vec![[EMPTY, EMPTY, EMPTY, EMPTY]; slot_count];
        let mut blocks: Vec<[u32; 4]> = Vec::new();
        let mut body = vec![0u8; 32];

        let gone = NameHashes::of("(deleted)");
        for &slot in &self.tombstones {
            slots[slot] = [gone.name_a, gone.name_b, 0, DELETED];
        }

        for file in &self.files {
            let file_pos = body.len() as u32;
            let (stored, flags) = encode_file(file, file_pos, sector_size);
            blocks.push([file_pos, stored.len() as u32, file.data.len() as u32, flags]);
            body.extend(stored);

            let locale_word =
                u32::from(file.options.locale) | (u32::from(file.options.platform) << 16);
            place(
                &mut slots,
                &file.name,
                locale_word,
                blocks.len() as u32 - 1,
            );
        }

        for (name, block_index) in &self.dangling {
            place(&mut slots, name, 0, *block_index);
        }

        if !self.exact_blocks {
            blocks.resize(blocks.len().max(1).next_power_of_two(), [0; 4]);
        }

        let hash_pos = body.len() as u32;
        body.extend(encrypt_table(&slots, HASH_TABLE_KEY));
        let block_pos = body.len() as u32;
        body.extend(encrypt_table(&blocks, BLOCK_TABLE_KEY));

        let mut header = Vec::with_capacity(32);
        header.extend(b"MPQ\x1A");
        header.extend(32u32.to_le_bytes());
        header.extend((body.len() as u32).to_le_bytes());
        header.extend(0u16.to_le_bytes());
        header.extend(self.sector_shift.to_le_bytes());
        header.extend(hash_pos.to_le_bytes());
        header.extend(block_pos.to_le_bytes());
        header.extend(self.hash_slots.to_le_bytes());
        header.extend((blocks.len() as u32).to_le_bytes());
        body[..32].copy_from_slice(&header);

        let mut archive = vec![0u8; self.prefix];
        if self.user_data {
            let mut user = Vec::new();
            user.extend(b"MPQ\x1B");
            user.extend(0u32.to_le_bytes());
            user.extend((self.prefix as u32).to_le_bytes());
            user.extend(16u32.to_le_bytes());
            archive[..16].copy_from_slice(&user);
        }
        archive.extend(body);
        archive
    }
}

fn place(slots: &mut [[u32; 4]], name: &str, locale_word: u32, block_index: u32) {
    let hashes = NameHashes::of(name);
    let mask = slots.len() - 1;
    let start = hashes.offset as usize & mask;
    let slot = (0..slots.len())
        .map(|step| (start + step) & mask)
        .find(|&i| slots[i][3] == EMPTY)
        .expect("hash table is full");
    slots[slot] = [hashes.name_a, hashes.name_b, locale_word, block_index];
}

fn encrypt_table(entries: &[[u32; 4]], key: u32) -> Vec<u8> {
    let mut bytes: Vec<u8> = entries
        .iter()
        .flat_map(|entry| entry.iter().flat_map(|v| v.to_le_bytes()))
        .collect();
    encrypt_block(&mut bytes, key);
    bytes
}

fn encode_file(file: &PendingFile, file_pos: u32, sector_size: usize) -> (Vec<u8>, u32) {
    let options = file.options;
    let data = &file.data;
    let mut flags = EXISTS;

    let key = if options.encrypted {
        flags |= ENCRYPTED;
        if options.fix_key {
            flags |= FIX_KEY;
        }
        file_key(&file.name, file_pos, data.len() as u32, options.fix_key)
    } else {
        0
    };

    if options.single_unit {
        flags |= SINGLE_UNIT | options.packing.flag();
        let mut stored = options.packing.pack_if_smaller(data);
        if options.encrypted {
            encrypt_block(&mut stored, key);
        }
        return (stored, flags);
    }

    if let Packing::Stored = options.packing {
        let mut stored = data.clone();
        if options.encrypted {
            for (i, chunk) in stored.chunks_mut(sector_size).enumerate() {
                encrypt_block(chunk, key.wrapping_add(i as u32));
            }
        }
        return (stored, flags);
    }

    flags |= options.packing.flag();
    if options.sector_crc {
        flags |= SECTOR_CRC;
    }

    let mut sectors: Vec<Vec<u8>> = data
        .chunks(sector_size)
        .map(|chunk| options.packing.pack_if_smaller(chunk))
        .collect();

    let table_entries = sectors.len() + 1 + usize::from(options.sector_crc);
    let mut offsets = Vec::with_capacity(table_entries);
    let mut position = table_entries * 4;
    for sector in &sectors {
        offsets.push(position as u32);
        position += sector.len();
    }
    offsets.push(position as u32);

    let mut checksums: Vec<u8> = Vec::new();
    if options.sector_crc {
        let mut sums: Vec<u32> = sectors.iter().map(|s| sector_checksum(s)).collect();
        if options.corrupt_crc {
            sums[0] ^= 1;
        }
        checksums = sums.iter().flat_map(|v| v.to_le_bytes()).collect();
        offsets.push((position + checksums.len()) as u32);
    }

    let mut table: Vec<u8> = offsets.iter().flat_map(|v| v.to_le_bytes()).collect();
    if options.encrypted {
        encrypt_block(&mut table, key.wrapping_sub(1));
        for (i, sector) in sectors.iter_mut().enumerate() {
            encrypt_block(sector, key.wrapping_add(i as u32));
        }
    }

    let mut stored = table;
    for sector in sectors {
        stored.extend(sector);
    }
    stored.extend(checksums);
    (stored, flags)
}

/// zlib-compress `data` at the default level
pub fn zlib_compress(data: &[u8]) -> Vec<u8> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).expect("write to Vec");
    encoder.finish().expect("finish zlib stream")
}

/// Run-length encode as (count, byte) pairs
pub fn rle_encode(data: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    let mut iter = data.iter().peekable();
    while let Some(&byte) = iter.next() {
        let mut run = 1u8;
        while run < u8::MAX && iter.peek() == Some(&&byte) {
            iter.next();
            run += 1;
        }
        out.push(run);
        out.push(byte);
    }
    out
}

/// Inverse of [`rle_encode`]; `None` on odd-length input
pub fn rle_decode(data: &[u8]) -> Option<Vec<u8>> {
    if data.len() % 2 != 0 {
        return None;
    }
    let mut out = Vec::new();
    for pair in data.chunks_exact(2) {
        out.extend(std::iter::repeat_n(pair[1], usize::from(pair[0])));
    }
    Some(out)
}
