//! Archive reader
//!
//! An [`Archive`] owns its byte source and the decrypted hash and block
//! tables. Files are located with [`Archive::resolve`], which returns a
//! [`FileHandle`], and read with [`Archive::read_file`].

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Seek, SeekFrom};

use horadric_crypto::{
    BLOCK_TABLE_KEY, HASH_TABLE_KEY, NameHashes, decrypt_block, file_key, sector_checksum,
};
use tracing::{debug, info, trace, warn};

use super::compression::{CodecError, CodecRegistry};
use super::error::{MpqError, MpqResult};
use super::header::{ArchiveHeader, find_header};
use super::provider::{ArchiveSource, FileProvider};
use super::tables::{
    BlockEntry, BlockFlags, BlockTable, HashTable, LOCALE_NEUTRAL, PLATFORM_NEUTRAL,
    TABLE_ENTRY_SIZE,
};

/// Name of the archive's internal file list
pub const LISTFILE_NAME: &str = "(listfile)";

/// Default number of leading bytes scanned for the header
pub const DEFAULT_HEADER_SEARCH_LIMIT: u64 = 0x0400_0000;

/// Options for opening archives
#[derive(Debug, Clone)]
pub struct OpenOptions {
    strict_block_count: bool,
    verify_sector_checksums: bool,
    header_search_limit: u64,
    codecs: CodecRegistry,
}

impl Default for OpenOptions {
    fn default() -> Self {
        Self {
            strict_block_count: true,
            verify_sector_checksums: true,
            header_search_limit: DEFAULT_HEADER_SEARCH_LIMIT,
            codecs: CodecRegistry::default(),
        }
    }
}

impl OpenOptions {
    /// Default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject block tables whose count is not a power of two, on by default
    #[must_use]
    pub fn strict_block_count(mut self, strict: bool) -> Self {
        self.strict_block_count = strict;
        self
    }

    /// Verify per-sector Adler-32 checksums where present
    #[must_use]
    pub fn verify_sector_checksums(mut self, verify: bool) -> Self {
        self.verify_sector_checksums = verify;
        self
    }

    /// Highest offset at which a header is looked for
    #[must_use]
    pub fn header_search_limit(mut self, limit: u64) -> Self {
        self.header_search_limit = limit;
        self
    }

    /// Codecs used to expand compressed sectors
    #[must_use]
    pub fn codecs(mut self, codecs: CodecRegistry) -> Self {
        self.codecs = codecs;
        self
    }

    /// Open `path` through `provider`
    pub fn open(&self, provider: &dyn FileProvider, path: &str) -> MpqResult<Archive> {
        let source = provider.open(path)?;
        self.load(source, path.to_string())
    }

    /// Open an archive from any seekable reader
    pub fn from_reader<R: ArchiveSource + 'static>(&self, reader: R) -> MpqResult<Archive> {
        self.load(Box::new(reader), "<reader>".to_string())
    }

    fn load(&self, mut source: Box<dyn ArchiveSource>, label: String) -> MpqResult<Archive> {
        let source_len = source.seek(SeekFrom::End(0))?;
        let (archive_offset, header) = find_header(&mut source, self.header_search_limit)?;
        header.validate(self.strict_block_count)?;

        let hash_start = archive_offset + u64::from(header.hash_table_pos);
        let block_start = archive_offset + u64::from(header.block_table_pos);
        check_table_bounds("hash", hash_start, header.hash_table_count, source_len)?;
        check_table_bounds("block", block_start, header.block_table_count, source_len)?;

        let hash_table = HashTable::read(
            &mut source,
            hash_start,
            header.hash_table_count,
            HASH_TABLE_KEY,
        )?;
        let block_table = BlockTable::read(
            &mut source,
            block_start,
            header.block_table_count,
            BLOCK_TABLE_KEY,
        )?;

        info!(
            "Opened archive {} ({} hash slots, {} blocks, {}-byte sectors)",
            label,
            hash_table.len(),
            block_table.len(),
            header.sector_size()
        );

        Ok(Archive {
            serial: rand::random(),
            label,
            state: Some(OpenState {
                source,
                source_len,
                archive_offset,
                header,
                hash_table,
                block_table,
                names: BTreeMap::new(),
                options: self.clone(),
            }),
        })
    }
}

fn check_table_bounds(table: &str, start: u64, count: u32, source_len: u64) -> MpqResult<()> {
    let end = start + u64::from(count) * TABLE_ENTRY_SIZE as u64;
    if end > source_len {
        return Err(MpqError::CorruptTables(format!(
            "{table} table at {start:#x} with {count} entries extends past the end of the archive ({source_len} bytes)"
        )));
    }
    Ok(())
}

/// Reference to a resolved file inside one archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle {
    archive: u64,
    hash_index: u32,
    block_index: u32,
}

impl FileHandle {
    /// Serial of the archive that issued the handle
    pub fn archive_serial(&self) -> u64 {
        self.archive
    }

    /// Slot of the hash entry
    pub fn hash_index(&self) -> usize {
        self.hash_index as usize
    }

    /// Index of the block entry
    pub fn block_index(&self) -> usize {
        self.block_index as usize
    }
}

/// A file that resolved during a listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Name the file resolved under
    pub name: String,
    /// Handle for reading it
    pub handle: FileHandle,
    /// Uncompressed size
    pub file_size: u32,
    /// Stored size
    pub compressed_size: u32,
    /// Storage flags
    pub flags: BlockFlags,
}

struct OpenState {
    source: Box<dyn ArchiveSource>,
    source_len: u64,
    archive_offset: u64,
    header: ArchiveHeader,
    hash_table: HashTable,
    block_table: BlockTable,
    /// Resolved names by hash slot
    names: BTreeMap<usize, String>,
    options: OpenOptions,
}

/// An open MPQ archive
pub struct Archive {
    serial: u64,
    label: String,
    state: Option<OpenState>,
}

impl fmt::Debug for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Archive")
            .field("serial", &self.serial)
            .field("label", &self.label)
            .field("open", &self.state.is_some())
            .finish()
    }
}

impl Archive {
    /// Open `path` through `provider` with default options
    pub fn open(provider: &dyn FileProvider, path: &str) -> MpqResult<Self> {
        OpenOptions::default().open(provider, path)
    }

    /// Open from a reader with default options
    pub fn from_reader<R: ArchiveSource + 'static>(reader: R) -> MpqResult<Self> {
        OpenOptions::default().from_reader(reader)
    }

    /// Random serial stamped into every handle this archive issues
    pub fn serial(&self) -> u64 {
        self.serial
    }

    /// Path the archive was opened from
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether [`close`](Self::close) has not been called yet
    pub fn is_open(&self) -> bool {
        self.state.is_some()
    }

    /// Release the tables, name cache and byte source
    ///
    /// Every later call on the archive fails with `InvalidHandle`.
    pub fn close(&mut self) {
        if self.state.take().is_some() {
            debug!("Closed archive {}", self.label);
        }
    }

    fn state(&self) -> MpqResult<&OpenState> {
        self.state.as_ref().ok_or_else(|| closed(&self.label))
    }

    /// Archive header
    pub fn header(&self) -> MpqResult<&ArchiveHeader> {
        Ok(&self.state()?.header)
    }

    /// Absolute offset of the archive header in the source
    pub fn archive_offset(&self) -> MpqResult<u64> {
        Ok(self.state()?.archive_offset)
    }

    /// Decrypted hash table
    pub fn hash_table(&self) -> MpqResult<&HashTable> {
        Ok(&self.state()?.hash_table)
    }

    /// Decrypted block table
    pub fn block_table(&self) -> MpqResult<&BlockTable> {
        Ok(&self.state()?.block_table)
    }

    /// Resolve a language- and platform-neutral file
    pub fn resolve(&mut self, name: &str) -> MpqResult<FileHandle> {
        self.resolve_locale(name, LOCALE_NEUTRAL, PLATFORM_NEUTRAL)
    }

    /// Resolve a file for a specific locale and platform
    pub fn resolve_locale(&mut self, name: &str, locale: u16, platform: u8) -> MpqResult<FileHandle> {
        let state = self.state.as_mut().ok_or_else(|| closed(&self.label))?;
        let hashes = NameHashes::of(name);
        let probe = state.hash_table.probe(&hashes, locale, platform);

        let Some(hash_index) = probe.index else {
            trace!(
                "{} not found in {} after {} probes",
                name, self.label, probe.probes
            );
            return Err(MpqError::FileNotFound(name.to_string()));
        };

        let block_index = state.hash_table.entries()[hash_index].block_index;
        let block = state.block_table.get(block_index as usize).ok_or_else(|| {
            MpqError::CorruptTables(format!(
                "{name} points at block {block_index}, table has {}",
                state.block_table.len()
            ))
        })?;
        if !block.is_present() {
            return Err(MpqError::FileNotFound(name.to_string()));
        }

        state.names.insert(hash_index, name.to_string());
        Ok(FileHandle {
            archive: self.serial,
            hash_index: hash_index as u32,
            block_index,
        })
    }

    /// Name a handle was resolved under
    pub fn file_name(&self, handle: &FileHandle) -> Option<&str> {
        self.state
            .as_ref()?
            .names
            .get(&handle.hash_index())
            .map(String::as_str)
    }

    /// Block entry behind a handle
    pub fn block_entry(&self, handle: &FileHandle) -> MpqResult<&BlockEntry> {
        let state = self.state()?;
        if handle.archive != self.serial {
            return Err(MpqError::InvalidHandle(format!(
                "handle belongs to archive {}, not {}",
                handle.archive, self.serial
            )));
        }

        let entry = state.hash_table.get(handle.hash_index()).ok_or_else(|| {
            MpqError::InvalidHandle(format!("hash index {} out of range", handle.hash_index))
        })?;
        if !entry.is_live() || entry.block_index != handle.block_index {
            return Err(MpqError::InvalidHandle(format!(
                "hash slot {} no longer points at block {}",
                handle.hash_index, handle.block_index
            )));
        }

        state.block_table.get(handle.block_index()).ok_or_else(|| {
            MpqError::InvalidHandle(format!("block index {} out of range", handle.block_index))
        })
    }

    /// Uncompressed size of a file
    pub fn file_size(&self, handle: &FileHandle) -> MpqResult<u32> {
        Ok(self.block_entry(handle)?.file_size)
    }

    /// Read and fully expand a file
    ///
    /// The result is exactly the block's uncompressed size.
    pub fn read_file(&mut self, handle: &FileHandle) -> MpqResult<Vec<u8>> {
        let block = *self.block_entry(handle)?;
        let name = self.file_name(handle).map(str::to_owned);
        let state = self.state.as_mut().ok_or_else(|| closed(&self.label))?;

        let data = state.read_block(&block, name.as_deref())?;
        debug!(
            "Read {} ({} bytes stored, {} bytes expanded)",
            name.as_deref().unwrap_or("<unnamed>"),
            block.compressed_size,
            data.len()
        );
        Ok(data)
    }

    /// Resolve and read a neutral-locale file
    pub fn read_file_by_name(&mut self, name: &str) -> MpqResult<Vec<u8>> {
        let handle = self.resolve(name)?;
        self.read_file(&handle)
    }

    /// Resolve each candidate name, keeping those present in the archive
    ///
    /// Candidates that fail to resolve for any reason are skipped.
    pub fn list_files<I, S>(&mut self, names: I) -> Vec<FileInfo>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut found = Vec::new();
        for name in names {
            let name = name.as_ref();
            let Ok(handle) = self.resolve(name) else {
                continue;
            };
            if let Ok(block) = self.block_entry(&handle) {
                found.push(FileInfo {
                    name: name.to_string(),
                    handle,
                    file_size: block.file_size,
                    compressed_size: block.compressed_size,
                    flags: block.flags,
                });
            }
        }
        found
    }

    /// Read the names stored in the archive's `(listfile)`
    pub fn read_listfile(&mut self) -> MpqResult<Vec<String>> {
        let data = self.read_file_by_name(LISTFILE_NAME)?;
        Ok(parse_listfile(&data))
    }
}

/// Split listfile contents into names
///
/// Names are separated by line breaks or semicolons.
pub fn parse_listfile(data: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(data)
        .split([';', '\r', '\n'])
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

fn closed(label: &str) -> MpqError {
    MpqError::InvalidHandle(format!("archive {label} is closed"))
}

impl OpenState {
    fn read_block(&mut self, block: &BlockEntry, name: Option<&str>) -> MpqResult<Vec<u8>> {
        if !block.is_present() {
            return Err(MpqError::FileNotFound(
                name.unwrap_or("<unnamed>").to_string(),
            ));
        }

        let flags = block.flags;
        let key = if flags.contains(BlockFlags::ENCRYPTED) {
            let name = name.ok_or_else(|| {
                MpqError::InvalidHandle("encrypted file was not resolved by name".to_string())
            })?;
            file_key(
                name,
                block.file_pos,
                block.file_size,
                flags.contains(BlockFlags::FIX_KEY),
            )
        } else {
            0
        };

        let start = self.archive_offset + u64::from(block.file_pos);
        let end = start + u64::from(block.compressed_size);
        if end > self.source_len {
            return Err(MpqError::CorruptTables(format!(
                "block at {start:#x} with {} bytes extends past the end of the archive",
                block.compressed_size
            )));
        }

        let mut stored = vec![0u8; block.compressed_size as usize];
        self.source.seek(SeekFrom::Start(start))?;
        self.source.read_exact(&mut stored)?;

        if flags.contains(BlockFlags::SINGLE_UNIT) {
            if flags.contains(BlockFlags::ENCRYPTED) {
                decrypt_block(&mut stored, key);
            }
            self.expand(flags, stored, block.file_size as usize, 0)
        } else if flags.is_compressed() {
            self.read_sectors(&mut stored, block, key)
        } else {
            self.read_plain(stored, block, key)
        }
    }

    /// Sectors of a file without an offset table
    fn read_plain(&self, mut stored: Vec<u8>, block: &BlockEntry, key: u32) -> MpqResult<Vec<u8>> {
        let file_size = block.file_size as usize;
        if stored.len() < file_size {
            return Err(MpqError::CorruptTables(format!(
                "uncompressed block stores {} bytes for a {file_size}-byte file",
                stored.len()
            )));
        }
        stored.truncate(file_size);

        if block.flags.contains(BlockFlags::ENCRYPTED) {
            let sector_size = self.header.sector_size() as usize;
            for (index, sector) in stored.chunks_mut(sector_size).enumerate() {
                decrypt_block(sector, key.wrapping_add(index as u32));
            }
        }
        Ok(stored)
    }

    /// Sectors of a compressed file, located through the sector offset table
    fn read_sectors(&self, stored: &mut [u8], block: &BlockEntry, key: u32) -> MpqResult<Vec<u8>> {
        let flags = block.flags;
        let encrypted = flags.contains(BlockFlags::ENCRYPTED);
        let sector_size = self.header.sector_size() as usize;
        let file_size = block.file_size as usize;
        let sector_count = file_size.div_ceil(sector_size);
        let has_crc = flags.contains(BlockFlags::SECTOR_CRC);
        let table_entries = sector_count + 1 + usize::from(has_crc);
        let table_len = table_entries * 4;

        if stored.len() < table_len {
            return Err(MpqError::CorruptTables(format!(
                "block of {} bytes cannot hold a {table_entries}-entry sector table",
                stored.len()
            )));
        }

        let table = &mut stored[..table_len];
        if encrypted {
            decrypt_block(table, key.wrapping_sub(1));
        }
        let offsets: Vec<usize> = table
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]) as usize)
            .collect();

        let ordered = offsets.windows(2).all(|pair| pair[0] <= pair[1]);
        if !ordered || offsets[0] < table_len || offsets[table_entries - 1] > stored.len() {
            return Err(MpqError::CorruptTables(format!(
                "sector offset table {offsets:?} is inconsistent with a {}-byte block",
                stored.len()
            )));
        }

        let checksums = if has_crc && self.options.verify_sector_checksums {
            read_checksums(stored, &offsets, sector_count)
        } else {
            None
        };

        let mut output = Vec::with_capacity(file_size);
        for index in 0..sector_count {
            let sector = &mut stored[offsets[index]..offsets[index + 1]];
            if encrypted {
                decrypt_block(sector, key.wrapping_add(index as u32));
            }

            if let Some(expected) = checksums.as_ref().map(|sums| sums[index])
                && expected != 0
            {
                let actual = sector_checksum(sector);
                if actual != expected {
                    return Err(MpqError::ChecksumMismatch {
                        sector: index,
                        expected,
                        actual,
                    });
                }
            }

            let expected_len = sector_size.min(file_size - index * sector_size);
            output.extend(self.expand(flags, sector.to_vec(), expected_len, index)?);
        }

        trace!("Expanded {} sectors into {} bytes", sector_count, output.len());
        Ok(output)
    }

    /// Undo compression of one unit of stored data
    ///
    /// Data already at its expected length is stored uncompressed.
    fn expand(
        &self,
        flags: BlockFlags,
        stored: Vec<u8>,
        expected_len: usize,
        sector: usize,
    ) -> MpqResult<Vec<u8>> {
        if stored.len() == expected_len {
            return Ok(stored);
        }

        let codecs = &self.options.codecs;
        let result = if stored.len() > expected_len {
            Err(CodecError::SizeMismatch {
                expected: expected_len,
                actual: stored.len(),
            })
        } else if flags.contains(BlockFlags::COMPRESS) {
            codecs.decompress_masked(&stored, expected_len)
        } else if flags.contains(BlockFlags::IMPLODE) {
            codecs.decompress_imploded(&stored, expected_len)
        } else {
            Err(CodecError::SizeMismatch {
                expected: expected_len,
                actual: stored.len(),
            })
        };

        result.map_err(|source| MpqError::Decompression { sector, source })
    }
}

/// Per-sector checksums stored after the last sector
fn read_checksums(stored: &[u8], offsets: &[usize], sector_count: usize) -> Option<Vec<u32>> {
    let block = &stored[offsets[sector_count]..offsets[sector_count + 1]];
    if block.len() != sector_count * 4 {
        warn!(
            "Sector checksum block is {} bytes, expected {}; skipping verification",
            block.len(),
            sector_count * 4
        );
        return None;
    }
    Some(
        block
            .chunks_exact(4)
            .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect(),
    )
}
