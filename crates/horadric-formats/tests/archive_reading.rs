#![allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
//! Integration tests for MPQ archive reading
//!
//! Archives are assembled in memory by the test-utils builder and read back
//! through the public API, covering sector layout, encryption, checksums,
//! injected codecs and registry lookup.

use std::io::Cursor;
use std::sync::{Arc, Mutex};

use horadric_crypto::{BLOCK_TABLE_KEY, HASH_TABLE_KEY, NameHashes, encrypt_block};
use horadric_formats::ErrorKind;
use horadric_formats::mpq::{
    Archive, ArchiveRegistry, BlockFlags, BlockTable, CodecError, CodecRegistry,
    CompressionMethod, DecompressionOrder, DiskProvider, HashEntry, HashTable, MemoryProvider,
    OpenOptions, SectorCodec,
};
use horadric_test_utils::{
    ArchiveBuilder, FileOptions, Packing, rle_decode, rle_encode, zlib_compress,
};
use pretty_assertions::assert_eq;
use proptest::prelude::*;

/// Run-length codec standing in for an externally supplied method
struct RleCodec {
    method: CompressionMethod,
    calls: Arc<Mutex<Vec<usize>>>,
}

impl RleCodec {
    fn new(method: CompressionMethod) -> (Self, Arc<Mutex<Vec<usize>>>) {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let codec = Self {
            method,
            calls: Arc::clone(&calls),
        };
        (codec, calls)
    }
}

impl SectorCodec for RleCodec {
    fn method(&self) -> CompressionMethod {
        self.method
    }

    fn decompress(&self, input: &[u8], max_len: usize) -> Result<Vec<u8>, CodecError> {
        self.calls.lock().unwrap().push(max_len);
        rle_decode(input).ok_or(CodecError::Failed {
            method: self.method,
            reason: "odd-length run table".to_string(),
        })
    }
}

fn rle_then_zlib(data: &[u8]) -> Vec<u8> {
    zlib_compress(&rle_encode(data))
}

fn open(bytes: Vec<u8>) -> Archive {
    Archive::from_reader(Cursor::new(bytes)).unwrap()
}

#[test]
fn read_length_matches_block_size() {
    let files: Vec<(String, Vec<u8>)> = [1usize, 511, 512, 513, 4096, 4097, 20_000]
        .iter()
        .map(|&len| {
            let data = (0..len).map(|i| (i % 13) as u8).collect();
            (format!("data\\file_{len}.bin"), data)
        })
        .collect();

    let mut builder = ArchiveBuilder::new().sector_shift(0).hash_slots(32);
    for (name, data) in &files {
        builder = builder.file(name, data);
    }
    let mut archive = open(builder.build());

    for (name, data) in &files {
        let handle = archive.resolve(name).unwrap();
        let block = *archive.block_entry(&handle).unwrap();
        let read = archive.read_file(&handle).unwrap();
        assert_eq!(read.len(), block.file_size as usize, "{name}");
        assert_eq!(&read, data, "{name}");
    }
}

#[test]
fn sector_split_of_1025_bytes() {
    let data = vec![b'a'; 1025];
    let bytes = ArchiveBuilder::new()
        .sector_shift(0)
        .file_with(
            "split.bin",
            &data,
            FileOptions {
                packing: Packing::Custom {
                    mask: 0x01,
                    encode: rle_encode,
                },
                ..FileOptions::default()
            },
        )
        .build();

    let (codec, calls) = RleCodec::new(CompressionMethod::Huffman);
    let mut archive = OpenOptions::new()
        .codecs(CodecRegistry::default().with_codec(Arc::new(codec)))
        .from_reader(Cursor::new(bytes.clone()))
        .unwrap();

    let handle = archive.resolve("split.bin").unwrap();
    let block = *archive.block_entry(&handle).unwrap();
    assert!(block.flags.contains(BlockFlags::COMPRESS));

    // sector offset table: three sectors plus the end offset
    let start = block.file_pos as usize;
    let offsets: Vec<u32> = bytes[start..start + 16]
        .chunks_exact(4)
        .map(|c| u32::from_le_bytes(c.try_into().unwrap()))
        .collect();
    assert_eq!(offsets[0], 16);
    assert_eq!(offsets[3], block.compressed_size);
    assert_eq!(offsets[3] - offsets[2], 1);

    assert_eq!(archive.read_file(&handle).unwrap(), data);
    assert_eq!(*calls.lock().unwrap(), vec![512, 512]);
}

#[test]
fn chained_methods_follow_configured_order() {
    let data = b"aaaaaaaabbbbbbbbbbbbcccccccccccccccc".repeat(100);
    let bytes = ArchiveBuilder::new()
        .file_with(
            "chained.bin",
            &data,
            FileOptions {
                packing: Packing::Custom {
                    mask: 0x03,
                    encode: rle_then_zlib,
                },
                ..FileOptions::default()
            },
        )
        .build();

    let (codec, calls) = RleCodec::new(CompressionMethod::Huffman);
    let codecs = CodecRegistry::default().with_codec(Arc::new(codec));
    let mut archive = OpenOptions::new()
        .codecs(codecs.clone())
        .from_reader(Cursor::new(bytes.clone()))
        .unwrap();
    assert_eq!(archive.read_file_by_name("chained.bin").unwrap(), data);
    assert_eq!(calls.lock().unwrap().len(), 1);

    let reversed = codecs.with_order(DecompressionOrder::new(vec![
        CompressionMethod::Huffman,
        CompressionMethod::Zlib,
    ]));
    let mut archive = OpenOptions::new()
        .codecs(reversed)
        .from_reader(Cursor::new(bytes))
        .unwrap();
    let err = archive.read_file_by_name("chained.bin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::DecompressionFailed);
}

#[test]
fn encrypted_files_with_and_without_fix_key() {
    let data: Vec<u8> = (0..10_000u32).map(|i| (i * 31 % 256) as u8).collect();
    for fix_key in [false, true] {
        let options = FileOptions {
            encrypted: true,
            fix_key,
            sector_crc: true,
            ..FileOptions::default()
        };
        let mut archive = open(
            ArchiveBuilder::new()
                .sector_shift(1)
                .file_with("data\\global\\excel\\weapons.txt", &data, options)
                .build(),
        );
        let handle = archive.resolve("data\\global\\excel\\weapons.txt").unwrap();
        let flags = archive.block_entry(&handle).unwrap().flags;
        assert!(flags.contains(BlockFlags::ENCRYPTED));
        assert_eq!(flags.contains(BlockFlags::FIX_KEY), fix_key);
        assert_eq!(archive.read_file(&handle).unwrap(), data);
    }
}

#[test]
fn corrupted_checksum_is_reported() {
    let data = b"stash".repeat(3000);
    let options = FileOptions {
        sector_crc: true,
        corrupt_crc: true,
        ..FileOptions::default()
    };
    let mut archive = open(ArchiveBuilder::new().file_with("crc.bin", &data, options).build());
    let err = archive.read_file_by_name("crc.bin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ChecksumMismatch);
}

#[test]
fn table_decryption_round_trip() {
    let entries: Vec<HashEntry> = ["a.txt", "b.txt", "c.txt", "d.txt"]
        .iter()
        .enumerate()
        .map(|(i, name)| HashEntry::new(&NameHashes::of(name), 0, 0, i as u32))
        .collect();

    let mut plain = Vec::new();
    for entry in &entries {
        plain.extend(entry.name_a.to_le_bytes());
        plain.extend(entry.name_b.to_le_bytes());
        plain.extend(u32::from(entry.locale).to_le_bytes());
        plain.extend(entry.block_index.to_le_bytes());
    }

    let mut encrypted = plain.clone();
    encrypt_block(&mut encrypted, HASH_TABLE_KEY);
    assert_ne!(encrypted, plain);

    let table = HashTable::read(&mut Cursor::new(&encrypted), 0, 4, HASH_TABLE_KEY).unwrap();
    assert_eq!(table.entries(), entries.as_slice());

    let mut blocks = vec![0u8; 32];
    blocks[..4].copy_from_slice(&0x20u32.to_le_bytes());
    blocks[12..16].copy_from_slice(&BlockFlags::EXISTS.bits().to_le_bytes());
    let mut encrypted = blocks.clone();
    encrypt_block(&mut encrypted, BLOCK_TABLE_KEY);
    let table = BlockTable::read(&mut Cursor::new(&encrypted), 0, 2, BLOCK_TABLE_KEY).unwrap();
    assert_eq!(table.get(0).unwrap().file_pos, 0x20);
    assert_eq!(table.get(0).unwrap().flags, BlockFlags::EXISTS);
    assert_eq!(table.get(1).unwrap().flags, BlockFlags::empty());
}

#[test]
fn probe_is_bounded_by_table_size() {
    let mut builder = ArchiveBuilder::new().hash_slots(8);
    for slot in 0..8 {
        builder = builder.tombstone(slot);
    }
    let mut archive = open(builder.build());

    let probe = archive
        .hash_table()
        .unwrap()
        .probe(&NameHashes::of("anything"), 0, 0);
    assert_eq!(probe.index, None);
    assert_eq!(probe.probes, 8);
    assert_eq!(
        archive.resolve("anything").unwrap_err().kind(),
        ErrorKind::FileNotFound
    );
}

#[test]
fn tombstoned_probe_finds_x_after_four_probes() {
    let mut archive = open(
        ArchiveBuilder::new()
            .hash_slots(4)
            .tombstone(3)
            .tombstone(0)
            .tombstone(1)
            .file("x", b"x marks the spot")
            .build(),
    );

    let probe = archive
        .hash_table()
        .unwrap()
        .probe(&NameHashes::of("x"), 0, 0);
    assert_eq!(probe.probes, 4);

    let handle = archive.resolve("x").unwrap();
    assert_eq!(handle.block_index(), 0);
    assert_eq!(archive.read_file(&handle).unwrap(), b"x marks the spot");
}

#[test]
fn registry_over_disk_provider() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("patch_d2.mpq"),
        ArchiveBuilder::new()
            .file("data\\global\\excel\\misc.txt", b"patched misc")
            .build(),
    )
    .unwrap();
    std::fs::write(
        dir.path().join("d2data.mpq"),
        ArchiveBuilder::new()
            .user_data_header()
            .file("data\\global\\excel\\misc.txt", b"base misc")
            .file("data\\global\\excel\\armor.txt", b"base armor")
            .build(),
    )
    .unwrap();

    let provider = DiskProvider::new(dir.path());
    let mut registry = ArchiveRegistry::new();
    registry.open(&provider, "patch_d2", "patch_d2.mpq").unwrap();
    let base = registry.open(&provider, "d2data", "d2data.mpq").unwrap();

    assert_eq!(
        registry.read_file("data\\global\\excel\\misc.txt", None).unwrap(),
        b"patched misc"
    );
    assert_eq!(
        registry
            .read_file("DATA/GLOBAL/EXCEL/MISC.TXT", Some("d2data"))
            .unwrap(),
        b"base misc"
    );
    let (id, _) = registry
        .find_file("data\\global\\excel\\armor.txt", None)
        .unwrap();
    assert_eq!(id, base);
    assert!(registry.open(&provider, "missing", "missing.mpq").is_err());
}

#[test]
fn memory_provider_and_listfile() {
    let provider = MemoryProvider::new().with_file(
        "d2exp.mpq",
        ArchiveBuilder::new()
            .file("data\\local\\font\\latin\\font8.dc6", b"font")
            .file("(listfile)", b"data\\local\\font\\latin\\font8.dc6\r\n")
            .build(),
    );
    let mut archive = Archive::open(&provider, "d2exp.mpq").unwrap();
    let names = archive.read_listfile().unwrap();
    let files = archive.list_files(&names);
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].file_size, 4);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_file_reads_back_whole(
        data in proptest::collection::vec(any::<u8>(), 1..3000),
        shift in 0u16..3,
        encrypted in any::<bool>(),
    ) {
        let options = FileOptions { encrypted, ..FileOptions::default() };
        let mut archive = open(
            ArchiveBuilder::new()
                .sector_shift(shift)
                .file_with("prop.bin", &data, options)
                .build(),
        );
        let read = archive.read_file_by_name("prop.bin").unwrap();
        prop_assert_eq!(read, data);
    }
}
