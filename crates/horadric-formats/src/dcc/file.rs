//! DCC file container

use std::io::Cursor;

use binrw::BinRead;
use bytes::Bytes;
use tracing::debug;

use super::decode::{DecodedDirection, decode};
use super::error::{DccError, DccResult};
use crate::bits::BitError;

/// Signature byte of every DCC file
pub const DCC_SIGNATURE: u8 = 0x74;

/// Supported format version
pub const DCC_VERSION: u8 = 6;

/// Size of the header before the direction offsets
pub const DCC_HEADER_SIZE: usize = 15;

/// File header
#[derive(Debug, Clone, PartialEq, Eq, BinRead)]
#[br(little)]
pub struct DccHeader {
    /// Always 0x74
    pub signature: u8,
    /// Always 6
    pub version: u8,
    /// Number of directions
    pub direction_count: u8,
    /// Frames in every direction
    pub frames_per_direction: u32,
    /// Always 1
    pub tag: u32,
    /// Size of the equivalent DC6 file
    pub final_dc6_size: u32,
    /// Start of each direction, from the start of the file
    #[br(count = direction_count)]
    pub direction_offsets: Vec<u32>,
}

impl DccHeader {
    /// Length of the header including the offset table
    pub fn len(&self) -> usize {
        DCC_HEADER_SIZE + 4 * self.direction_offsets.len()
    }

    /// Whether the file has no directions
    pub fn is_empty(&self) -> bool {
        self.direction_offsets.is_empty()
    }
}

/// A DCC animation held in memory
///
/// The file owns its bytes; directions are decoded on demand from borrowed
/// views into them.
#[derive(Debug, Clone)]
pub struct DccFile {
    header: DccHeader,
    data: Bytes,
}

impl DccFile {
    /// Parse the header of an owned buffer
    pub fn from_bytes(data: Bytes) -> DccResult<Self> {
        let needed = data
            .get(2)
            .map_or(DCC_HEADER_SIZE, |&count| DCC_HEADER_SIZE + 4 * usize::from(count));
        if data.len() < needed {
            return Err(BitError::BufferUnderrun {
                requested: needed * 8,
                remaining: data.len() * 8,
            }
            .into());
        }

        let header = DccHeader::read(&mut Cursor::new(&data[..]))?;
        if header.signature != DCC_SIGNATURE || header.version != DCC_VERSION {
            return Err(DccError::InvalidSignature {
                signature: header.signature,
                version: header.version,
            });
        }

        let header_len = header.len();
        let mut previous = header_len;
        for (direction, &offset) in header.direction_offsets.iter().enumerate() {
            let start = offset as usize;
            if start < previous || start > data.len() {
                return Err(DccError::BadDirectionOffset {
                    direction,
                    offset,
                    len: data.len(),
                });
            }
            previous = start;
        }

        debug!(
            "Loaded DCC file: {} directions of {} frames, {} bytes",
            header.direction_count,
            header.frames_per_direction,
            data.len()
        );
        Ok(Self { header, data })
    }

    /// Take ownership of a buffer, typically one read from an archive
    pub fn from_vec(data: Vec<u8>) -> DccResult<Self> {
        Self::from_bytes(Bytes::from(data))
    }

    /// Parsed header
    pub fn header(&self) -> &DccHeader {
        &self.header
    }

    /// Number of directions
    pub fn direction_count(&self) -> usize {
        self.header.direction_offsets.len()
    }

    /// Frames in every direction
    pub fn frames_per_direction(&self) -> u32 {
        self.header.frames_per_direction
    }

    /// The whole file
    pub fn as_bytes(&self) -> &Bytes {
        &self.data
    }

    /// Bytes of one direction
    ///
    /// A direction runs to the next direction's offset, the last one to the
    /// end of the file.
    pub fn direction_data(&self, index: usize) -> DccResult<&[u8]> {
        let offsets = &self.header.direction_offsets;
        let start = *offsets
            .get(index)
            .ok_or(DccError::DirectionOutOfRange {
                index,
                count: offsets.len(),
            })? as usize;
        let end = offsets
            .get(index + 1)
            .map_or(self.data.len(), |&next| next as usize);
        Ok(&self.data[start..end])
    }

    /// Decode one direction
    pub fn decode_direction(&self, index: usize) -> DccResult<DecodedDirection> {
        let data = self.direction_data(index)?;
        debug!("Decoding direction {} ({} bytes)", index, data.len());
        decode(data, self.header.frames_per_direction)
    }

    /// Decode every direction in order
    pub fn decode_all(&self) -> DccResult<Vec<DecodedDirection>> {
        (0..self.direction_count())
            .map(|index| self.decode_direction(index))
            .collect()
    }
}
